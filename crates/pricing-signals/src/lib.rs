//! Demand/utilization signal builder: fleet occupancy snapshots and the
//! quote-to-booking conversion index the Rule Engine's demand factor reads.

pub mod demand;
pub mod utilization;

pub use demand::{compute_demand_signal, fallback_demand_index, read_demand_signal, DemandSignal};
pub use utilization::{compute_utilization, UtilizationSnapshot};
