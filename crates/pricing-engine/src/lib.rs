//! Quote pricing engine: per-vehicle orchestration blending a numeric model
//! with the engine's own short rule path, bounded by cost/market guardrails,
//! behind a short-TTL cache with a full decision audit trail.

pub mod cache;
pub mod decision;
pub mod errors;
pub mod model;
pub mod quote;

pub use decision::PricingDecision;
pub use errors::EngineError;
pub use model::{FailingPricingModel, LinearPricingModel, ModelError, PricingModel};
pub use quote::{quote, BranchType, QuoteContext, QuoteRequest, QuoteResponse, VehicleQuote, VehicleRequest};
