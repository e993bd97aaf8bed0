//! Periodic job supervisor: full-grid scrape, lite-refresh, and cleanup,
//! each serialized across workers by a distributed lock and logged to an
//! audit trail.

pub mod branch_cache;
pub mod jobs;
pub mod lock;
pub mod run_log;
pub mod supervisor;

pub use branch_cache::BranchCache;
pub use jobs::{run_cleanup, run_full_grid_scrape, run_lite_refresh};
pub use lock::{acquire_lock, release_lock, LockGuard, LockOutcome};
pub use run_log::{write_run_log, JobRunRecord, RunStatus};
pub use supervisor::start;
