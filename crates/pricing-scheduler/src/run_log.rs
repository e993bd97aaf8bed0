//! Job run records: one document per scheduler invocation, written whether
//! the run completed, failed, or was skipped for lock contention.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use pricing_store::document::{to_body, Document};
use pricing_store::store::DocumentStore;
use serde::{Deserialize, Serialize};

pub const SCHEDULED_JOB_LOGS: &str = "scheduled_job_logs";

/// Status a job run finished in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Fail,
    Skipped,
}

/// One job-run audit record, per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunRecord {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub duration_ms: i64,
    pub counts: HashMap<String, u64>,
    pub error: Option<String>,
}

/// Writes `record` under a freshly generated id.
pub async fn write_run_log(store: &dyn DocumentStore, record: &JobRunRecord) -> Result<(), pricing_store::StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let body = to_body(record)?;
    store
        .put(Document {
            collection: SCHEDULED_JOB_LOGS.to_string(),
            id,
            body,
            created_at: record.finished_at,
            updated_at: record.finished_at,
        })
        .await
}
