use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::OperationKind;

/// Registered once at worker startup (§6 "Worker capability protocol").
/// No dynamic renegotiation: a capability change requires a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerCapability {
    pub shard: u32,
    pub kinds: Vec<OperationKind>,
    pub max_memory_bytes: u64,
}

impl WorkerCapability {
    pub fn serves(&self, kind: OperationKind) -> bool {
        self.kinds.contains(&kind)
    }
}

/// Emitted on the per-worker metadata queue (§6 "Persisted state layout").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHeartbeat {
    pub shard: u32,
    pub current_job_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
