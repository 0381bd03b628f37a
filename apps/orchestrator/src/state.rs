use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use gradecore_cache::FileCache;
use gradecore_db::DbClient;
use gradecore_models::WorkerCapability;

use crate::config::OrchestratorConfig;
use crate::errors::OrchestratorError;

/// System-wide liveness gate for the worker protocol (§6), mirroring
/// the teacher's `SystemMode` perimeter guard.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemMode {
    Operational,
    Maintenance(String),
}

#[derive(Debug, Clone)]
pub struct RegisteredWorker {
    pub capability: WorkerCapability,
    pub last_heartbeat: DateTime<Utc>,
}

/// Shared application state threaded through every handler (§4.9).
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    pub cache: FileCache,
    pub worker_auth_token: Arc<str>,
    pub max_retry_count: u32,
    mode: Arc<RwLock<SystemMode>>,
    /// Write-behind buffer for worker registrations and heartbeats,
    /// mirroring the teacher's `heartbeat_buffer` pattern — heartbeats
    /// are frequent and only matter for liveness, not durability.
    workers: Arc<RwLock<HashMap<u32, RegisteredWorker>>>,
}

impl AppState {
    pub async fn new(config: &OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let db = DbClient::connect(&config.database_url).await?;
        let cache = FileCache::open(&config.blob_store_root, &config.cache_metadata_url).await?;

        Ok(Self {
            db,
            cache,
            worker_auth_token: Arc::from(config.worker_auth_token.as_str()),
            max_retry_count: config.max_retry_count,
            mode: Arc::new(RwLock::new(SystemMode::Operational)),
            workers: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn mode(&self) -> SystemMode {
        self.mode.read().expect("system mode lock poisoned").clone()
    }

    pub fn set_mode(&self, mode: SystemMode) {
        *self.mode.write().expect("system mode lock poisoned") = mode;
    }

    pub fn is_operational(&self) -> Result<(), OrchestratorError> {
        match self.mode() {
            SystemMode::Operational => Ok(()),
            SystemMode::Maintenance(reason) => Err(OrchestratorError::Maintenance(reason)),
        }
    }

    pub fn register_worker(&self, capability: WorkerCapability) {
        let mut workers = self.workers.write().expect("workers lock poisoned");
        workers.insert(
            capability.shard,
            RegisteredWorker { capability, last_heartbeat: Utc::now() },
        );
    }

    pub fn record_heartbeat(&self, shard: u32) {
        if let Some(worker) = self.workers.write().expect("workers lock poisoned").get_mut(&shard) {
            worker.last_heartbeat = Utc::now();
        }
    }

    pub fn registered_workers(&self) -> Vec<RegisteredWorker> {
        self.workers.read().expect("workers lock poisoned").values().cloned().collect()
    }

    /// Drops workers that haven't heartbeated in `max_age_seconds`,
    /// returning how many were evicted.
    pub fn evict_stale_workers(&self, max_age_seconds: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age_seconds);
        let mut workers = self.workers.write().expect("workers lock poisoned");
        let before = workers.len();
        workers.retain(|_, worker| worker.last_heartbeat > cutoff);
        before - workers.len()
    }
}
