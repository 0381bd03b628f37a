// [apps/worker/src/config.rs]
use clap::Parser;
use gradecore_models::OperationKind;

/// Typed process configuration for the worker, sourced from CLI flags
/// with `env` fallbacks (mirroring the orchestrator's
/// `OrchestratorConfig`).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Grading pipeline worker (C5)")]
pub struct WorkerConfig {
    /// Base URL of the orchestrator's worker protocol.
    #[arg(long, env = "ORCHESTRATOR_URL")]
    pub orchestrator_url: String,

    /// Bearer token presented on every worker-protocol call.
    #[arg(long, env = "WORKER_AUTH_TOKEN")]
    pub worker_auth_token: String,

    /// Shard id this worker serves (§4.5 "shard" routing key).
    #[arg(long, env = "WORKER_SHARD", default_value_t = 0)]
    pub shard: u32,

    /// Comma-separated operation kinds this worker accepts, e.g.
    /// "Compilation,Evaluation".
    #[arg(
        long,
        env = "WORKER_KINDS",
        default_value = "Compilation,Evaluation",
        value_delimiter = ','
    )]
    pub kinds: Vec<String>,

    /// Root directory of the shared content-addressed file cache. Must
    /// point at the same filesystem location the orchestrator uses.
    #[arg(long, env = "BLOB_STORE_ROOT", default_value = "blobs")]
    pub blob_store_root: String,

    /// Metadata DSN for the file cache's side table, shared with the
    /// orchestrator.
    #[arg(long, env = "CACHE_METADATA_URL", default_value = "gradecore-cache.db")]
    pub cache_metadata_url: String,

    /// Relational store DSN, shared with the orchestrator. Used only as
    /// a fallback to read a submission's persisted executables when a
    /// claimed evaluation job's payload carries none (§4.5, mirroring
    /// the original's `_get_compilation_job` fallback).
    #[arg(long, env = "DATABASE_URL", default_value = "gradecore.db")]
    pub database_url: String,

    /// Declared capability ceiling, reported at registration only; the
    /// sandbox does not currently enforce it (§1 sandbox-internals
    /// exclusion).
    #[arg(long, env = "WORKER_MAX_MEMORY_BYTES", default_value_t = 512 * 1024 * 1024)]
    pub max_memory_bytes: u64,

    /// Sleep between acquire attempts when the queue has nothing for
    /// this worker's shard and kinds.
    #[arg(long, env = "WORKER_POLL_BACKOFF_SECONDS", default_value_t = 5)]
    pub poll_backoff_seconds: u64,

    /// Minimum gap between heartbeats sent while idle.
    #[arg(long, env = "WORKER_HEARTBEAT_SECONDS", default_value_t = 20)]
    pub heartbeat_interval_seconds: u64,
}

impl WorkerConfig {
    pub fn parsed_kinds(&self) -> anyhow::Result<Vec<OperationKind>> {
        self.kinds
            .iter()
            .map(|raw| parse_kind(raw))
            .collect::<Result<Vec<_>, _>>()
    }
}

fn parse_kind(raw: &str) -> anyhow::Result<OperationKind> {
    match raw.trim() {
        "Compilation" => Ok(OperationKind::Compilation),
        "Evaluation" => Ok(OperationKind::Evaluation),
        "UserTestCompilation" => Ok(OperationKind::UserTestCompilation),
        "UserTestEvaluation" => Ok(OperationKind::UserTestEvaluation),
        other => anyhow::bail!("unknown operation kind in --kinds: {other}"),
    }
}
