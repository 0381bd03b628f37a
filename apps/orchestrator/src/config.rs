use clap::Parser;

/// Typed process configuration for the orchestrator, sourced from CLI
/// flags with `env` fallbacks (§2 A1, mirroring the teacher's
/// `SovereignWorkerDirectives` pattern).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Grading pipeline orchestrator (C8)")]
pub struct OrchestratorConfig {
    /// Relational store DSN (a local file path, or `:memory:`).
    #[arg(long, env = "DATABASE_URL", default_value = "gradecore.db")]
    pub database_url: String,

    /// Root directory for the content-addressed file cache.
    #[arg(long, env = "BLOB_STORE_ROOT", default_value = "blobs")]
    pub blob_store_root: String,

    /// Metadata DSN for the file cache's side table.
    #[arg(long, env = "CACHE_METADATA_URL", default_value = "gradecore-cache.db")]
    pub cache_metadata_url: String,

    /// HTTP port the worker protocol and admin API listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Bearer token workers must present to acquire jobs (§6).
    #[arg(long, env = "WORKER_AUTH_TOKEN")]
    pub worker_auth_token: String,

    /// Upper bound on retries before a job escalates to `stuck` (§4.5).
    #[arg(long, env = "MAX_RETRY_COUNT", default_value_t = 3)]
    pub max_retry_count: u32,
}
