use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("invalid task-type parameters: {0}")]
    InvalidParameters(String),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("process exceeded wall-clock timeout of {0:?}")]
    Timeout(std::time::Duration),
}
