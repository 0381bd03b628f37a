use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to reach orchestrator: {0}")]
    Network(#[from] reqwest::Error),

    #[error("orchestrator rejected the request: {0}")]
    ServerRejection(String),

    #[error("no job is currently available")]
    NoJobAvailable,

    #[error("worker credentials were rejected")]
    Unauthorized,
}
