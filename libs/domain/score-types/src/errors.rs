use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreTypeError {
    #[error("unknown score type: {0}")]
    UnknownScoreType(String),

    #[error("invalid score-type parameters: {0}")]
    InvalidParameters(String),

    #[error("outcome for codename {0} referenced by parameters is missing")]
    MissingOutcome(String),
}
