use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use gradecore_cache::CacheError;
use gradecore_db::DbError;
use gradecore_score_types::ScoreTypeError;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    ScoreType(#[from] ScoreTypeError),

    #[error("submission {0} not found")]
    SubmissionNotFound(i64),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("system is in maintenance mode: {0}")]
    Maintenance(String),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = match &self {
            OrchestratorError::Db(DbError::SubmissionNotFound(_))
            | OrchestratorError::Db(DbError::DatasetNotFound(_))
            | OrchestratorError::Db(DbError::ResultNotFound { .. })
            | OrchestratorError::Db(DbError::JobNotFound(_))
            | OrchestratorError::SubmissionNotFound(_)
            | OrchestratorError::JobNotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::Db(DbError::StaleWrite(_)) => StatusCode::CONFLICT,
            OrchestratorError::Maintenance(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrchestratorError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
