use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(#[from] libsql::Error),

    #[error("row mapping error: {0}")]
    Mapping(String),

    #[error("submission {0} not found")]
    SubmissionNotFound(i64),

    #[error("dataset {0} not found")]
    DatasetNotFound(i64),

    #[error("submission result ({submission_id}, {dataset_id}) not found")]
    ResultNotFound { submission_id: i64, dataset_id: i64 },

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("try-counter mismatch on job {0}: stale write dropped")]
    StaleWrite(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}
