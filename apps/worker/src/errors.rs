// [apps/worker/src/errors.rs]
use thiserror::Error;

use gradecore_cache::CacheError;
use gradecore_db::DbError;
use gradecore_task_types::ExecutorError;
use gradecore_worker_client::ClientError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job carried an unrecognized variant/task-type pairing: {0}")]
    MalformedJob(String),
}
