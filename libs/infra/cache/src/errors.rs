use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("digest not found: {0}")]
    NotFound(String),

    #[error("digest tombstoned: {0}")]
    Tombstone(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata store error: {0}")]
    Metadata(#[from] libsql::Error),
}
