pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use repositories::{ClaimedJob, DatasetRepository, QueueRepository, ResultRepository, SubmissionRepository};
