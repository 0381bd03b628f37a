pub mod dataset;
pub mod queue;
pub mod result;
pub mod submission;

pub use dataset::DatasetRepository;
pub use queue::{ClaimedJob, QueueRepository};
pub use result::ResultRepository;
pub use submission::SubmissionRepository;
