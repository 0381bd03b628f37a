pub mod dataset;
pub mod digest;
pub mod job;
pub mod operation;
pub mod result;
pub mod submission;
pub mod worker;

pub use dataset::{Dataset, Testcase};
pub use digest::Digest;
pub use job::{CompilationJob, EvaluationJob, Job, JobVariant, PlusMap, TaskTypeSpec};
pub use operation::{Operation, OperationKind, Priority};
pub use result::{CompilationOutcome, Evaluation, SubmissionResult};
pub use submission::Submission;
pub use worker::{WorkerCapability, WorkerHeartbeat};
