pub mod comparator;
pub mod errors;
pub mod executors;
pub mod sandbox;

pub use comparator::Comparator;
pub use errors::{ExecutorError, SandboxError};
pub use executors::{dispatch, TaskType};
pub use sandbox::{ProcessSandbox, Sandbox, SandboxOutcome};
