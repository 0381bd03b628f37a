use crate::digest::Digest;
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of a task-type executor strategy (§4.6). The parameter
/// string is opaque to the core and handed verbatim to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeSpec {
    pub name: String,
    pub parameters: serde_json::Value,
}

/// Diagnostic and measurement metadata a worker attaches to a finished
/// job: execution time, memory, exit status, sandbox notes. Opaque to
/// the orchestrator beyond the two well-known keys `tombstone` and
/// `infra_error` used for failure triage (§4.5, §7).
pub type PlusMap = HashMap<String, serde_json::Value>;

/// Self-contained payload a worker executes. Never carries a live
/// reference to a database row — everything needed to run is either
/// inline or fetchable by Digest from the file cache (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub operation: Operation,
    pub task_type: TaskTypeSpec,
    pub language: Option<String>,
    pub success: bool,
    pub failure_text: Option<String>,
    pub plus: PlusMap,
    pub variant: JobVariant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum JobVariant {
    Compilation(CompilationJob),
    Evaluation(EvaluationJob),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationJob {
    /// Named source files, keyed by filename, stored by digest.
    pub sources: HashMap<String, Digest>,
    /// Populated by the executor: named output executables.
    pub executables: HashMap<String, Digest>,
    pub compilation_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationJob {
    pub codename: String,
    pub executables: HashMap<String, Digest>,
    pub input: Digest,
    pub expected_output: Digest,
    pub time_limit_seconds: Option<f64>,
    pub memory_limit_bytes: Option<u64>,
    /// Populated by the executor.
    pub outcome: Option<f64>,
    pub evaluation_text: Option<String>,
    pub execution_time_seconds: Option<f64>,
    pub memory_used_bytes: Option<u64>,
    pub output_digest: Option<Digest>,
}

impl Job {
    pub fn new_compilation(
        operation: Operation,
        task_type: TaskTypeSpec,
        language: Option<String>,
        sources: HashMap<String, Digest>,
    ) -> Self {
        Self {
            operation,
            task_type,
            language,
            success: false,
            failure_text: None,
            plus: PlusMap::new(),
            variant: JobVariant::Compilation(CompilationJob {
                sources,
                executables: HashMap::new(),
                compilation_text: None,
            }),
        }
    }

    pub fn new_evaluation(
        operation: Operation,
        task_type: TaskTypeSpec,
        language: Option<String>,
        executables: HashMap<String, Digest>,
        codename: impl Into<String>,
        input: Digest,
        expected_output: Digest,
        time_limit_seconds: Option<f64>,
        memory_limit_bytes: Option<u64>,
    ) -> Self {
        Self {
            operation,
            task_type,
            language,
            success: false,
            failure_text: None,
            plus: PlusMap::new(),
            variant: JobVariant::Evaluation(EvaluationJob {
                codename: codename.into(),
                executables,
                input,
                expected_output,
                time_limit_seconds,
                memory_limit_bytes,
                outcome: None,
                evaluation_text: None,
                execution_time_seconds: None,
                memory_used_bytes: None,
                output_digest: None,
            }),
        }
    }

    pub fn is_tombstoned(&self) -> bool {
        self.plus
            .get("tombstone")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn is_infra_failure(&self) -> bool {
        !self.success && (self.is_tombstoned() || self.plus.contains_key("infra_error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_round_trips_through_json() {
        let operation = Operation::compilation(1, 1);
        let job = Job::new_compilation(
            operation,
            TaskTypeSpec {
                name: "Batch".into(),
                parameters: serde_json::json!({}),
            },
            Some("c".into()),
            HashMap::from([("main.c".to_string(), Digest::from("abc"))]),
        );

        let encoded = serde_json::to_string(&job).unwrap();
        let decoded: Job = serde_json::from_str(&encoded).unwrap();
        assert_eq!(job.operation, decoded.operation);
        assert_eq!(job.task_type, decoded.task_type);
        match (&job.variant, &decoded.variant) {
            (JobVariant::Compilation(a), JobVariant::Compilation(b)) => {
                assert_eq!(a.sources, b.sources);
            }
            _ => panic!("variant mismatch after round-trip"),
        }
    }
}
