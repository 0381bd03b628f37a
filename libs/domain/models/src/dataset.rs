use crate::digest::Digest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One (input, expected output) pair with a codename (§3, Glossary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testcase {
    pub codename: String,
    pub input: Digest,
    pub output: Digest,
    pub public: bool,
}

/// A scoring configuration for a task (§3 "Dataset"). Effectively
/// immutable once any SubmissionResult references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub task_id: i64,
    pub task_type_name: String,
    pub task_type_parameters: serde_json::Value,
    pub score_type_name: String,
    pub score_type_parameters: serde_json::Value,
    pub testcases: Vec<Testcase>,
    pub time_limit_seconds: Option<f64>,
    pub memory_limit_bytes: Option<u64>,
    /// Manager files (compiler stubs, checkers, communicators), keyed by name.
    pub managers: HashMap<String, Digest>,
    pub active: bool,
    /// Per-task-type default language, used when a submission names none
    /// (§3 supplement, `Submission::resolved_language`).
    pub default_language: Option<String>,
}

impl Dataset {
    pub fn testcase(&self, codename: &str) -> Option<&Testcase> {
        self.testcases.iter().find(|t| t.codename == codename)
    }

    pub fn codenames(&self) -> impl Iterator<Item = &str> {
        self.testcases.iter().map(|t| t.codename.as_str())
    }
}
