use crate::digest::Digest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable record of one contestant attempt (§3 "Submission"). Never
/// mutated after creation; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub participation_id: i64,
    pub task_id: i64,
    pub timestamp: DateTime<Utc>,
    /// Named source files, keyed by filename.
    pub files: HashMap<String, Digest>,
    pub language: Option<String>,
    pub token: bool,
}

impl Submission {
    /// Language to use when the submission itself does not name one:
    /// falls back to the dataset's task-type default (§3 supplement).
    pub fn resolved_language<'a>(&'a self, task_type_default: Option<&'a str>) -> Option<&'a str> {
        self.language.as_deref().or(task_type_default)
    }
}
