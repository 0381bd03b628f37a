use crate::digest::Digest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompilationOutcome {
    Ok,
    Failed,
}

/// One testcase's outcome for a SubmissionResult (§3, Glossary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub codename: String,
    pub outcome: f64,
    pub text: Option<String>,
    pub execution_time_seconds: Option<f64>,
    pub memory_used_bytes: Option<u64>,
    /// Which worker produced this, for forensics only (§3 supplement).
    /// Never read by dispatch logic.
    pub produced_by: Option<String>,
}

/// Derived state for a (submission, dataset) pair (§3 "SubmissionResult").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub submission_id: i64,
    pub dataset_id: i64,
    pub compilation_outcome: Option<CompilationOutcome>,
    pub compilation_text: Option<String>,
    pub executables: HashMap<String, Digest>,
    pub evaluations: Vec<Evaluation>,
    pub evaluation_tries: u32,
    pub compilation_tries: u32,
    pub score: Option<f64>,
    pub score_details: Option<serde_json::Value>,
    pub public_score: Option<f64>,
    pub public_score_details: Option<serde_json::Value>,
    pub ranking_score_details: Option<serde_json::Value>,
    pub scored: bool,
    /// Set when a dependency's input digest was tombstoned mid-flight;
    /// the result is not fully evaluated but should not retry forever
    /// (§7 "Tombstoned input digest").
    pub partial: bool,
}

impl SubmissionResult {
    pub fn new(submission_id: i64, dataset_id: i64) -> Self {
        Self {
            submission_id,
            dataset_id,
            compilation_outcome: None,
            compilation_text: None,
            executables: HashMap::new(),
            evaluations: Vec::new(),
            evaluation_tries: 0,
            compilation_tries: 0,
            score: None,
            score_details: None,
            public_score: None,
            public_score_details: None,
            ranking_score_details: None,
            scored: false,
            partial: false,
        }
    }

    pub fn needs_compilation(&self) -> bool {
        self.compilation_outcome.is_none()
    }

    pub fn compilation_failed(&self) -> bool {
        matches!(self.compilation_outcome, Some(CompilationOutcome::Failed))
    }

    pub fn evaluation(&self, codename: &str) -> Option<&Evaluation> {
        self.evaluations.iter().find(|e| e.codename == codename)
    }

    pub fn missing_testcases<'a>(&self, codenames: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        codenames
            .filter(|c| self.evaluation(c).is_none())
            .collect()
    }

    /// Idempotent upsert: a re-delivered Evaluation for the same codename
    /// replaces the prior one rather than duplicating (§4.8, §4.9).
    pub fn upsert_evaluation(&mut self, evaluation: Evaluation) {
        if let Some(existing) = self
            .evaluations
            .iter_mut()
            .find(|e| e.codename == evaluation.codename)
        {
            *existing = evaluation;
        } else {
            self.evaluations.push(evaluation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_evaluation_is_idempotent() {
        let mut result = SubmissionResult::new(1, 1);
        result.upsert_evaluation(Evaluation {
            codename: "t1".into(),
            outcome: 1.0,
            text: None,
            execution_time_seconds: None,
            memory_used_bytes: None,
            produced_by: None,
        });
        result.upsert_evaluation(Evaluation {
            codename: "t1".into(),
            outcome: 1.0,
            text: None,
            execution_time_seconds: None,
            memory_used_bytes: None,
            produced_by: None,
        });
        assert_eq!(result.evaluations.len(), 1);
    }

    #[test]
    fn missing_testcases_reports_unevaluated_codenames() {
        let mut result = SubmissionResult::new(1, 1);
        result.upsert_evaluation(Evaluation {
            codename: "t1".into(),
            outcome: 1.0,
            text: None,
            execution_time_seconds: None,
            memory_used_bytes: None,
            produced_by: None,
        });
        let missing = result.missing_testcases(["t1", "t2", "t3"].into_iter());
        assert_eq!(missing, vec!["t2", "t3"]);
    }
}
