use serde::{Deserialize, Serialize};

/// The closed set of stage kinds the pipeline knows how to dispatch.
/// New kinds require a coordinated change to the queue fabric and the
/// job model (§4.2 of the grading pipeline spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Compilation,
    Evaluation,
    UserTestCompilation,
    UserTestEvaluation,
}

impl OperationKind {
    pub fn is_compilation(self) -> bool {
        matches!(self, Self::Compilation | Self::UserTestCompilation)
    }

    pub fn is_user_test(self) -> bool {
        matches!(self, Self::UserTestCompilation | Self::UserTestEvaluation)
    }

    /// The `jobs.kind` column value this operation kind dispatches under
    /// (§4.2, §4.4).
    pub fn as_job_kind(self) -> &'static str {
        match self {
            Self::Compilation => "Compilation",
            Self::Evaluation => "Evaluation",
            Self::UserTestCompilation => "UserTestCompilation",
            Self::UserTestEvaluation => "UserTestEvaluation",
        }
    }
}

/// Dispatch priority band. Lower numeric value dispatches sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    ExtraHigh = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    /// Demote one band, saturating at Low. Used when a job is retried.
    pub fn demoted(self) -> Self {
        match self {
            Self::ExtraHigh => Self::High,
            Self::High => Self::Medium,
            Self::Medium => Self::Low,
            Self::Low => Self::Low,
        }
    }

    pub fn as_db_value(self) -> i64 {
        self as i64
    }
}

/// Pure value naming *what* must happen, never *how*. Equality over all
/// fields is the deduplication key used by the queue set (§4.2, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub object_id: i64,
    pub dataset_id: i64,
    /// Only set for Evaluation / UserTestEvaluation.
    pub testcase_codename: Option<String>,
}

impl Operation {
    pub fn compilation(object_id: i64, dataset_id: i64) -> Self {
        Self {
            kind: OperationKind::Compilation,
            object_id,
            dataset_id,
            testcase_codename: None,
        }
    }

    pub fn evaluation(object_id: i64, dataset_id: i64, codename: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Evaluation,
            object_id,
            dataset_id,
            testcase_codename: Some(codename.into()),
        }
    }

    /// Fresh-dispatch priority for this operation kind, before any retry
    /// demotion is applied (§3 "Priority").
    pub fn base_priority(&self) -> Priority {
        match self.kind {
            OperationKind::Compilation => Priority::High,
            OperationKind::Evaluation => Priority::Medium,
            OperationKind::UserTestCompilation | OperationKind::UserTestEvaluation => {
                Priority::High
            }
        }
    }

    /// Priority after accounting for retry count: each retry demotes the
    /// band by one, saturating at Low.
    pub fn priority_for_try(&self, try_count: u32) -> Priority {
        let mut priority = self.base_priority();
        for _ in 0..try_count {
            priority = priority.demoted();
        }
        priority
    }
}
