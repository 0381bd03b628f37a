use crate::errors::ScoreTypeError;

/// One testcase's outcome handed to a reducer. `public` mirrors the
/// dataset's Testcase.public flag and drives the separate public-score
/// accumulator (§3 supplement).
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub codename: String,
    pub value: f64,
    pub public: bool,
}

/// Everything a reducer returns in one pass (§4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceResult {
    pub score: f64,
    pub score_details: serde_json::Value,
    pub public_score: f64,
    pub public_score_details: serde_json::Value,
    pub ranking_score_details: serde_json::Value,
}

/// A reducer is a pure function of (outcomes, parameters). No reducer
/// implementation may hold state between calls (§4.7, §8 reducer
/// purity law).
pub trait ScoreType: Send + Sync {
    fn reduce(
        &self,
        outcomes: &[Outcome],
        parameters: &serde_json::Value,
    ) -> Result<ReduceResult, ScoreTypeError>;
}

pub(crate) fn find<'a>(outcomes: &'a [Outcome], codename: &str) -> Option<&'a Outcome> {
    outcomes.iter().find(|o| o.codename == codename)
}
