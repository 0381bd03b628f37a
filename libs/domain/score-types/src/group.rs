use serde::Deserialize;

use crate::errors::ScoreTypeError;
use crate::reducer::{find, Outcome, ReduceResult, ScoreType};

#[derive(Debug, Deserialize)]
struct GroupSpec {
    max_points: f64,
    testcases: Vec<String>,
    /// Per-group thresholds for GroupThreshold; ignored by Min/Mul.
    p1: Option<f64>,
    p2: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GroupParameters {
    groups: Vec<GroupSpec>,
    /// Fallback thresholds when a group does not specify its own.
    #[serde(default)]
    p1: Option<f64>,
    #[serde(default)]
    p2: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupMode {
    Min,
    Mul,
    Threshold,
}

fn reduce_groups(
    mode: GroupMode,
    outcomes: &[Outcome],
    parameters: &serde_json::Value,
) -> Result<ReduceResult, ScoreTypeError> {
    let params: GroupParameters = serde_json::from_value(parameters.clone())
        .map_err(|e| ScoreTypeError::InvalidParameters(e.to_string()))?;

    let mut score = 0.0;
    let mut public_score = 0.0;
    let mut details = Vec::new();
    let mut public_details = Vec::new();

    for group in &params.groups {
        let mut values = Vec::with_capacity(group.testcases.len());
        let mut public_values = Vec::new();
        for codename in &group.testcases {
            let outcome = find(outcomes, codename)
                .ok_or_else(|| ScoreTypeError::MissingOutcome(codename.clone()))?;
            values.push(outcome.value);
            if outcome.public {
                public_values.push(outcome.value);
            }
        }

        let group_score = match mode {
            GroupMode::Min => group.max_points * values.iter().cloned().fold(1.0_f64, f64::min),
            GroupMode::Mul => group.max_points * values.iter().product::<f64>(),
            GroupMode::Threshold => {
                let p1 = group.p1.or(params.p1).unwrap_or(0.0);
                let p2 = group.p2.or(params.p2).unwrap_or(1.0);
                threshold_score(group.max_points, &values, p1, p2)
            }
        };
        score += group_score;
        details.push(serde_json::json!({
            "testcases": group.testcases,
            "max_points": group.max_points,
            "score": group_score,
        }));

        if !public_values.is_empty() {
            let public_group_score = match mode {
                GroupMode::Min => group.max_points * public_values.iter().cloned().fold(1.0_f64, f64::min),
                GroupMode::Mul => group.max_points * public_values.iter().product::<f64>(),
                GroupMode::Threshold => {
                    let p1 = group.p1.or(params.p1).unwrap_or(0.0);
                    let p2 = group.p2.or(params.p2).unwrap_or(1.0);
                    threshold_score(group.max_points, &public_values, p1, p2)
                }
            };
            public_score += public_group_score;
            public_details.push(serde_json::json!({
                "testcases": group.testcases,
                "max_points": group.max_points,
                "score": public_group_score,
            }));
        }
    }

    Ok(ReduceResult {
        score,
        score_details: serde_json::Value::Array(details),
        public_score,
        public_score_details: serde_json::Value::Array(public_details),
        ranking_score_details: serde_json::json!({"score": score}),
    })
}

/// Corrected GroupThreshold ("Meteo"-style) interpolation (§9): the
/// mean outcome value below `p1` scores zero, above `p2` scores max,
/// and linearly interpolates in between using the actual `p1`
/// parameter rather than a hard-coded constant.
fn threshold_score(max_points: f64, values: &[f64], p1: f64, p2: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let fraction = values.iter().sum::<f64>() / values.len() as f64;
    if fraction < p1 {
        0.0
    } else if fraction > p2 {
        max_points
    } else {
        max_points * (fraction - p1) / (p2 - p1)
    }
}

pub struct GroupMin;
impl ScoreType for GroupMin {
    fn reduce(&self, outcomes: &[Outcome], parameters: &serde_json::Value) -> Result<ReduceResult, ScoreTypeError> {
        reduce_groups(GroupMode::Min, outcomes, parameters)
    }
}

pub struct GroupMul;
impl ScoreType for GroupMul {
    fn reduce(&self, outcomes: &[Outcome], parameters: &serde_json::Value) -> Result<ReduceResult, ScoreTypeError> {
        reduce_groups(GroupMode::Mul, outcomes, parameters)
    }
}

pub struct GroupThreshold;
impl ScoreType for GroupThreshold {
    fn reduce(&self, outcomes: &[Outcome], parameters: &serde_json::Value) -> Result<ReduceResult, ScoreTypeError> {
        reduce_groups(GroupMode::Threshold, outcomes, parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(codename: &str, value: f64) -> Outcome {
        Outcome { codename: codename.to_string(), value, public: true }
    }

    fn one_group_params(p1: f64, p2: f64) -> serde_json::Value {
        serde_json::json!({
            "groups": [{"max_points": 100.0, "testcases": ["t1", "t2", "t3"], "p1": p1, "p2": p2}]
        })
    }

    #[test]
    fn group_min_takes_the_worst_testcase_in_the_group() {
        let outcomes = vec![outcome("t1", 1.0), outcome("t2", 0.0), outcome("t3", 1.0)];
        let params = serde_json::json!({
            "groups": [{"max_points": 100.0, "testcases": ["t1", "t2", "t3"]}]
        });
        let result = GroupMin.reduce(&outcomes, &params).unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn group_mul_multiplies_outcomes_in_the_group() {
        let outcomes = vec![outcome("t1", 0.5), outcome("t2", 0.5), outcome("t3", 1.0)];
        let params = serde_json::json!({
            "groups": [{"max_points": 100.0, "testcases": ["t1", "t2", "t3"]}]
        });
        let result = GroupMul.reduce(&outcomes, &params).unwrap();
        assert_eq!(result.score, 25.0);
    }

    #[test]
    fn threshold_uses_p1_not_a_hardcoded_constant() {
        // Regression for the §9 GroupMeteo bug: P1 = 0.3 must shift where
        // the linear segment starts, not a hard-coded 0.15.
        let outcomes = vec![outcome("t1", 1.0), outcome("t2", 0.0), outcome("t3", 1.0)];
        let fraction = 2.0 / 3.0;
        let result = GroupThreshold
            .reduce(&outcomes, &one_group_params(0.3, 0.95))
            .unwrap();
        let expected = 100.0 * (fraction - 0.3) / (0.95 - 0.3);
        assert!((result.score - expected).abs() < 1e-9);
    }

    #[test]
    fn threshold_below_p1_scores_zero_and_above_p2_scores_max() {
        let all_fail = vec![outcome("t1", 0.0), outcome("t2", 0.0), outcome("t3", 0.0)];
        let low = GroupThreshold.reduce(&all_fail, &one_group_params(0.3, 0.95)).unwrap();
        assert_eq!(low.score, 0.0);

        let all_pass = vec![outcome("t1", 1.0), outcome("t2", 1.0), outcome("t3", 1.0)];
        let high = GroupThreshold.reduce(&all_pass, &one_group_params(0.3, 0.95)).unwrap();
        assert_eq!(high.score, 100.0);
    }

    #[test]
    fn threshold_averages_partial_credit_rather_than_counting_full_passes() {
        // t1 and t2 each half-correct, t3 fully correct: mean is 2/3,
        // not count(>=1.0)/len which would give 1/3 here.
        let outcomes = vec![outcome("t1", 0.5), outcome("t2", 0.5), outcome("t3", 1.0)];
        let fraction = 2.0 / 3.0;
        let result = GroupThreshold
            .reduce(&outcomes, &one_group_params(0.3, 0.95))
            .unwrap();
        let expected = 100.0 * (fraction - 0.3) / (0.95 - 0.3);
        assert!((result.score - expected).abs() < 1e-9);
    }

    #[test]
    fn missing_outcome_for_grouped_testcase_is_an_error() {
        let outcomes = vec![outcome("t1", 1.0)];
        let params = serde_json::json!({
            "groups": [{"max_points": 100.0, "testcases": ["t1", "t2"]}]
        });
        assert!(matches!(
            GroupMin.reduce(&outcomes, &params),
            Err(ScoreTypeError::MissingOutcome(_))
        ));
    }
}
