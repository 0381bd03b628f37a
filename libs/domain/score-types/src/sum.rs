use std::collections::HashMap;

use serde::Deserialize;

use crate::errors::ScoreTypeError;
use crate::reducer::{Outcome, ReduceResult, ScoreType};

#[derive(Debug, Deserialize, Default)]
struct SumParameters {
    #[serde(default)]
    weights: HashMap<String, f64>,
}

/// score = Σ outcomes·weight_i, weight defaults to 1.0 when unspecified
/// for a codename (§4.7).
pub struct Sum;

impl ScoreType for Sum {
    fn reduce(
        &self,
        outcomes: &[Outcome],
        parameters: &serde_json::Value,
    ) -> Result<ReduceResult, ScoreTypeError> {
        let params: SumParameters = if parameters.is_null() {
            SumParameters::default()
        } else {
            serde_json::from_value(parameters.clone())
                .map_err(|e| ScoreTypeError::InvalidParameters(e.to_string()))?
        };

        let weight_of = |codename: &str| params.weights.get(codename).copied().unwrap_or(1.0);

        let score: f64 = outcomes.iter().map(|o| o.value * weight_of(&o.codename)).sum();
        let public_score: f64 = outcomes
            .iter()
            .filter(|o| o.public)
            .map(|o| o.value * weight_of(&o.codename))
            .sum();

        let per_testcase: serde_json::Value = outcomes
            .iter()
            .map(|o| {
                serde_json::json!({
                    "codename": o.codename,
                    "outcome": o.value,
                    "weight": weight_of(&o.codename),
                })
            })
            .collect();

        Ok(ReduceResult {
            score,
            score_details: per_testcase.clone(),
            public_score,
            public_score_details: per_testcase.clone(),
            ranking_score_details: per_testcase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(codename: &str, value: f64, public: bool) -> Outcome {
        Outcome { codename: codename.to_string(), value, public }
    }

    #[test]
    fn default_weight_is_one() {
        let outcomes = vec![outcome("t1", 1.0, true), outcome("t2", 0.5, false)];
        let result = Sum.reduce(&outcomes, &serde_json::Value::Null).unwrap();
        assert_eq!(result.score, 1.5);
        assert_eq!(result.public_score, 1.0);
    }

    #[test]
    fn explicit_weights_scale_outcomes() {
        let outcomes = vec![outcome("t1", 1.0, true), outcome("t2", 1.0, true)];
        let params = serde_json::json!({"weights": {"t1": 2.0, "t2": 3.0}});
        let result = Sum.reduce(&outcomes, &params).unwrap();
        assert_eq!(result.score, 5.0);
    }
}
