use crate::errors::ScoreTypeError;
use crate::group::GroupMin;
use crate::reducer::{Outcome, ReduceResult, ScoreType};

/// ICPC scoring: a submission either solves a problem or it doesn't.
/// Implemented as GroupMin over a binary-mapped outcome set rather than
/// a distinct reduction strategy, mirroring the upstream relationship
/// between `ICPC` and `GroupMin` (§4.7 supplement).
pub struct Icpc;

impl ScoreType for Icpc {
    fn reduce(
        &self,
        outcomes: &[Outcome],
        parameters: &serde_json::Value,
    ) -> Result<ReduceResult, ScoreTypeError> {
        let binary: Vec<Outcome> = outcomes
            .iter()
            .map(|o| Outcome {
                codename: o.codename.clone(),
                value: if o.value >= 1.0 { 1.0 } else { 0.0 },
                public: o.public,
            })
            .collect();

        GroupMin.reduce(&binary, parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_credit_outcomes_collapse_to_zero() {
        let outcomes = vec![
            Outcome { codename: "t1".into(), value: 0.7, public: true },
            Outcome { codename: "t2".into(), value: 1.0, public: true },
        ];
        let params = serde_json::json!({
            "groups": [{"max_points": 1.0, "testcases": ["t1", "t2"]}]
        });
        let result = Icpc.reduce(&outcomes, &params).unwrap();
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn all_full_credit_outcomes_solve_the_problem() {
        let outcomes = vec![
            Outcome { codename: "t1".into(), value: 1.0, public: true },
            Outcome { codename: "t2".into(), value: 1.0, public: true },
        ];
        let params = serde_json::json!({
            "groups": [{"max_points": 1.0, "testcases": ["t1", "t2"]}]
        });
        let result = Icpc.reduce(&outcomes, &params).unwrap();
        assert_eq!(result.score, 1.0);
    }
}
