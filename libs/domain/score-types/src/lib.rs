mod errors;
mod group;
mod icpc;
mod reducer;
mod score_mode;
mod sum;

pub use errors::ScoreTypeError;
pub use group::{GroupMin, GroupMul, GroupThreshold};
pub use icpc::Icpc;
pub use reducer::{Outcome, ReduceResult, ScoreType};
pub use score_mode::{ScoreMode, ScoredAttempt};

/// Resolves a score-type name to its reducer (C7), mirroring
/// `gradecore_task_types::dispatch`'s closed enum-dispatch shape.
pub fn dispatch(name: &str) -> Result<Box<dyn ScoreType>, ScoreTypeError> {
    match name {
        "Sum" => Ok(Box::new(sum::Sum)),
        "GroupMin" => Ok(Box::new(GroupMin)),
        "GroupMul" => Ok(Box::new(GroupMul)),
        "GroupThreshold" => Ok(Box::new(GroupThreshold)),
        "ICPC" => Ok(Box::new(Icpc)),
        other => Err(ScoreTypeError::UnknownScoreType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_resolves_every_known_score_type() {
        for name in ["Sum", "GroupMin", "GroupMul", "GroupThreshold", "ICPC"] {
            assert!(dispatch(name).is_ok(), "{name} should resolve");
        }
    }

    #[test]
    fn dispatch_rejects_unknown_score_type() {
        assert!(matches!(dispatch("Bogus"), Err(ScoreTypeError::UnknownScoreType(_))));
    }
}
