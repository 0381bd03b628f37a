/// A scored submission as seen by score-mode selection: just enough to
/// pick a winner among a participation's attempts (§9 supplement).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAttempt {
    pub submission_id: i64,
    pub score: f64,
    pub tokened: bool,
    pub is_last: bool,
}

/// Score modes decide which of a participation's submissions counts
/// toward the leaderboard for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    /// The best score among all submissions.
    Max,
    /// The best score among tokened submissions, or the last submission
    /// if nothing was tokened (§9 Open Question: resolved as "max over
    /// (tokened ∪ {last})").
    MaxTokenedLast,
}

impl ScoreMode {
    pub fn select<'a>(&self, attempts: &'a [ScoredAttempt]) -> Option<&'a ScoredAttempt> {
        match self {
            ScoreMode::Max => attempts
                .iter()
                .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal)),
            ScoreMode::MaxTokenedLast => attempts
                .iter()
                .filter(|a| a.tokened || a.is_last)
                .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(id: i64, score: f64, tokened: bool, is_last: bool) -> ScoredAttempt {
        ScoredAttempt { submission_id: id, score, tokened, is_last }
    }

    #[test]
    fn max_picks_the_highest_score_regardless_of_tokens() {
        let attempts = vec![attempt(1, 30.0, false, false), attempt(2, 90.0, false, true)];
        let best = ScoreMode::Max.select(&attempts).unwrap();
        assert_eq!(best.submission_id, 2);
    }

    #[test]
    fn max_tokened_last_ignores_untokened_non_last_attempts() {
        let attempts = vec![
            attempt(1, 100.0, false, false),
            attempt(2, 40.0, true, false),
            attempt(3, 60.0, false, true),
        ];
        let best = ScoreMode::MaxTokenedLast.select(&attempts).unwrap();
        assert_eq!(best.submission_id, 3);
    }

    #[test]
    fn max_tokened_last_falls_back_to_last_when_nothing_was_tokened() {
        let attempts = vec![attempt(1, 100.0, false, false), attempt(2, 10.0, false, true)];
        let best = ScoreMode::MaxTokenedLast.select(&attempts).unwrap();
        assert_eq!(best.submission_id, 2);
    }
}
