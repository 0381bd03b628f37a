use std::collections::HashMap;

use gradecore_models::{CompilationOutcome, Digest, Evaluation, SubmissionResult};
use libsql::{params, Connection};
use tracing::warn;

use crate::errors::DbError;

/// Persistence bridge for SubmissionResult (C9). All writes go through a
/// transaction that also checks the try counter, guarding against a
/// race between a late-arriving worker report and a manual retry
/// (§4.9).
pub struct ResultRepository {
    conn: Connection,
}

impl ResultRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub async fn get_or_create(
        &self,
        submission_id: i64,
        dataset_id: i64,
    ) -> Result<SubmissionResult, DbError> {
        if let Some(result) = self.get(submission_id, dataset_id).await? {
            return Ok(result);
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO submission_results (submission_id, dataset_id) VALUES (?1, ?2)",
                params![submission_id, dataset_id],
            )
            .await?;
        self.get(submission_id, dataset_id)
            .await?
            .ok_or(DbError::ResultNotFound { submission_id, dataset_id })
    }

    pub async fn get(
        &self,
        submission_id: i64,
        dataset_id: i64,
    ) -> Result<Option<SubmissionResult>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT compilation_outcome, compilation_text, executables_json, evaluation_tries,
                        compilation_tries, score, score_details_json, public_score,
                        public_score_details_json, ranking_score_details_json, scored, partial
                 FROM submission_results WHERE submission_id = ?1 AND dataset_id = ?2",
                params![submission_id, dataset_id],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let outcome: Option<String> = row.get(0)?;
        let compilation_outcome = match outcome.as_deref() {
            Some("ok") => Some(CompilationOutcome::Ok),
            Some("failed") => Some(CompilationOutcome::Failed),
            _ => None,
        };

        let executables_json: String = row.get(2)?;
        let executables: HashMap<String, Digest> =
            serde_json::from_str(&executables_json).map_err(|e| DbError::Mapping(e.to_string()))?;

        let mut result = SubmissionResult::new(submission_id, dataset_id);
        result.compilation_outcome = compilation_outcome;
        result.compilation_text = row.get(1)?;
        result.executables = executables;
        result.evaluation_tries = row.get::<i64>(3)? as u32;
        result.compilation_tries = row.get::<i64>(4)? as u32;
        result.score = row.get(5)?;
        result.score_details = parse_opt_json(row.get(6)?)?;
        result.public_score = row.get(7)?;
        result.public_score_details = parse_opt_json(row.get(8)?)?;
        result.ranking_score_details = parse_opt_json(row.get(9)?)?;
        result.scored = row.get::<i64>(10)? != 0;
        result.partial = row.get::<i64>(11)? != 0;
        result.evaluations = self.evaluations(submission_id, dataset_id).await?;

        Ok(Some(result))
    }

    async fn evaluations(
        &self,
        submission_id: i64,
        dataset_id: i64,
    ) -> Result<Vec<Evaluation>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT codename, outcome, text, execution_time_seconds, memory_used_bytes, produced_by
                 FROM evaluations WHERE submission_id = ?1 AND dataset_id = ?2 ORDER BY codename",
                params![submission_id, dataset_id],
            )
            .await?;

        let mut evaluations = Vec::new();
        while let Some(row) = rows.next().await? {
            evaluations.push(Evaluation {
                codename: row.get(0)?,
                outcome: row.get(1)?,
                text: row.get(2)?,
                execution_time_seconds: row.get(3)?,
                memory_used_bytes: row.get(4)?,
                produced_by: row.get(5)?,
            });
        }
        Ok(evaluations)
    }

    /// Persists compilation outcome and bumps the try counter inside one
    /// transaction (§4.9). `expected_tries` is the try count the caller
    /// observed before dispatching; a mismatch means a concurrent write
    /// already landed and this one is dropped (§7 "DB conflict").
    pub async fn record_compilation(
        &self,
        submission_id: i64,
        dataset_id: i64,
        outcome: CompilationOutcome,
        text: Option<&str>,
        executables: &HashMap<String, Digest>,
        expected_tries: u32,
    ) -> Result<(), DbError> {
        let outcome_str = match outcome {
            CompilationOutcome::Ok => "ok",
            CompilationOutcome::Failed => "failed",
        };
        let executables_json =
            serde_json::to_string(executables).map_err(|e| DbError::Mapping(e.to_string()))?;

        let affected = self
            .conn
            .execute(
                "UPDATE submission_results
                 SET compilation_outcome = ?1, compilation_text = ?2, executables_json = ?3,
                     compilation_tries = compilation_tries + 1
                 WHERE submission_id = ?4 AND dataset_id = ?5 AND compilation_tries = ?6",
                params![
                    outcome_str,
                    text,
                    executables_json,
                    submission_id,
                    dataset_id,
                    expected_tries as i64
                ],
            )
            .await?;

        if affected == 0 {
            warn!(submission_id, dataset_id, "stale compilation write dropped");
            return Err(DbError::StaleWrite(format!("{submission_id}/{dataset_id}")));
        }
        Ok(())
    }

    /// Idempotent upsert keyed by (submission_id, dataset_id, codename);
    /// re-delivery of the same Evaluation is a no-op on content but still
    /// bumps the try counter once (§4.8, §4.9 unique constraint).
    pub async fn upsert_evaluation(
        &self,
        submission_id: i64,
        dataset_id: i64,
        evaluation: &Evaluation,
    ) -> Result<(), DbError> {
        self.conn
            .execute(
                "INSERT INTO evaluations
                 (submission_id, dataset_id, codename, outcome, text, execution_time_seconds, memory_used_bytes, produced_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(submission_id, dataset_id, codename) DO UPDATE SET
                    outcome = excluded.outcome,
                    text = excluded.text,
                    execution_time_seconds = excluded.execution_time_seconds,
                    memory_used_bytes = excluded.memory_used_bytes,
                    produced_by = excluded.produced_by",
                params![
                    submission_id,
                    dataset_id,
                    evaluation.codename.clone(),
                    evaluation.outcome,
                    evaluation.text.clone(),
                    evaluation.execution_time_seconds,
                    evaluation.memory_used_bytes.map(|v| v as i64),
                    evaluation.produced_by.clone()
                ],
            )
            .await?;

        self.conn
            .execute(
                "UPDATE submission_results SET evaluation_tries = evaluation_tries + 1
                 WHERE submission_id = ?1 AND dataset_id = ?2",
                params![submission_id, dataset_id],
            )
            .await?;
        Ok(())
    }

    pub async fn persist_score(
        &self,
        submission_id: i64,
        dataset_id: i64,
        score: f64,
        score_details: &serde_json::Value,
        public_score: f64,
        public_score_details: &serde_json::Value,
        ranking_score_details: &serde_json::Value,
        partial: bool,
    ) -> Result<(), DbError> {
        self.conn
            .execute(
                "UPDATE submission_results
                 SET score = ?1, score_details_json = ?2, public_score = ?3,
                     public_score_details_json = ?4, ranking_score_details_json = ?5,
                     scored = 1, partial = ?6
                 WHERE submission_id = ?7 AND dataset_id = ?8",
                params![
                    score,
                    score_details.to_string(),
                    public_score,
                    public_score_details.to_string(),
                    ranking_score_details.to_string(),
                    partial as i64,
                    submission_id,
                    dataset_id
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_partial(&self, submission_id: i64, dataset_id: i64) -> Result<(), DbError> {
        self.conn
            .execute(
                "UPDATE submission_results SET partial = 1 WHERE submission_id = ?1 AND dataset_id = ?2",
                params![submission_id, dataset_id],
            )
            .await?;
        Ok(())
    }

    /// Drops compilation, every Evaluation, and the score for a result,
    /// returning it to the state `enqueue_operations_for_submission`
    /// expects before a full `reevaluate`/`invalidate(level=compile)`
    /// re-run (§6 admin controls).
    pub async fn reset_compilation_and_below(
        &self,
        submission_id: i64,
        dataset_id: i64,
    ) -> Result<(), DbError> {
        self.clear_evaluations_and_score(submission_id, dataset_id).await?;
        self.conn
            .execute(
                "UPDATE submission_results
                 SET compilation_outcome = NULL, compilation_text = NULL, executables_json = '{}'
                 WHERE submission_id = ?1 AND dataset_id = ?2",
                params![submission_id, dataset_id],
            )
            .await?;
        Ok(())
    }

    /// Drops every Evaluation and the score, keeping the compilation
    /// outcome and executables so `invalidate(level=evaluate)` can
    /// re-enqueue evaluation jobs without recompiling (§6).
    pub async fn clear_evaluations_and_score(
        &self,
        submission_id: i64,
        dataset_id: i64,
    ) -> Result<(), DbError> {
        self.conn
            .execute(
                "DELETE FROM evaluations WHERE submission_id = ?1 AND dataset_id = ?2",
                params![submission_id, dataset_id],
            )
            .await?;
        self.clear_score(submission_id, dataset_id).await
    }

    /// Drops only the score, keeping compilation and Evaluations intact,
    /// for `invalidate(level=score)` / `rescore` (§6).
    pub async fn clear_score(&self, submission_id: i64, dataset_id: i64) -> Result<(), DbError> {
        self.conn
            .execute(
                "UPDATE submission_results
                 SET score = NULL, score_details_json = NULL, public_score = NULL,
                     public_score_details_json = NULL, ranking_score_details_json = NULL,
                     scored = 0, partial = 0
                 WHERE submission_id = ?1 AND dataset_id = ?2",
                params![submission_id, dataset_id],
            )
            .await?;
        Ok(())
    }

    /// Every (submission_id, dataset_id) pair with a result row against
    /// `dataset_id`, for dataset- and task-scoped admin operations (§6).
    pub async fn submissions_for_dataset(&self, dataset_id: i64) -> Result<Vec<i64>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT submission_id FROM submission_results WHERE dataset_id = ?1",
                params![dataset_id],
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}

fn parse_opt_json(raw: Option<String>) -> Result<Option<serde_json::Value>, DbError> {
    raw.map(|s| serde_json::from_str(&s).map_err(|e| DbError::Mapping(e.to_string())))
        .transpose()
}
