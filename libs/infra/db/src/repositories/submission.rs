use std::collections::HashMap;

use gradecore_models::{Digest, Submission};
use libsql::{params, Connection};

use crate::errors::DbError;

pub struct SubmissionRepository {
    conn: Connection,
}

impl SubmissionRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Fetches a submission eagerly with its source file digests, so the
    /// orchestrator can build Jobs without a further query (§4.9).
    pub async fn get(&self, submission_id: i64) -> Result<Submission, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, participation_id, task_id, timestamp, files_json, language, token
                 FROM submissions WHERE id = ?1",
                params![submission_id],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Err(DbError::SubmissionNotFound(submission_id));
        };

        let files_json: String = row.get(4)?;
        let files: HashMap<String, Digest> = serde_json::from_str(&files_json)
            .map_err(|e| DbError::Mapping(e.to_string()))?;

        Ok(Submission {
            id: row.get(0)?,
            participation_id: row.get(1)?,
            task_id: row.get(2)?,
            timestamp: row.get::<String>(3)?.parse().map_err(|e: chrono::ParseError| {
                DbError::Mapping(e.to_string())
            })?,
            files,
            language: row.get(5)?,
            token: row.get::<i64>(6)? != 0,
        })
    }

    /// Every submission id for a task, for `reevaluate(task_id)` (§6).
    pub async fn ids_for_task(&self, task_id: i64) -> Result<Vec<i64>, DbError> {
        let mut rows = self
            .conn
            .query("SELECT id FROM submissions WHERE task_id = ?1", params![task_id])
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    pub async fn create(&self, submission: &Submission) -> Result<(), DbError> {
        let files_json =
            serde_json::to_string(&submission.files).map_err(|e| DbError::Mapping(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO submissions (id, participation_id, task_id, timestamp, files_json, language, token)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    submission.id,
                    submission.participation_id,
                    submission.task_id,
                    submission.timestamp.to_rfc3339(),
                    files_json,
                    submission.language.clone(),
                    submission.token as i64
                ],
            )
            .await?;
        Ok(())
    }
}
