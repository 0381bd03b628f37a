use chrono::{Duration, Utc};
use libsql::{params, Connection};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::DbError;

/// Lease held by a worker while a job is active, before it is considered
/// a zombie and reclaimed (§4.4, mirroring the teacher's zombie-recovery
/// phase in `JobRepository::assign_mission_to_worker`).
const LEASE_SECONDS: i64 = 600;
const MAX_TRIES: i64 = 3;

#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: String,
    pub kind: String,
    pub object_id: i64,
    pub dataset_id: i64,
    pub testcase_codename: Option<String>,
    pub payload_json: String,
    pub try_count: i64,
}

/// Priority × kind multiqueue and dependency fan-in/fan-out, backed by
/// the `jobs` / `job_dependencies` tables (C4).
pub struct QueueRepository {
    conn: Connection,
}

impl QueueRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Enqueues an operation. If dependencies are given, the job starts
    /// `blocked` and only becomes `queued` once every prerequisite
    /// reports success (§4.4 "Dependency", "Fan-in"). A no-op if the
    /// same (kind, object_id, dataset_id, codename) already has a
    /// non-terminal job (enforced by `idx_jobs_dedup`).
    #[instrument(skip(self, payload_json))]
    pub async fn enqueue(
        &self,
        kind: &str,
        object_id: i64,
        dataset_id: i64,
        testcase_codename: Option<&str>,
        priority: i64,
        payload_json: &str,
        depends_on: &[String],
    ) -> Result<String, DbError> {
        let id = Uuid::new_v4().to_string();
        let status = if depends_on.is_empty() {
            "queued"
        } else {
            "blocked"
        };

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO jobs
                 (id, kind, object_id, dataset_id, testcase_codename, priority, status, payload_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.clone(),
                    kind,
                    object_id,
                    dataset_id,
                    testcase_codename,
                    priority,
                    status,
                    payload_json
                ],
            )
            .await?;

        if inserted == 0 {
            tx.commit().await.map_err(|e| DbError::Transaction(e.to_string()))?;
            return Ok(id); // deduplicated: a non-terminal job already covers this operation
        }

        for prereq in depends_on {
            tx.execute(
                "INSERT INTO job_dependencies (job_id, prerequisite_job_id) VALUES (?1, ?2)",
                params![id.clone(), prereq.clone()],
            )
            .await?;
        }

        tx.commit().await.map_err(|e| DbError::Transaction(e.to_string()))?;
        Ok(id)
    }

    /// Reclaims jobs whose lease expired (§4.4 durability across
    /// restarts), then claims the highest-priority eligible job for one
    /// of `kinds`. Ties within a band resolve FIFO by `created_at`.
    #[instrument(skip(self, kinds))]
    pub async fn claim_next(
        &self,
        shard: &str,
        kinds: &[String],
    ) -> Result<Option<ClaimedJob>, DbError> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        let expiry = Utc::now() - Duration::seconds(LEASE_SECONDS);
        let reclaimed = tx
            .execute(
                "UPDATE jobs SET status = 'queued', lease_owner = NULL, lease_deadline = NULL
                 WHERE status = 'active' AND lease_deadline < ?1",
                params![expiry.to_rfc3339()],
            )
            .await?;
        if reclaimed > 0 {
            warn!(count = reclaimed, "reclaimed zombie job leases");
        }

        if kinds.is_empty() {
            tx.commit().await.map_err(|e| DbError::Transaction(e.to_string()))?;
            return Ok(None);
        }

        let placeholders: Vec<String> = (1..=kinds.len()).map(|i| format!("?{}", i)).collect();
        let query = format!(
            "SELECT id, kind, object_id, dataset_id, testcase_codename, payload_json, try_count
             FROM jobs
             WHERE status = 'queued' AND kind IN ({})
             ORDER BY priority ASC, created_at ASC
             LIMIT 1",
            placeholders.join(", ")
        );

        let mut params_vec: Vec<libsql::Value> = Vec::new();
        for k in kinds {
            params_vec.push(libsql::Value::Text(k.clone()));
        }

        let mut rows = tx.query(&query, params_vec).await?;
        let Some(row) = rows.next().await? else {
            tx.commit().await.map_err(|e| DbError::Transaction(e.to_string()))?;
            return Ok(None);
        };

        let job = ClaimedJob {
            id: row.get(0)?,
            kind: row.get(1)?,
            object_id: row.get(2)?,
            dataset_id: row.get(3)?,
            testcase_codename: row.get(4)?,
            payload_json: row.get(5)?,
            try_count: row.get(6)?,
        };

        let deadline = Utc::now() + Duration::seconds(LEASE_SECONDS);
        tx.execute(
            "UPDATE jobs SET status = 'active', lease_owner = ?1, lease_deadline = ?2 WHERE id = ?3",
            params![shard, deadline.to_rfc3339(), job.id.clone()],
        )
        .await?;

        tx.commit().await.map_err(|e| DbError::Transaction(e.to_string()))?;
        info!(job_id = %job.id, shard, "job claimed");
        Ok(Some(job))
    }

    /// Direct dependents of a job and their current payload, so the
    /// caller can rewrite a dependent's embedded Job (e.g. splicing
    /// compiled executables into a blocked evaluation) before it
    /// unblocks (§4.5 step 2, mirrors `mark_compilation_success`).
    pub async fn dependent_payloads(&self, job_id: &str) -> Result<Vec<(String, String)>, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT j.id, j.payload_json FROM job_dependencies jd
                 JOIN jobs j ON j.id = jd.job_id
                 WHERE jd.prerequisite_job_id = ?1",
                params![job_id],
            )
            .await?;
        let mut dependents = Vec::new();
        while let Some(row) = rows.next().await? {
            dependents.push((row.get(0)?, row.get(1)?));
        }
        Ok(dependents)
    }

    pub async fn update_payload(&self, job_id: &str, payload_json: &str) -> Result<(), DbError> {
        self.conn
            .execute(
                "UPDATE jobs SET payload_json = ?1 WHERE id = ?2",
                params![payload_json, job_id],
            )
            .await?;
        Ok(())
    }

    /// Marks a job done and unblocks any dependents whose every
    /// prerequisite has now succeeded (§4.4 "Fan-in").
    pub async fn complete(&self, job_id: &str) -> Result<(), DbError> {
        let affected = self
            .conn
            .execute("UPDATE jobs SET status = 'done' WHERE id = ?1", params![job_id])
            .await?;
        if affected == 0 {
            return Err(DbError::JobNotFound(job_id.to_string()));
        }
        self.unblock_dependents(job_id).await
    }

    async fn unblock_dependents(&self, job_id: &str) -> Result<(), DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT job_id FROM job_dependencies WHERE prerequisite_job_id = ?1",
                params![job_id],
            )
            .await?;

        let mut dependents = Vec::new();
        while let Some(row) = rows.next().await? {
            dependents.push(row.get::<String>(0)?);
        }

        for dependent in dependents {
            let mut unmet = self
                .conn
                .query(
                    "SELECT COUNT(*) FROM job_dependencies jd
                     JOIN jobs p ON p.id = jd.prerequisite_job_id
                     WHERE jd.job_id = ?1 AND p.status != 'done'",
                    params![dependent.clone()],
                )
                .await?;
            let remaining: i64 = unmet.next().await?.map(|r| r.get(0)).transpose()?.unwrap_or(0);
            if remaining == 0 {
                self.conn
                    .execute(
                        "UPDATE jobs SET status = 'queued' WHERE id = ?1 AND status = 'blocked'",
                        params![dependent],
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Requeues a job that failed for infrastructure reasons, demoting
    /// its priority band, or escalates to `stuck` past `MAX_TRIES`
    /// (§4.5 step 4, §7 "Sandbox/infrastructure fault").
    pub async fn retry_or_escalate(&self, job_id: &str) -> Result<bool, DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT try_count, priority FROM jobs WHERE id = ?1",
                params![job_id],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Err(DbError::JobNotFound(job_id.to_string()));
        };
        let try_count: i64 = row.get(0)?;
        let priority: i64 = row.get(1)?;

        if try_count + 1 >= MAX_TRIES {
            self.conn
                .execute(
                    "UPDATE jobs SET status = 'stuck', try_count = try_count + 1 WHERE id = ?1",
                    params![job_id],
                )
                .await?;
            warn!(job_id, "retries exhausted, escalated to stuck");
            return Ok(false);
        }

        let demoted = (priority + 1).min(3);
        self.conn
            .execute(
                "UPDATE jobs SET status = 'queued', try_count = try_count + 1, priority = ?2,
                 lease_owner = NULL, lease_deadline = NULL WHERE id = ?1",
                params![job_id, demoted],
            )
            .await?;
        Ok(true)
    }

    /// Count of jobs escalated to `stuck`, for reaper alerting (§6
    /// "admin-visible").
    pub async fn count_stuck(&self) -> Result<i64, DbError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM jobs WHERE status = 'stuck'", ())
            .await?;
        let count = rows.next().await?.map(|row| row.get(0)).transpose()?.unwrap_or(0);
        Ok(count)
    }

    /// Cancels every non-terminal job belonging to a submission, across
    /// all its datasets (§6 `cancel(submission_id)`).
    pub async fn cancel_submission(&self, submission_id: i64) -> Result<(), DbError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM jobs WHERE object_id = ?1 AND status IN ('queued', 'active', 'blocked')",
                params![submission_id],
            )
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        for id in ids {
            self.cancel_cascade(&id).await?;
        }
        Ok(())
    }

    /// Cancels a job and cascades to every transitive dependent with
    /// `cause = upstream_cancelled` (§5 "Cancellation").
    pub async fn cancel_cascade(&self, job_id: &str) -> Result<(), DbError> {
        self.conn
            .execute(
                "UPDATE jobs SET status = 'cancelled' WHERE id = ?1",
                params![job_id],
            )
            .await?;

        let mut rows = self
            .conn
            .query(
                "SELECT job_id FROM job_dependencies WHERE prerequisite_job_id = ?1",
                params![job_id],
            )
            .await?;
        let mut dependents = Vec::new();
        while let Some(row) = rows.next().await? {
            dependents.push(row.get::<String>(0)?);
        }

        for dependent in dependents {
            Box::pin(self.cancel_cascade(&dependent)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DbClient;

    async fn queue() -> QueueRepository {
        let client = DbClient::connect(":memory:").await.unwrap();
        QueueRepository::new(client.connection().unwrap())
    }

    #[tokio::test]
    async fn enqueue_is_idempotent() {
        let q = queue().await;
        let a = q
            .enqueue("Compilation", 1, 1, None, 1, "{}", &[])
            .await
            .unwrap();
        let b = q
            .enqueue("Compilation", 1, 1, None, 1, "{}", &[])
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn dependency_unblocks_only_after_prerequisite_completes() {
        let q = queue().await;
        let compile = q
            .enqueue("Compilation", 1, 1, None, 1, "{}", &[])
            .await
            .unwrap();
        let eval = q
            .enqueue(
                "Evaluation",
                1,
                1,
                Some("t1"),
                2,
                "{}",
                &[compile.clone()],
            )
            .await
            .unwrap();

        let claimed = q
            .claim_next("shard-0", &["Evaluation".to_string()])
            .await
            .unwrap();
        assert!(claimed.is_none(), "evaluation must not dispatch before compile succeeds");

        q.complete(&compile).await.unwrap();

        let claimed = q
            .claim_next("shard-0", &["Evaluation".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, eval);
    }

    #[tokio::test]
    async fn priority_band_is_respected() {
        let q = queue().await;
        q.enqueue("Evaluation", 1, 1, Some("t1"), 2, "{}", &[])
            .await
            .unwrap();
        let high = q
            .enqueue("Compilation", 2, 1, None, 1, "{}", &[])
            .await
            .unwrap();

        let claimed = q
            .claim_next("shard-0", &["Evaluation".to_string(), "Compilation".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, high);
    }

    #[tokio::test]
    async fn retry_exhaustion_escalates_to_stuck() {
        let q = queue().await;
        let id = q
            .enqueue("Compilation", 1, 1, None, 1, "{}", &[])
            .await
            .unwrap();
        q.claim_next("shard-0", &["Compilation".to_string()])
            .await
            .unwrap();
        assert!(q.retry_or_escalate(&id).await.unwrap());
        q.claim_next("shard-0", &["Compilation".to_string()])
            .await
            .unwrap();
        assert!(q.retry_or_escalate(&id).await.unwrap());
        q.claim_next("shard-0", &["Compilation".to_string()])
            .await
            .unwrap();
        assert!(!q.retry_or_escalate(&id).await.unwrap());
    }

    #[tokio::test]
    async fn cancel_cascades_to_dependents() {
        let q = queue().await;
        let compile = q
            .enqueue("Compilation", 1, 1, None, 1, "{}", &[])
            .await
            .unwrap();
        let eval = q
            .enqueue(
                "Evaluation",
                1,
                1,
                Some("t1"),
                2,
                "{}",
                &[compile.clone()],
            )
            .await
            .unwrap();
        q.cancel_cascade(&compile).await.unwrap();

        let mut rows = q
            .conn
            .query("SELECT status FROM jobs WHERE id = ?1", params![eval])
            .await
            .unwrap();
        let status: String = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(status, "cancelled");
    }

    #[tokio::test]
    async fn dependent_payloads_returns_only_direct_dependents() {
        let q = queue().await;
        let compile = q
            .enqueue("Compilation", 1, 1, None, 1, "{}", &[])
            .await
            .unwrap();
        let eval = q
            .enqueue("Evaluation", 1, 1, Some("t1"), 2, "{\"codename\":\"t1\"}", &[compile.clone()])
            .await
            .unwrap();
        q.enqueue("Compilation", 2, 1, None, 1, "{}", &[]).await.unwrap();

        let dependents = q.dependent_payloads(&compile).await.unwrap();
        assert_eq!(dependents, vec![(eval, "{\"codename\":\"t1\"}".to_string())]);
    }

    #[tokio::test]
    async fn update_payload_overwrites_stored_json() {
        let q = queue().await;
        let id = q.enqueue("Compilation", 1, 1, None, 1, "{}", &[]).await.unwrap();
        q.update_payload(&id, "{\"patched\":true}").await.unwrap();

        let claimed = q
            .claim_next("shard-0", &["Compilation".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.payload_json, "{\"patched\":true}");
    }

    #[tokio::test]
    async fn cancel_submission_cancels_every_non_terminal_job() {
        let q = queue().await;
        let compile = q.enqueue("Compilation", 1, 1, None, 1, "{}", &[]).await.unwrap();
        let eval = q
            .enqueue("Evaluation", 1, 1, Some("t1"), 2, "{}", &[compile.clone()])
            .await
            .unwrap();
        let other = q.enqueue("Compilation", 2, 1, None, 1, "{}", &[]).await.unwrap();

        q.cancel_submission(1).await.unwrap();

        let mut rows = q
            .conn
            .query("SELECT id, status FROM jobs ORDER BY id", params![])
            .await
            .unwrap();
        let mut statuses = std::collections::HashMap::new();
        while let Some(row) = rows.next().await.unwrap() {
            statuses.insert(row.get::<String>(0).unwrap(), row.get::<String>(1).unwrap());
        }
        assert_eq!(statuses[&compile], "cancelled");
        assert_eq!(statuses[&eval], "cancelled");
        assert_eq!(statuses[&other], "queued");
    }

    #[tokio::test]
    async fn count_stuck_reflects_escalated_jobs() {
        let q = queue().await;
        let id = q.enqueue("Compilation", 1, 1, None, 1, "{}", &[]).await.unwrap();
        assert_eq!(q.count_stuck().await.unwrap(), 0);

        for _ in 0..3 {
            q.claim_next("shard-0", &["Compilation".to_string()]).await.unwrap();
            q.retry_or_escalate(&id).await.unwrap();
        }
        assert_eq!(q.count_stuck().await.unwrap(), 1);
    }
}
