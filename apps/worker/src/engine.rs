// [apps/worker/src/engine.rs]
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gradecore_cache::{CacheError, FileCache};
use gradecore_db::{DbClient, ResultRepository};
use gradecore_models::{Digest, Job, JobVariant, OperationKind, WorkerHeartbeat};
use gradecore_task_types::{dispatch, ProcessSandbox};
use gradecore_worker_client::{JobAssignment, WorkerClient};
use tracing::{error, info, instrument, warn};

use crate::errors::WorkerError;

/// Fallback wall-clock budget for a testcase that carries no explicit
/// time limit. The orchestrator is expected to always set one; this
/// only guards against a malformed payload hanging a worker forever.
const FALLBACK_TIME_LIMIT_SECONDS: f64 = 10.0;

/// Drives the acquire-execute-report loop for one worker shard.
/// Single job at a time by construction: a worker process never holds
/// more than one sandboxed run open concurrently (§4.5).
pub struct WorkerEngine {
    client: WorkerClient,
    cache: FileCache,
    db: DbClient,
    shard: u32,
    kinds: Vec<OperationKind>,
    poll_backoff: Duration,
    heartbeat_interval: Duration,
}

impl WorkerEngine {
    pub fn new(
        client: WorkerClient,
        cache: FileCache,
        db: DbClient,
        shard: u32,
        kinds: Vec<OperationKind>,
        poll_backoff: Duration,
        heartbeat_interval: Duration,
    ) -> Self {
        Self { client, cache, db, shard, kinds, poll_backoff, heartbeat_interval }
    }

    pub async fn run(&self, shutdown: Arc<AtomicBool>) {
        let mut last_heartbeat = tokio::time::Instant::now() - self.heartbeat_interval;

        while !shutdown.load(Ordering::Relaxed) {
            if last_heartbeat.elapsed() >= self.heartbeat_interval {
                self.heartbeat(None).await;
                last_heartbeat = tokio::time::Instant::now();
            }

            match self.client.acquire_job(self.shard, &self.kinds).await {
                Ok(Some(JobAssignment { job_id, job })) => {
                    self.heartbeat(Some(job_id.clone())).await;
                    let finished = self.execute(job).await;
                    if let Err(error) = self.client.report_job(&job_id, &finished).await {
                        error!(%error, job_id, "failed to report job outcome to orchestrator");
                    }
                    last_heartbeat = tokio::time::Instant::now();
                }
                Ok(None) => tokio::time::sleep(self.poll_backoff).await,
                Err(error) => {
                    warn!(%error, "could not reach orchestrator to acquire a job");
                    tokio::time::sleep(self.poll_backoff).await;
                }
            }
        }

        info!("shutdown signal received, worker loop exiting");
    }

    async fn heartbeat(&self, current_job_id: Option<String>) {
        let heartbeat = WorkerHeartbeat { shard: self.shard, current_job_id, timestamp: Utc::now() };
        if let Err(error) = self.client.heartbeat(&heartbeat).await {
            warn!(%error, "heartbeat failed");
        }
    }

    #[instrument(skip(self, job), fields(kind = ?job.operation.kind, object_id = job.operation.object_id))]
    async fn execute(&self, mut job: Job) -> Job {
        let workdir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(error) => {
                mark_infra_failure(&mut job, format!("failed to create workdir: {error}"));
                return job;
            }
        };

        let outcome = match &job.variant {
            JobVariant::Compilation(_) => self.run_compilation(&mut job, workdir.path()).await,
            JobVariant::Evaluation(_) => self.run_evaluation(&mut job, workdir.path()).await,
        };

        if let Err(error) = outcome {
            warn!(%error, "job execution failed");
            if let WorkerError::Cache(CacheError::Tombstone(_)) = &error {
                mark_tombstoned(&mut job, error.to_string());
            } else {
                mark_infra_failure(&mut job, error.to_string());
            }
        }

        job
    }

    async fn run_compilation(&self, job: &mut Job, workdir: &Path) -> Result<(), WorkerError> {
        let executor = dispatch(&job.task_type.name)?;
        let compilation = match &job.variant {
            JobVariant::Compilation(c) => c.clone(),
            JobVariant::Evaluation(_) => {
                return Err(WorkerError::MalformedJob(
                    "compilation dispatch on an evaluation job".into(),
                ))
            }
        };

        let mut sources = HashMap::new();
        for (name, digest) in &compilation.sources {
            let path = workdir.join(name);
            self.cache.get_to_path(digest, &path).await?;
            sources.insert(name.clone(), path);
        }

        let outcome = executor
            .compile(&sources, &job.task_type.parameters, &ProcessSandbox, workdir)
            .await?;

        let mut executables = HashMap::new();
        for (name, path) in &outcome.executables {
            let bytes = tokio::fs::read(path).await?;
            let digest = self.cache.put(&bytes, Some(&format!("executable:{name}"))).await?;
            executables.insert(name.clone(), digest);
        }

        job.success = outcome.success;
        if let JobVariant::Compilation(c) = &mut job.variant {
            c.compilation_text = outcome.text;
            c.executables = executables;
        }
        Ok(())
    }

    async fn run_evaluation(&self, job: &mut Job, workdir: &Path) -> Result<(), WorkerError> {
        let executor = dispatch(&job.task_type.name)?;
        let evaluation = match &job.variant {
            JobVariant::Evaluation(e) => e.clone(),
            JobVariant::Compilation(_) => {
                return Err(WorkerError::MalformedJob(
                    "evaluation dispatch on a compilation job".into(),
                ))
            }
        };

        let executable_digests = if evaluation.executables.is_empty() {
            self.fallback_executables(job.operation.object_id, job.operation.dataset_id).await?
        } else {
            evaluation.executables.clone()
        };

        let mut executables = HashMap::new();
        for (name, digest) in &executable_digests {
            let path = workdir.join(name);
            self.cache.get_to_path(digest, &path).await?;
            executables.insert(name.clone(), path);
        }

        let input_path = workdir.join("input.txt");
        self.cache.get_to_path(&evaluation.input, &input_path).await?;
        let expected_path = workdir.join("expected_output.txt");
        self.cache.get_to_path(&evaluation.expected_output, &expected_path).await?;

        let time_limit = Duration::from_secs_f64(
            evaluation.time_limit_seconds.unwrap_or(FALLBACK_TIME_LIMIT_SECONDS),
        );

        let outcome = executor
            .evaluate(
                &executables,
                &input_path,
                &expected_path,
                &job.task_type.parameters,
                &ProcessSandbox,
                time_limit,
            )
            .await?;

        job.success = true;
        if let JobVariant::Evaluation(e) = &mut job.variant {
            e.outcome = Some(outcome.outcome);
            e.evaluation_text = outcome.text;
            e.execution_time_seconds = Some(outcome.execution_time.as_secs_f64());
        }
        Ok(())
    }

    /// Falls back to the persisted SubmissionResult's executables map
    /// when a claimed evaluation job's own payload carries none — the
    /// same gap the original's `_get_compilation_job` covers for a
    /// worker that outlives the in-memory copy of a compile result
    /// (§4.5).
    async fn fallback_executables(
        &self,
        submission_id: i64,
        dataset_id: i64,
    ) -> Result<HashMap<String, Digest>, WorkerError> {
        let conn = self.db.connection()?;
        let result = ResultRepository::new(conn).get_or_create(submission_id, dataset_id).await?;
        Ok(result.executables)
    }
}

fn mark_infra_failure(job: &mut Job, text: String) {
    job.success = false;
    job.failure_text = Some(text);
    job.plus.insert("infra_error".to_string(), serde_json::Value::Bool(true));
}

fn mark_tombstoned(job: &mut Job, text: String) {
    job.success = false;
    job.failure_text = Some(text);
    job.plus.insert("tombstone".to_string(), serde_json::Value::Bool(true));
}
