use gradecore_db::{DatasetRepository, QueueRepository, ResultRepository, SubmissionRepository};
use gradecore_models::{
    CompilationOutcome, Dataset, Evaluation, Job, JobVariant, Operation, Submission, TaskTypeSpec,
};
use gradecore_score_types::Outcome;
use tracing::{info, instrument, warn};

use crate::errors::OrchestratorError;
use crate::state::AppState;

/// Fan-out a newly received submission into a compilation job and one
/// evaluation job per testcase, against every dataset that must judge
/// it (active plus any shadow datasets). Evaluation jobs start
/// `blocked` on the compilation job and only queue once it succeeds
/// (§4.4 "Dependency", grounded on
/// `_enqueue_operations_for_submission` in the original task service).
#[instrument(skip(state))]
pub async fn enqueue_operations_for_submission(
    state: &AppState,
    submission_id: i64,
) -> Result<(), OrchestratorError> {
    let conn = state.db.connection()?;
    let submission = SubmissionRepository::new(conn).get(submission_id).await?;

    let conn = state.db.connection()?;
    let dataset_ids = DatasetRepository::new(conn)
        .active_and_shadow_datasets(submission.task_id)
        .await?;

    for dataset_id in dataset_ids {
        enqueue_for_dataset(state, &submission, dataset_id).await?;
    }
    Ok(())
}

async fn enqueue_for_dataset(
    state: &AppState,
    submission: &Submission,
    dataset_id: i64,
) -> Result<(), OrchestratorError> {
    let conn = state.db.connection()?;
    let dataset = DatasetRepository::new(conn).get(dataset_id).await?;

    let conn = state.db.connection()?;
    ResultRepository::new(conn)
        .get_or_create(submission.id, dataset_id)
        .await?;

    let task_type = TaskTypeSpec {
        name: dataset.task_type_name.clone(),
        parameters: dataset.task_type_parameters.clone(),
    };

    let language = submission
        .resolved_language(dataset.default_language.as_deref())
        .map(str::to_string);

    let compile_operation = Operation::compilation(submission.id, dataset_id);
    let compile_job = Job::new_compilation(
        compile_operation.clone(),
        task_type.clone(),
        language.clone(),
        submission.files.clone(),
    );
    let compile_payload = serde_json::to_string(&compile_job)
        .map_err(|e| OrchestratorError::BadRequest(e.to_string()))?;

    let conn = state.db.connection()?;
    let compile_job_id = QueueRepository::new(conn)
        .enqueue(
            "Compilation",
            submission.id,
            dataset_id,
            None,
            compile_operation.priority_for_try(0).as_db_value(),
            &compile_payload,
            &[],
        )
        .await?;

    for testcase in &dataset.testcases {
        let eval_operation =
            Operation::evaluation(submission.id, dataset_id, testcase.codename.clone());
        let eval_job = Job::new_evaluation(
            eval_operation.clone(),
            task_type.clone(),
            language.clone(),
            std::collections::HashMap::new(),
            testcase.codename.clone(),
            testcase.input.clone(),
            testcase.output.clone(),
            dataset.time_limit_seconds,
            dataset.memory_limit_bytes,
        );
        let eval_payload = serde_json::to_string(&eval_job)
            .map_err(|e| OrchestratorError::BadRequest(e.to_string()))?;

        let conn = state.db.connection()?;
        QueueRepository::new(conn)
            .enqueue(
                "Evaluation",
                submission.id,
                dataset_id,
                Some(&testcase.codename),
                eval_operation.priority_for_try(0).as_db_value(),
                &eval_payload,
                std::slice::from_ref(&compile_job_id),
            )
            .await?;
    }

    info!(submission_id = submission.id, dataset_id, "submission fanned out to queue");
    Ok(())
}

/// Applies a worker's report for a finished job: persists the outcome,
/// advances the queue (complete / retry / escalate), and triggers
/// downstream fan-in (cancellation on compile failure, scoring once
/// every evaluation for a dataset is in) (§4.5 step 4, §4.8).
#[instrument(skip(state, job))]
pub async fn handle_job_report(
    state: &AppState,
    job_id: &str,
    job: Job,
) -> Result<(), OrchestratorError> {
    if !job.success && job.is_tombstoned() {
        if let JobVariant::Evaluation(evaluation) = &job.variant {
            let submission_id = job.operation.object_id;
            let dataset_id = job.operation.dataset_id;

            let record = Evaluation {
                codename: evaluation.codename.clone(),
                outcome: 0.0,
                text: Some(
                    job.failure_text
                        .clone()
                        .unwrap_or_else(|| "testcase input digest tombstoned".to_string()),
                ),
                execution_time_seconds: None,
                memory_used_bytes: None,
                produced_by: None,
            };

            let conn = state.db.connection()?;
            ResultRepository::new(conn)
                .upsert_evaluation(submission_id, dataset_id, &record)
                .await?;

            let conn = state.db.connection()?;
            ResultRepository::new(conn).mark_partial(submission_id, dataset_id).await?;

            let conn = state.db.connection()?;
            QueueRepository::new(conn).complete(job_id).await?;

            warn!(
                job_id,
                codename = %evaluation.codename,
                "testcase input tombstoned, recorded as zero and flagged partial"
            );
            maybe_score_submission(state, submission_id, dataset_id).await?;
            return Ok(());
        }

        // A tombstoned source digest can never compile; treat it the
        // same terminal way as a deterministic compile failure rather
        // than retrying forever.
        let submission_id = job.operation.object_id;
        let dataset_id = job.operation.dataset_id;

        let conn = state.db.connection()?;
        let result = ResultRepository::new(conn)
            .get_or_create(submission_id, dataset_id)
            .await?;

        let conn = state.db.connection()?;
        ResultRepository::new(conn)
            .record_compilation(
                submission_id,
                dataset_id,
                CompilationOutcome::Failed,
                job.failure_text.as_deref(),
                &std::collections::HashMap::new(),
                result.compilation_tries,
            )
            .await?;

        let conn = state.db.connection()?;
        QueueRepository::new(conn).complete(job_id).await?;
        let conn = state.db.connection()?;
        QueueRepository::new(conn).cancel_cascade(job_id).await?;

        warn!(job_id, "compilation source digest tombstoned, treated as compile failure");
        finalize_failed_compilation(state, submission_id, dataset_id).await?;
        return Ok(());
    }

    if !job.success && job.is_infra_failure() {
        let conn = state.db.connection()?;
        let requeued = QueueRepository::new(conn).retry_or_escalate(job_id).await?;
        warn!(job_id, requeued, "infrastructure failure reported, job requeued or escalated");
        return Ok(());
    }

    match &job.variant {
        JobVariant::Compilation(compilation) => {
            let submission_id = job.operation.object_id;
            let dataset_id = job.operation.dataset_id;
            let outcome = if job.success {
                CompilationOutcome::Ok
            } else {
                CompilationOutcome::Failed
            };

            let conn = state.db.connection()?;
            let result = ResultRepository::new(conn)
                .get_or_create(submission_id, dataset_id)
                .await?;

            let conn = state.db.connection()?;
            ResultRepository::new(conn)
                .record_compilation(
                    submission_id,
                    dataset_id,
                    outcome,
                    compilation.compilation_text.as_deref(),
                    &compilation.executables,
                    result.compilation_tries,
                )
                .await?;

            if matches!(outcome, CompilationOutcome::Ok) {
                let conn = state.db.connection()?;
                splice_executables_into_dependents(conn, job_id, &compilation.executables).await?;
            }

            let conn = state.db.connection()?;
            QueueRepository::new(conn).complete(job_id).await?;

            if matches!(outcome, CompilationOutcome::Failed) {
                let conn = state.db.connection()?;
                QueueRepository::new(conn).cancel_cascade(job_id).await?;
                finalize_failed_compilation(state, submission_id, dataset_id).await?;
            } else {
                let conn = state.db.connection()?;
                let dataset = DatasetRepository::new(conn).get(dataset_id).await?;
                if dataset.testcases.is_empty() {
                    maybe_score_submission(state, submission_id, dataset_id).await?;
                }
            }
        }
        JobVariant::Evaluation(evaluation) => {
            let submission_id = job.operation.object_id;
            let dataset_id = job.operation.dataset_id;

            let record = Evaluation {
                codename: evaluation.codename.clone(),
                outcome: evaluation.outcome.unwrap_or(0.0),
                text: evaluation.evaluation_text.clone(),
                execution_time_seconds: evaluation.execution_time_seconds,
                memory_used_bytes: evaluation.memory_used_bytes,
                produced_by: None,
            };

            let conn = state.db.connection()?;
            ResultRepository::new(conn)
                .upsert_evaluation(submission_id, dataset_id, &record)
                .await?;

            let conn = state.db.connection()?;
            QueueRepository::new(conn).complete(job_id).await?;

            maybe_score_submission(state, submission_id, dataset_id).await?;
        }
    }

    Ok(())
}

/// Scores a submission against a dataset once every testcase has an
/// evaluation on record. Re-entrant: a partial scoring pass (fewer
/// evaluations than testcases, e.g. after a re-evaluation that only
/// reran a subset) is allowed and flagged via `partial` (§4.7, §4.9
/// `SubmissionResult.partial`).
#[instrument(skip(state))]
async fn maybe_score_submission(
    state: &AppState,
    submission_id: i64,
    dataset_id: i64,
) -> Result<(), OrchestratorError> {
    let conn = state.db.connection()?;
    let dataset = DatasetRepository::new(conn).get(dataset_id).await?;

    let conn = state.db.connection()?;
    let result = ResultRepository::new(conn)
        .get_or_create(submission_id, dataset_id)
        .await?;

    if !result.missing_testcases(dataset.codenames()).is_empty() {
        return Ok(());
    }

    score_submission(state, submission_id, &dataset).await
}

async fn score_submission(
    state: &AppState,
    submission_id: i64,
    dataset: &Dataset,
) -> Result<(), OrchestratorError> {
    let conn = state.db.connection()?;
    let result = ResultRepository::new(conn)
        .get_or_create(submission_id, dataset.id)
        .await?;

    let outcomes: Vec<Outcome> = dataset
        .testcases
        .iter()
        .map(|testcase| {
            let evaluation = result.evaluation(&testcase.codename);
            Outcome {
                codename: testcase.codename.clone(),
                value: evaluation.map(|e| e.outcome).unwrap_or(0.0),
                public: testcase.public,
            }
        })
        .collect();

    let reducer = gradecore_score_types::dispatch(&dataset.score_type_name)?;
    let reduced = reducer.reduce(&outcomes, &dataset.score_type_parameters)?;

    let conn = state.db.connection()?;
    ResultRepository::new(conn)
        .persist_score(
            submission_id,
            dataset.id,
            reduced.score,
            &reduced.score_details,
            reduced.public_score,
            &reduced.public_score_details,
            &reduced.ranking_score_details,
            result.partial,
        )
        .await?;

    info!(submission_id, dataset_id = dataset.id, score = reduced.score, "submission scored");
    Ok(())
}

/// Target of an admin reevaluate/invalidate call (§6 "Admin controls").
/// Resolves to every affected (submission, dataset) pair before acting,
/// so a task-wide reevaluate touches exactly the datasets each of its
/// submissions was judged against.
#[derive(Debug)]
pub enum AdminScope {
    Submission(i64),
    Dataset(i64),
    Task(i64),
}

/// How far back `invalidate` drops results before re-enqueuing or
/// rescoring (§6 `invalidate(target, level)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidateLevel {
    Compile,
    Evaluate,
    Score,
}

fn resolve_scope<'a>(
    state: &'a AppState,
    scope: &'a AdminScope,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<(i64, i64)>, OrchestratorError>> + Send + 'a>> {
    Box::pin(async move {
    match scope {
        AdminScope::Submission(submission_id) => {
            let conn = state.db.connection()?;
            let submission = SubmissionRepository::new(conn).get(*submission_id).await?;
            let conn = state.db.connection()?;
            let dataset_ids = DatasetRepository::new(conn)
                .active_and_shadow_datasets(submission.task_id)
                .await?;
            Ok(dataset_ids.into_iter().map(|d| (*submission_id, d)).collect())
        }
        AdminScope::Dataset(dataset_id) => {
            let conn = state.db.connection()?;
            let submission_ids = ResultRepository::new(conn).submissions_for_dataset(*dataset_id).await?;
            Ok(submission_ids.into_iter().map(|s| (s, *dataset_id)).collect())
        }
        AdminScope::Task(task_id) => {
            let conn = state.db.connection()?;
            let submission_ids = SubmissionRepository::new(conn).ids_for_task(*task_id).await?;
            let mut pairs = Vec::new();
            for submission_id in submission_ids {
                pairs.extend(resolve_scope(state, &AdminScope::Submission(submission_id)).await?);
            }
            Ok(pairs)
        }
    }
    })
}

/// `reevaluate(submission_id | dataset_id | task_id)`: drops everything
/// and re-enqueues from NEW, bumping try counters implicitly via fresh
/// job rows (§6).
#[instrument(skip(state))]
pub async fn reevaluate(state: &AppState, scope: AdminScope) -> Result<(), OrchestratorError> {
    for (submission_id, dataset_id) in resolve_scope(state, &scope).await? {
        let conn = state.db.connection()?;
        ResultRepository::new(conn)
            .reset_compilation_and_below(submission_id, dataset_id)
            .await?;

        let conn = state.db.connection()?;
        let submission = SubmissionRepository::new(conn).get(submission_id).await?;
        enqueue_for_dataset(state, &submission, dataset_id).await?;
    }
    Ok(())
}

/// `rescore(dataset_id)`: re-runs the reducer over stored Evaluations
/// without touching the queue (§6).
#[instrument(skip(state))]
pub async fn rescore(state: &AppState, dataset_id: i64) -> Result<(), OrchestratorError> {
    for submission_id in {
        let conn = state.db.connection()?;
        ResultRepository::new(conn).submissions_for_dataset(dataset_id).await?
    } {
        let conn = state.db.connection()?;
        ResultRepository::new(conn).clear_score(submission_id, dataset_id).await?;
        maybe_score_submission(state, submission_id, dataset_id).await?;
    }
    Ok(())
}

/// `invalidate(target, level)`: drops results at and above `level` and
/// re-enqueues only what that level requires re-running (§6).
#[instrument(skip(state))]
pub async fn invalidate(
    state: &AppState,
    scope: AdminScope,
    level: InvalidateLevel,
) -> Result<(), OrchestratorError> {
    for (submission_id, dataset_id) in resolve_scope(state, &scope).await? {
        match level {
            InvalidateLevel::Compile => {
                let conn = state.db.connection()?;
                ResultRepository::new(conn)
                    .reset_compilation_and_below(submission_id, dataset_id)
                    .await?;
                let conn = state.db.connection()?;
                let submission = SubmissionRepository::new(conn).get(submission_id).await?;
                enqueue_for_dataset(state, &submission, dataset_id).await?;
            }
            InvalidateLevel::Evaluate => {
                let conn = state.db.connection()?;
                ResultRepository::new(conn)
                    .clear_evaluations_and_score(submission_id, dataset_id)
                    .await?;
                reenqueue_evaluations(state, submission_id, dataset_id).await?;
            }
            InvalidateLevel::Score => {
                let conn = state.db.connection()?;
                ResultRepository::new(conn).clear_score(submission_id, dataset_id).await?;
                maybe_score_submission(state, submission_id, dataset_id).await?;
            }
        }
    }
    Ok(())
}

/// Re-enqueues evaluation jobs reusing the executables already on
/// record, with no dependency on a fresh compile (§6 `invalidate(level
/// = evaluate)`).
async fn reenqueue_evaluations(
    state: &AppState,
    submission_id: i64,
    dataset_id: i64,
) -> Result<(), OrchestratorError> {
    let conn = state.db.connection()?;
    let dataset = DatasetRepository::new(conn).get(dataset_id).await?;

    let conn = state.db.connection()?;
    let submission = SubmissionRepository::new(conn).get(submission_id).await?;

    let conn = state.db.connection()?;
    let result = ResultRepository::new(conn).get_or_create(submission_id, dataset_id).await?;

    let task_type = TaskTypeSpec {
        name: dataset.task_type_name.clone(),
        parameters: dataset.task_type_parameters.clone(),
    };
    let language = submission
        .resolved_language(dataset.default_language.as_deref())
        .map(str::to_string);

    for testcase in &dataset.testcases {
        let eval_operation =
            Operation::evaluation(submission_id, dataset_id, testcase.codename.clone());
        let eval_job = Job::new_evaluation(
            eval_operation.clone(),
            task_type.clone(),
            language.clone(),
            result.executables.clone(),
            testcase.codename.clone(),
            testcase.input.clone(),
            testcase.output.clone(),
            dataset.time_limit_seconds,
            dataset.memory_limit_bytes,
        );
        let eval_payload = serde_json::to_string(&eval_job)
            .map_err(|e| OrchestratorError::BadRequest(e.to_string()))?;

        let conn = state.db.connection()?;
        QueueRepository::new(conn)
            .enqueue(
                "Evaluation",
                submission_id,
                dataset_id,
                Some(&testcase.codename),
                eval_operation.priority_for_try(0).as_db_value(),
                &eval_payload,
                &[],
            )
            .await?;
    }
    Ok(())
}

/// `cancel(submission_id)`: marks every pending job for the submission
/// cancelled (§6).
#[instrument(skip(state))]
pub async fn cancel(state: &AppState, submission_id: i64) -> Result<(), OrchestratorError> {
    let conn = state.db.connection()?;
    QueueRepository::new(conn).cancel_submission(submission_id).await?;
    Ok(())
}

/// Copies freshly compiled executables onto every evaluation job
/// blocked on this compilation, before it unblocks them (§4.5 step 2,
/// grounded on `mark_compilation_success` in the original task
/// service, which does the same copy onto the SubmissionResult).
async fn splice_executables_into_dependents(
    conn: libsql::Connection,
    compile_job_id: &str,
    executables: &std::collections::HashMap<String, gradecore_models::Digest>,
) -> Result<(), OrchestratorError> {
    let queue = QueueRepository::new(conn);
    for (dependent_id, payload_json) in queue.dependent_payloads(compile_job_id).await? {
        let mut dependent: Job = serde_json::from_str(&payload_json)
            .map_err(|e| OrchestratorError::BadRequest(e.to_string()))?;
        if let JobVariant::Evaluation(evaluation) = &mut dependent.variant {
            evaluation.executables = executables.clone();
        }
        let updated_payload = serde_json::to_string(&dependent)
            .map_err(|e| OrchestratorError::BadRequest(e.to_string()))?;
        queue.update_payload(&dependent_id, &updated_payload).await?;
    }
    Ok(())
}

/// A failed compilation scores zero without waiting on cancelled
/// evaluation jobs (mirrors CMS `ScoreTypeGroup`'s treatment of an
/// uncompiled submission: no outcomes, no credit).
async fn finalize_failed_compilation(
    state: &AppState,
    submission_id: i64,
    dataset_id: i64,
) -> Result<(), OrchestratorError> {
    let conn = state.db.connection()?;
    ResultRepository::new(conn)
        .persist_score(
            submission_id,
            dataset_id,
            0.0,
            &serde_json::Value::Null,
            0.0,
            &serde_json::Value::Null,
            &serde_json::Value::Null,
            false,
        )
        .await?;
    Ok(())
}
