use libsql::Connection;
use tracing::{debug, instrument};

use crate::errors::DbError;

const TABLES: &[(&str, &str)] = &[
    (
        "submissions",
        r#"CREATE TABLE IF NOT EXISTS submissions (
            id INTEGER PRIMARY KEY,
            participation_id INTEGER NOT NULL,
            task_id INTEGER NOT NULL,
            timestamp TEXT NOT NULL,
            files_json TEXT NOT NULL,
            language TEXT,
            token INTEGER NOT NULL DEFAULT 0
        )"#,
    ),
    (
        "datasets",
        r#"CREATE TABLE IF NOT EXISTS datasets (
            id INTEGER PRIMARY KEY,
            task_id INTEGER NOT NULL,
            task_type_name TEXT NOT NULL,
            task_type_parameters_json TEXT NOT NULL,
            score_type_name TEXT NOT NULL,
            score_type_parameters_json TEXT NOT NULL,
            time_limit_seconds REAL,
            memory_limit_bytes INTEGER,
            managers_json TEXT NOT NULL DEFAULT '{}',
            active INTEGER NOT NULL DEFAULT 0,
            default_language TEXT
        )"#,
    ),
    (
        "testcases",
        r#"CREATE TABLE IF NOT EXISTS testcases (
            dataset_id INTEGER NOT NULL REFERENCES datasets(id),
            codename TEXT NOT NULL,
            input_digest TEXT NOT NULL,
            output_digest TEXT NOT NULL,
            public INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (dataset_id, codename)
        )"#,
    ),
    (
        "submission_results",
        r#"CREATE TABLE IF NOT EXISTS submission_results (
            submission_id INTEGER NOT NULL REFERENCES submissions(id),
            dataset_id INTEGER NOT NULL REFERENCES datasets(id),
            compilation_outcome TEXT,
            compilation_text TEXT,
            executables_json TEXT NOT NULL DEFAULT '{}',
            evaluation_tries INTEGER NOT NULL DEFAULT 0,
            compilation_tries INTEGER NOT NULL DEFAULT 0,
            score REAL,
            score_details_json TEXT,
            public_score REAL,
            public_score_details_json TEXT,
            ranking_score_details_json TEXT,
            scored INTEGER NOT NULL DEFAULT 0,
            partial INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (submission_id, dataset_id)
        )"#,
    ),
    (
        "evaluations",
        r#"CREATE TABLE IF NOT EXISTS evaluations (
            submission_id INTEGER NOT NULL,
            dataset_id INTEGER NOT NULL,
            codename TEXT NOT NULL,
            outcome REAL NOT NULL,
            text TEXT,
            execution_time_seconds REAL,
            memory_used_bytes INTEGER,
            produced_by TEXT,
            PRIMARY KEY (submission_id, dataset_id, codename),
            FOREIGN KEY (submission_id, dataset_id) REFERENCES submission_results(submission_id, dataset_id)
        )"#,
    ),
    (
        "jobs",
        r#"CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            object_id INTEGER NOT NULL,
            dataset_id INTEGER NOT NULL,
            testcase_codename TEXT,
            priority INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            payload_json TEXT NOT NULL,
            depends_on TEXT,
            lease_owner TEXT,
            lease_deadline TEXT,
            try_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    ),
    (
        "job_dependencies",
        r#"CREATE TABLE IF NOT EXISTS job_dependencies (
            job_id TEXT NOT NULL REFERENCES jobs(id),
            prerequisite_job_id TEXT NOT NULL REFERENCES jobs(id),
            PRIMARY KEY (job_id, prerequisite_job_id)
        )"#,
    ),
];

const INDEXES: &[(&str, &str)] = &[
    (
        "idx_jobs_dispatch",
        "CREATE INDEX IF NOT EXISTS idx_jobs_dispatch ON jobs(status, kind, priority)",
    ),
    (
        "idx_jobs_lease",
        "CREATE INDEX IF NOT EXISTS idx_jobs_lease ON jobs(status, lease_deadline)",
    ),
    (
        "idx_jobs_dedup",
        // Enforces the enqueue idempotency contract (§4.4): at most one
        // non-terminal job per (kind, object_id, dataset_id, codename).
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_dedup
         ON jobs(kind, object_id, dataset_id, COALESCE(testcase_codename, ''))
         WHERE status IN ('queued', 'active', 'blocked')",
    ),
];

#[instrument(skip_all)]
pub async fn apply_schema(conn: &Connection) -> Result<(), DbError> {
    for (name, sql) in TABLES {
        debug!(table = name, "applying table");
        conn.execute(sql, ()).await?;
    }
    for (name, sql) in INDEXES {
        debug!(index = name, "applying index");
        conn.execute(sql, ()).await?;
    }
    Ok(())
}
