use std::time::Duration;

use gradecore_models::{Job, WorkerCapability, WorkerHeartbeat};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::errors::ClientError;

/// One job handed to a worker, carrying the queue-assigned id the
/// worker must echo back on report (§4.5, §6 worker protocol).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAssignment {
    pub job_id: String,
    pub job: Job,
}

#[derive(Debug, Serialize)]
struct AcquireRequest<'a> {
    shard: u32,
    kinds: &'a [gradecore_models::OperationKind],
}

#[derive(Debug, Serialize)]
struct ReportRequest {
    job_id: String,
    job: Job,
}

pub struct WorkerClient {
    http: Client,
    base_url: String,
}

impl WorkerClient {
    pub fn new(base_url: impl Into<String>, worker_token: &str) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {worker_token}"))
            .expect("worker token must be a valid header value");
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("worker HTTP client must build");

        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// Registers this worker's shard and supported operation kinds with
    /// the orchestrator (§6 worker capability protocol). Called once at
    /// startup; a capability change requires a restart, not a re-call.
    #[instrument(skip(self))]
    pub async fn register(&self, capability: &WorkerCapability) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/workers/register", self.base_url);
        let response = self.http.post(&url).json(capability).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    #[instrument(skip(self))]
    pub async fn heartbeat(&self, heartbeat: &WorkerHeartbeat) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/workers/heartbeat", self.base_url);
        let response = self.http.post(&url).json(heartbeat).send().await?;
        Self::check_status(response).await.map(|_| ())
    }

    /// Reserves one job from the highest-priority eligible cell for this
    /// worker's shard and kinds (§4.5 step 1). `Ok(None)` when the queue
    /// has nothing matching right now.
    #[instrument(skip(self))]
    pub async fn acquire_job(
        &self,
        shard: u32,
        kinds: &[gradecore_models::OperationKind],
    ) -> Result<Option<JobAssignment>, ClientError> {
        let url = format!("{}/api/v1/workers/jobs/acquire", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&AcquireRequest { shard, kinds })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<JobAssignment>().await?)),
            StatusCode::NO_CONTENT => Ok(None),
            status => Err(ClientError::ServerRejection(status.to_string())),
        }
    }

    /// Reports a finished job back to the orchestrator (§4.5 step 4).
    /// The worker sends back the same `job_id` and the Job with
    /// `success`, `failure_text`, and `plus` populated by the executor.
    #[instrument(skip(self, job))]
    pub async fn report_job(&self, job_id: &str, job: &Job) -> Result<(), ClientError> {
        let url = format!("{}/api/v1/workers/jobs/report", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&ReportRequest { job_id: job_id.to_string(), job: job.clone() })
            .send()
            .await?;
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::Unauthorized),
            status if status.is_success() => Ok(response),
            status => Err(ClientError::ServerRejection(status.to_string())),
        }
    }
}
