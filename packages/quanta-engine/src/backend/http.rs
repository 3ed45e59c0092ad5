use super::{ClientError, SimulationBackend};
use crate::domain::{CalculationOptions, Job, MoleculeData, SubmissionRequest};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Validation failures carry a structured `detail`; those are shown as JSON text.
    fn message(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

/// Client for the compute service REST API.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Direct link to the report artifact the backend renders for a job.
    pub fn report_download_url(&self, job_id: &str) -> String {
        format!("{}/download/{}", self.base_url, job_id)
    }

    /// Fetches the backend-rendered report for `job_id` and writes it to `dest`.
    /// Returns the number of bytes written.
    pub async fn download_report(&self, job_id: &str, dest: &Path) -> Result<u64, ClientError> {
        let url = self.report_download_url(job_id);
        debug!("Downloading report from {}", url);
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::not_found(job_id));
        }
        if !response.status().is_success() {
            return Err(rejection(response, "Failed to download report").await);
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("Failed to write report: {}", e)))?;
        Ok(bytes.len() as u64)
    }
}

/// Turns a non-success response into a rejection, preferring the backend's
/// `detail` message over the generic status text.
async fn rejection(response: Response, fallback_prefix: &str) -> ClientError {
    let status = response.status();
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::message);
    let message = detail.unwrap_or_else(|| {
        format!(
            "{}: {}",
            fallback_prefix,
            status.canonical_reason().unwrap_or("Unknown Status")
        )
    });
    error!("Backend rejected request: {} - {}", status, message);
    ClientError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl SimulationBackend for HttpBackend {
    async fn submit(
        &self,
        molecule: &MoleculeData,
        options: &CalculationOptions,
    ) -> Result<Job, ClientError> {
        let url = format!("{}/run_simulation", self.base_url);
        debug!("Submitting {} to {}", molecule.name, url);

        let response = self
            .client
            .post(&url)
            .json(&SubmissionRequest { molecule, options })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response, "Server Error").await);
        }

        Ok(response.json::<Job>().await?)
    }

    async fn poll(&self, job_id: &str) -> Result<Job, ClientError> {
        let url = format!("{}/results/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::not_found(job_id));
        }
        if !response.status().is_success() {
            return Err(rejection(response, "Failed to fetch status").await);
        }

        Ok(response.json::<Job>().await?)
    }
}
