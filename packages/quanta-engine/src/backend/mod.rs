//! Access to the compute backend.
//!
//! [`HttpBackend`] talks to the real service. [`SimulatedBackend`] stands in for
//! it when it cannot be reached. [`FallbackBackend`] chains the two so that only
//! network-level failures switch to demo data; application errors always surface.

pub mod fallback;
pub mod http;
pub mod simulated;
pub mod store;

use crate::domain::{CalculationOptions, Job, MoleculeData};
use async_trait::async_trait;
use thiserror::Error;

pub use fallback::FallbackBackend;
pub use http::HttpBackend;
pub use simulated::SimulatedBackend;
pub use store::{InMemoryJobStore, JobStore};

/// Failure talking to a backend, real or simulated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The backend could not be reached at all.
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered but refused the request. `message` is shown to the
    /// user verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{}", not_found_message(.local))]
    NotFound { job_id: String, local: bool },

    /// A success response whose body could not be read as a job.
    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),
}

fn not_found_message(local: &bool) -> &'static str {
    if *local {
        "Job not found in local demo store"
    } else {
        "Job not found"
    }
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    pub fn not_found(job_id: impl Into<String>) -> Self {
        ClientError::NotFound {
            job_id: job_id.into(),
            local: false,
        }
    }
}

/// Only failures to reach the backend count as network errors. Body,
/// redirect, builder and decode failures mean the exchange itself went wrong
/// and must not trigger the demo fallback.
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if !err.is_decode() && (err.is_connect() || err.is_timeout() || err.is_request()) {
            ClientError::Network(err.to_string())
        } else {
            ClientError::InvalidResponse(err.to_string())
        }
    }
}

#[async_trait]
pub trait SimulationBackend: Send + Sync {
    /// Submits a job and returns it as accepted by the backend.
    async fn submit(
        &self,
        molecule: &MoleculeData,
        options: &CalculationOptions,
    ) -> Result<Job, ClientError>;

    /// Fetches the current state of a job.
    async fn poll(&self, job_id: &str) -> Result<Job, ClientError>;
}
