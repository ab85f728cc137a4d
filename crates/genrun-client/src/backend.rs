//! Traits describing the remote boundaries.
//!
//! The engine only depends on these traits; the reqwest-backed clients in this
//! crate are the production implementations.

use async_trait::async_trait;

use genrun_core::{JobHandle, JobStatus};

use crate::error::ClientError;
use crate::generation::GenerationRequest;
use crate::jobs::JobSubmission;

/// A synchronous generation endpoint.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send one generation request and return the response text.
    ///
    /// A provider-reported error in an otherwise successful response is
    /// returned as [`ClientError::Provider`].
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ClientError>;
}

/// Result of a single status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusQuery {
    /// The provider knows the job and reported its status.
    Found(JobStatus),
    /// The provider does not (yet) know the job.
    NotFound,
}

/// A job-based generation endpoint.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit a job and return its handle.
    async fn submit(&self, submission: &JobSubmission) -> Result<JobHandle, ClientError>;

    /// Query the status of a job once.
    async fn status(&self, handle: &JobHandle) -> Result<StatusQuery, ClientError>;
}

/// Bytes downloaded from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    /// Declared `Content-Type`, without parameters.
    pub content_type: Option<String>,
}

/// Plain HTTP GET of arbitrary payloads.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, ClientError>;
}
