//! Errors raised while running a generation task.

use std::path::PathBuf;

use thiserror::Error;

use genrun_client::ClientError;
use genrun_core::{CoreError, FailureKind, TaskResult};

/// Failure of a single generation task or job.
///
/// Every variant maps onto a [`FailureKind`]; the runner converts these into
/// `TaskResult::Failure` instead of propagating them.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    InvalidParams(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("no image data found in the response")]
    NoImageData,

    #[error("job {0} succeeded without a result URL")]
    MissingResult(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    /// A reference image could not be normalized.
    #[error("reference image '{locator}': {source}")]
    Reference {
        locator: String,
        #[source]
        source: Box<GenerationError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unknown(String),
}

impl GenerationError {
    /// Classify the error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidParams(_) => FailureKind::InvalidParams,
            Self::FileNotFound(_) => FailureKind::FileNotFound,
            Self::Transport(_) => FailureKind::TransportError,
            Self::Provider(_) => FailureKind::ProviderError,
            Self::NoImageData => FailureKind::NoImageData,
            Self::MissingResult(_) => FailureKind::MissingResult,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Reference { source, .. } => source.kind(),
            Self::Io(_) | Self::Unknown(_) => FailureKind::Unknown,
        }
    }

    /// Attach the offending reference locator.
    pub fn for_reference(self, locator: &str) -> Self {
        Self::Reference {
            locator: locator.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<CoreError> for GenerationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParams(message) => Self::InvalidParams(message),
            other => Self::InvalidParams(other.to_string()),
        }
    }
}

impl From<ClientError> for GenerationError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Provider(message) => Self::Provider(message),
            ClientError::Decode(message) => Self::Provider(format!("unexpected response: {}", message)),
            ClientError::Http(e) if e.is_timeout() => Self::Transport(format!("request timed out: {}", e)),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<GenerationError> for TaskResult {
    fn from(err: GenerationError) -> Self {
        TaskResult::failure(err.kind(), err.to_string())
    }
}
