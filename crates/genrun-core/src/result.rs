//! Task results and batch types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::CoreError;
use crate::image::ImageReference;
use crate::spec::TaskSpec;

/// Largest number of tasks accepted in one batch.
pub const MAX_BATCH_TASKS: usize = 20;
/// Lowest accepted batch concurrency.
pub const MIN_CONCURRENCY: usize = 1;
/// Highest accepted batch concurrency.
pub const MAX_CONCURRENCY: usize = 10;
/// Concurrency used when the caller gives none.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Classification of an expected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Caller input outside the allowed range, detected before any I/O.
    InvalidParams,
    /// A local reference image does not exist.
    FileNotFound,
    /// A remote endpoint could not be reached or answered with an HTTP error.
    TransportError,
    /// A remote endpoint answered but reported a domain-level failure.
    ProviderError,
    /// The call succeeded but no image could be extracted.
    NoImageData,
    /// A job succeeded but carried no result locator.
    MissingResult,
    /// A deadline passed before a terminal state was observed.
    Timeout,
    /// The operation was cancelled before it finished.
    Cancelled,
    /// Anything else.
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidParams => "InvalidParams",
            Self::FileNotFound => "FileNotFound",
            Self::TransportError => "TransportError",
            Self::ProviderError => "ProviderError",
            Self::NoImageData => "NoImageData",
            Self::MissingResult => "MissingResult",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Outcome of one task. Corresponds 1:1 to the TaskSpec that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    Success {
        /// Every extracted image, in extraction order.
        outputs: Vec<ImageReference>,
        /// Saved path per output; `None` when not persisted or the save failed.
        saved_paths: Vec<Option<PathBuf>>,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl TaskResult {
    /// Build a failure result.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure kind, if this is a failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            Self::Success { .. } => None,
        }
    }
}

/// An ordered set of tasks with a shared concurrency limit.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    /// Tasks, in submission order.
    pub tasks: Vec<TaskSpec>,
    /// Maximum number of tasks in flight at once.
    pub concurrency: usize,
}

impl BatchRequest {
    /// Create a batch with the default concurrency.
    pub fn new(tasks: Vec<TaskSpec>) -> Self {
        Self {
            tasks,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Builder method to set the concurrency limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Check task count and concurrency bounds.
    ///
    /// A concurrency above the task count is accepted.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tasks.is_empty() || self.tasks.len() > MAX_BATCH_TASKS {
            return Err(CoreError::InvalidParams(format!(
                "batch must contain between 1 and {} tasks, got {}",
                MAX_BATCH_TASKS,
                self.tasks.len()
            )));
        }

        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(CoreError::InvalidParams(format!(
                "concurrency must be between {} and {}, got {}",
                MIN_CONCURRENCY, MAX_CONCURRENCY, self.concurrency
            )));
        }

        Ok(())
    }
}

/// Results of a batch, index-aligned with the request's task order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub results: Vec<TaskResult>,
}

impl BatchResult {
    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if there are no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of successful tasks.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of failed tasks.
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(n: usize) -> Vec<TaskSpec> {
        (0..n).map(|i| TaskSpec::new(format!("prompt {}", i))).collect()
    }

    #[test]
    fn test_batch_bounds() {
        assert!(BatchRequest::new(tasks(1)).validate().is_ok());
        assert!(BatchRequest::new(tasks(20)).validate().is_ok());
        assert!(BatchRequest::new(tasks(0)).validate().is_err());
        assert!(BatchRequest::new(tasks(21)).validate().is_err());
    }

    #[test]
    fn test_concurrency_bounds() {
        assert!(BatchRequest::new(tasks(2)).with_concurrency(0).validate().is_err());
        assert!(BatchRequest::new(tasks(2)).with_concurrency(11).validate().is_err());
        // Concurrency above the task count is fine.
        assert!(BatchRequest::new(tasks(2)).with_concurrency(10).validate().is_ok());
    }

    #[test]
    fn test_batch_result_counts() {
        let result = BatchResult {
            results: vec![
                TaskResult::Success {
                    outputs: vec![ImageReference::external("https://x/a.png")],
                    saved_paths: vec![None],
                },
                TaskResult::failure(FailureKind::NoImageData, "nothing"),
            ],
        };
        assert_eq!(result.len(), 2);
        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.results[1].failure_kind(), Some(FailureKind::NoImageData));
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::NoImageData.to_string(), "NoImageData");
        assert_eq!(FailureKind::TransportError.to_string(), "TransportError");
    }
}
