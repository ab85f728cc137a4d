//! Remote job status.

use serde::{Deserialize, Serialize};

/// Status of a remote job as reported by its provider.
///
/// `Succeeded` and `Failed` are terminal. `Pending` and `Running` may repeat
/// or alternate any number of times before that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running {
        /// Progress percentage (0-100), when reported.
        progress: Option<u8>,
    },
    Succeeded {
        /// Where the result can be fetched. A success without one is unusable.
        result_url: Option<String>,
    },
    Failed {
        reason: Option<String>,
    },
}

impl JobStatus {
    /// Returns true if no further transition can follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Build a status from the raw fields of a provider response.
    ///
    /// The status string is matched case-insensitively against the known
    /// synonyms; anything unrecognised counts as still running.
    pub fn from_parts(
        status: &str,
        progress: Option<u8>,
        result_url: Option<String>,
        error: Option<String>,
    ) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "succeeded" | "success" | "completed" | "complete" | "done" | "finished" => {
                Self::Succeeded {
                    result_url: result_url.filter(|u| !u.trim().is_empty()),
                }
            }
            "failed" | "failure" | "error" | "cancelled" | "canceled" | "expired" => Self::Failed {
                reason: error.filter(|e| !e.trim().is_empty()),
            },
            "pending" | "queued" | "submitted" | "waiting" | "created" => Self::Pending,
            _ => Self::Running {
                progress: progress.map(|p| p.min(100)),
            },
        }
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running { .. } => "running",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}
