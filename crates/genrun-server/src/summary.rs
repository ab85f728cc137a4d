//! JSON summaries returned by the MCP tools.

use std::path::Path;

use serde::Serialize;

use genrun_client::StatusQuery;
use genrun_core::{BatchResult, ImageReference, JobHandle, JobStatus, TaskResult};
use genrun_engine::VideoOutcome;

/// Outcome of one image task.
#[derive(Debug, Serialize)]
pub struct TaskSummary {
    /// Position in the batch; omitted for single generations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub status: &'static str,
    pub output_count: usize,
    pub outputs: Vec<String>,
    pub saved_paths: Vec<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskSummary {
    pub fn from_result(index: Option<usize>, result: &TaskResult) -> Self {
        match result {
            TaskResult::Success { outputs, saved_paths } => Self {
                index,
                status: "success",
                output_count: outputs.len(),
                outputs: outputs.iter().map(describe_image).collect(),
                saved_paths: saved_paths.iter().map(|p| p.as_deref().map(display_path)).collect(),
                failure_kind: None,
                message: None,
            },
            TaskResult::Failure { kind, message } => Self {
                index,
                status: "failure",
                output_count: 0,
                outputs: Vec::new(),
                saved_paths: Vec::new(),
                failure_kind: Some(kind.to_string()),
                message: Some(message.clone()),
            },
        }
    }
}

/// Outcome of a whole batch, tasks in input order.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub tasks: Vec<TaskSummary>,
}

impl From<&BatchResult> for BatchSummary {
    fn from(batch: &BatchResult) -> Self {
        Self {
            total: batch.len(),
            succeeded: batch.succeeded(),
            failed: batch.failed(),
            tasks: batch
                .results
                .iter()
                .enumerate()
                .map(|(i, r)| TaskSummary::from_result(Some(i), r))
                .collect(),
        }
    }
}

/// A finished video job.
#[derive(Debug, Serialize)]
pub struct VideoSummary {
    pub job_id: String,
    pub status: &'static str,
    pub result_url: String,
    pub status_checks: u32,
    pub saved_path: Option<String>,
}

impl From<&VideoOutcome> for VideoSummary {
    fn from(outcome: &VideoOutcome) -> Self {
        Self {
            job_id: outcome.job.to_string(),
            status: "succeeded",
            result_url: outcome.result_url.clone(),
            status_checks: outcome.attempts,
            saved_path: outcome.saved_path.as_deref().map(display_path),
        }
    }
}

/// One status query.
#[derive(Debug, Serialize)]
pub struct JobStatusSummary {
    pub job_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl JobStatusSummary {
    pub fn from_query(job: &JobHandle, query: &StatusQuery) -> Self {
        let mut summary = Self {
            job_id: job.to_string(),
            status: "not_found",
            progress: None,
            result_url: None,
            error: None,
            note: None,
        };

        match query {
            StatusQuery::NotFound => {
                summary.note =
                    Some("The job is not visible yet; it may have just been submitted.".to_string());
            }
            StatusQuery::Found(status) => {
                summary.status = status.label();
                match status {
                    JobStatus::Pending => {}
                    JobStatus::Running { progress } => summary.progress = *progress,
                    JobStatus::Succeeded { result_url } => summary.result_url = result_url.clone(),
                    JobStatus::Failed { reason } => summary.error = reason.clone(),
                }
            }
        }

        summary
    }
}

/// Render any summary as pretty JSON.
pub fn to_json<T: Serialize>(summary: &T) -> String {
    serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
}

/// Inline payloads are abbreviated to MIME type and size.
fn describe_image(image: &ImageReference) -> String {
    match image {
        ImageReference::Inline { mime_type, data } => {
            format!("inline {} image ({} bytes)", mime_type, data.len())
        }
        ImageReference::External { url } => url.clone(),
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
