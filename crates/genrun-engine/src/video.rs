//! Job-based video generation.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use genrun_client::{JobSubmission, StatusQuery};
use genrun_core::{JobHandle, VideoRequest};

use crate::error::GenerationError;
use crate::persist::OutputWriter;
use crate::poller::{attempt_budget, JobPoller};

/// Base wait for any video job.
pub const BASE_WAIT_MINUTES: u64 = 10;

/// Extra wait for high-definition jobs.
pub const HD_EXTRA_MINUTES: u64 = 10;

/// Extra wait for jobs longer than [`LONG_VIDEO_SECS`].
pub const LONG_EXTRA_MINUTES: u64 = 5;

pub const LONG_VIDEO_SECS: u32 = 10;

/// How long to wait for a job with these parameters.
pub fn deadline_minutes(request: &VideoRequest) -> u64 {
    let mut minutes = BASE_WAIT_MINUTES;
    if request.hd {
        minutes += HD_EXTRA_MINUTES;
    }
    if request.duration_secs > LONG_VIDEO_SECS {
        minutes += LONG_EXTRA_MINUTES;
    }
    minutes
}

/// A finished video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutcome {
    pub job: JobHandle,
    pub result_url: String,
    pub attempts: u32,
    /// Local copy, when one was requested and the download worked.
    pub saved_path: Option<PathBuf>,
}

/// Submits video jobs, waits for them and optionally downloads the result.
#[derive(Clone)]
pub struct VideoGenerator {
    poller: JobPoller,
    writer: OutputWriter,
    default_model: String,
}

impl VideoGenerator {
    pub fn new(poller: JobPoller, writer: OutputWriter, default_model: impl Into<String>) -> Self {
        Self {
            poller,
            writer,
            default_model: default_model.into(),
        }
    }

    /// Run one video job to completion.
    pub async fn generate(
        &self,
        request: &VideoRequest,
        cancel: &CancellationToken,
    ) -> Result<VideoOutcome, GenerationError> {
        request.validate()?;

        let submission = JobSubmission::from_request(request, &self.default_model);
        let minutes = deadline_minutes(request);
        let max_attempts = attempt_budget(minutes, self.poller.interval());

        info!(
            model = %submission.model,
            hd = request.hd,
            duration = request.duration_secs,
            max_wait_minutes = minutes,
            max_attempts,
            "Starting video job"
        );

        let done = self.poller.run(&submission, max_attempts, cancel).await?;

        let saved_path = match self.writer.resolve_dir(request.output_dir.as_deref()) {
            Some(dir) => match self.writer.download(&done.result_url, &dir, "video", "mp4").await {
                Ok(path) => {
                    info!(job_id = %done.handle, path = %path.display(), "Video saved");
                    Some(path)
                }
                Err(e) => {
                    warn!(job_id = %done.handle, error = %e, "Failed to download video");
                    None
                }
            },
            None => None,
        };

        Ok(VideoOutcome {
            job: done.handle,
            result_url: done.result_url,
            attempts: done.attempts,
            saved_path,
        })
    }

    /// Query a job's status once.
    pub async fn status(&self, job: &JobHandle) -> Result<StatusQuery, GenerationError> {
        Ok(self.poller.status(job).await?)
    }
}
