//! Async job poller.
//!
//! A job moves `Submitted -> {Pending, Running}* -> {Succeeded, Failed}`, or
//! times out when the attempt budget runs dry first. Each attempt waits one
//! interval and then issues exactly one status query. Cancellation is
//! observed during the wait only; a query in flight always completes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use genrun_client::{ClientError, JobBackend, JobSubmission, StatusQuery};
use genrun_core::{JobHandle, JobStatus};

use crate::error::GenerationError;

/// Reason reported when a provider fails a job without saying why.
pub const UNKNOWN_FAILURE: &str = "Unknown error";

/// Source of the inter-poll wait.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Number of status queries that fit in `max_wait_minutes` at `interval`.
///
/// Never less than one.
pub fn attempt_budget(max_wait_minutes: u64, interval: Duration) -> u32 {
    let interval_secs = interval.as_secs().max(1);
    let attempts = max_wait_minutes.saturating_mul(60) / interval_secs;
    u32::try_from(attempts).unwrap_or(u32::MAX).max(1)
}

/// Terminal failure of a submitted or polled job.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("job submission failed: {0}")]
    Submit(#[source] ClientError),

    #[error("status query for job {job_id} failed: {source}")]
    Query {
        job_id: String,
        #[source]
        source: ClientError,
    },

    #[error("job {job_id} failed: {reason}")]
    Failed { job_id: String, reason: String },

    #[error("job {0} succeeded without a result URL")]
    MissingResult(String),

    #[error("job {job_id} did not finish within {attempts} status checks")]
    Timeout { job_id: String, attempts: u32 },

    #[error("polling job {0} was cancelled")]
    Cancelled(String),
}

impl From<PollError> for GenerationError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Submit(source) | PollError::Query { source, .. } => source.into(),
            failed @ PollError::Failed { .. } => Self::Provider(failed.to_string()),
            PollError::MissingResult(job_id) => Self::MissingResult(job_id),
            timeout @ PollError::Timeout { .. } => Self::Timeout(timeout.to_string()),
            PollError::Cancelled(_) => Self::Cancelled,
        }
    }
}

/// A job that reached `Succeeded` with a usable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSuccess {
    pub handle: JobHandle,
    pub result_url: String,
    /// Status queries issued, including the final one.
    pub attempts: u32,
}

/// What one status answer means for the loop.
#[derive(Debug)]
enum Transition {
    Continue,
    Finished(Result<String, PollError>),
}

fn transition(handle: &JobHandle, query: Result<StatusQuery, ClientError>) -> Transition {
    match query {
        Ok(StatusQuery::Found(JobStatus::Succeeded { result_url: Some(url) })) => {
            Transition::Finished(Ok(url))
        }
        Ok(StatusQuery::Found(JobStatus::Succeeded { result_url: None })) => {
            Transition::Finished(Err(PollError::MissingResult(handle.to_string())))
        }
        Ok(StatusQuery::Found(JobStatus::Failed { reason })) => Transition::Finished(Err(PollError::Failed {
            job_id: handle.to_string(),
            reason: reason.unwrap_or_else(|| UNKNOWN_FAILURE.to_string()),
        })),
        Ok(StatusQuery::Found(JobStatus::Pending | JobStatus::Running { .. })) => Transition::Continue,
        Ok(StatusQuery::NotFound) => Transition::Continue,
        Err(source) => Transition::Finished(Err(PollError::Query {
            job_id: handle.to_string(),
            source,
        })),
    }
}

/// Submits jobs and waits for them to reach a terminal state.
#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn JobBackend>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl JobPoller {
    /// Create a poller that waits `interval` before each status query.
    pub fn new(backend: Arc<dyn JobBackend>, interval: Duration) -> Self {
        Self {
            backend,
            clock: Arc::new(TokioClock),
            interval,
        }
    }

    /// Replace the clock, e.g. with an instant one in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Submit a job. Any failure here is terminal.
    pub async fn submit(&self, submission: &JobSubmission) -> Result<JobHandle, PollError> {
        let handle = self.backend.submit(submission).await.map_err(PollError::Submit)?;
        info!(job_id = %handle, "Job submitted");
        Ok(handle)
    }

    /// Query a job's status once, without interpreting it.
    pub async fn status(&self, handle: &JobHandle) -> Result<StatusQuery, ClientError> {
        self.backend.status(handle).await
    }

    /// Poll `handle` until it reaches a terminal state, `max_attempts`
    /// queries have been spent, or `cancel` fires during a wait.
    pub async fn wait(
        &self,
        handle: &JobHandle,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<PollSuccess, PollError> {
        for attempt in 1..=max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(job_id = %handle, attempt, "Polling cancelled");
                    return Err(PollError::Cancelled(handle.to_string()));
                }
                _ = self.clock.sleep(self.interval) => {}
            }

            let query = self.backend.status(handle).await;
            match &query {
                Ok(StatusQuery::Found(status)) => {
                    let progress = match status {
                        JobStatus::Running { progress } => *progress,
                        _ => None,
                    };
                    info!(
                        job_id = %handle,
                        attempt,
                        max_attempts,
                        status = status.label(),
                        progress = ?progress,
                        "Job status"
                    );
                }
                Ok(StatusQuery::NotFound) => {
                    debug!(job_id = %handle, attempt, "Job not visible yet");
                }
                Err(e) => {
                    warn!(job_id = %handle, attempt, error = %e, "Status query failed");
                }
            }

            if let Transition::Finished(outcome) = transition(handle, query) {
                return outcome.map(|result_url| PollSuccess {
                    handle: handle.clone(),
                    result_url,
                    attempts: attempt,
                });
            }
        }

        Err(PollError::Timeout {
            job_id: handle.to_string(),
            attempts: max_attempts,
        })
    }

    /// Submit a job and wait for it.
    pub async fn run(
        &self,
        submission: &JobSubmission,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<PollSuccess, PollError> {
        let handle = self.submit(submission).await?;
        self.wait(&handle, max_attempts, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use genrun_core::{FailureKind, VideoRequest};

    use crate::testing::FakeJobs;

    /// Returns immediately and counts sleeps.
    #[derive(Default)]
    struct InstantClock {
        sleeps: AtomicUsize,
    }

    #[async_trait]
    impl Clock for InstantClock {
        async fn sleep(&self, _duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    }

    fn found(status: JobStatus) -> Result<StatusQuery, ClientError> {
        Ok(StatusQuery::Found(status))
    }

    fn running(progress: u8) -> Result<StatusQuery, ClientError> {
        found(JobStatus::Running {
            progress: Some(progress),
        })
    }

    fn succeeded(url: &str) -> Result<StatusQuery, ClientError> {
        found(JobStatus::Succeeded {
            result_url: Some(url.to_string()),
        })
    }

    fn poller(jobs: Arc<FakeJobs>) -> (JobPoller, Arc<InstantClock>) {
        let clock = Arc::new(InstantClock::default());
        let poller = JobPoller::new(jobs, Duration::from_secs(10)).with_clock(clock.clone());
        (poller, clock)
    }

    fn submission() -> JobSubmission {
        JobSubmission::from_request(&VideoRequest::new("a calm sea"), "video-model")
    }

    #[test]
    fn test_attempt_budget() {
        assert_eq!(attempt_budget(10, Duration::from_secs(10)), 60);
        assert_eq!(attempt_budget(25, Duration::from_secs(10)), 150);
        assert_eq!(attempt_budget(0, Duration::from_secs(10)), 1);
        assert_eq!(attempt_budget(1, Duration::ZERO), 60);
    }

    #[tokio::test]
    async fn test_succeeds_after_scripted_sequence() {
        let jobs = Arc::new(FakeJobs::new(vec![
            found(JobStatus::Pending),
            running(10),
            running(60),
            succeeded("https://cdn.example/x.mp4"),
        ]));
        let (poller, clock) = poller(jobs.clone());

        let outcome = poller
            .run(&submission(), 60, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.result_url, "https://cdn.example/x.mp4");
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.handle, JobHandle::new("job-1"));
        assert_eq!(jobs.polls(), 4);
        assert_eq!(clock.sleeps.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_timeout() {
        let jobs = Arc::new(FakeJobs::new((0..10).map(|_| running(5)).collect()));
        let (poller, _) = poller(jobs.clone());

        let err = poller
            .wait(&JobHandle::new("job-1"), 3, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Timeout { attempts: 3, .. }));
        assert_eq!(jobs.polls(), 3);
        assert_eq!(GenerationError::from(err).kind(), FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_failed_stops_immediately() {
        let jobs = Arc::new(FakeJobs::new(vec![
            running(20),
            found(JobStatus::Failed {
                reason: Some("content rejected".to_string()),
            }),
            succeeded("https://never"),
            running(99),
        ]));
        let (poller, _) = poller(jobs.clone());

        let err = poller
            .wait(&JobHandle::new("job-1"), 60, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PollError::Failed { ref job_id, ref reason } if job_id == "job-1" && reason == "content rejected"
        ));
        assert_eq!(jobs.polls(), 2);
        assert_eq!(jobs.remaining(), 2);
    }

    #[tokio::test]
    async fn test_failed_without_reason() {
        let jobs = Arc::new(FakeJobs::new(vec![found(JobStatus::Failed { reason: None })]));
        let (poller, _) = poller(jobs);

        let err = poller
            .wait(&JobHandle::new("job-1"), 5, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().ends_with(UNKNOWN_FAILURE));
    }

    #[tokio::test]
    async fn test_not_found_keeps_polling() {
        let jobs = Arc::new(FakeJobs::new(vec![
            Ok(StatusQuery::NotFound),
            Ok(StatusQuery::NotFound),
            succeeded("https://cdn.example/y.mp4"),
        ]));
        let (poller, _) = poller(jobs.clone());

        let outcome = poller
            .wait(&JobHandle::new("job-1"), 10, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_other_query_errors_are_terminal() {
        let jobs = Arc::new(FakeJobs::new(vec![
            running(1),
            Err(ClientError::Status {
                status: 500,
                body: "internal".into(),
            }),
            succeeded("https://never"),
        ]));
        let (poller, _) = poller(jobs.clone());

        let err = poller
            .wait(&JobHandle::new("job-1"), 10, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Query { .. }));
        assert_eq!(jobs.polls(), 2);
        assert_eq!(GenerationError::from(err).kind(), FailureKind::TransportError);
    }

    #[tokio::test]
    async fn test_success_without_url_is_missing_result() {
        let jobs = Arc::new(FakeJobs::new(vec![found(JobStatus::Succeeded { result_url: None })]));
        let (poller, _) = poller(jobs);

        let err = poller
            .wait(&JobHandle::new("job-9"), 10, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::MissingResult(ref id) if id == "job-9"));
        assert_eq!(GenerationError::from(err).kind(), FailureKind::MissingResult);
    }

    #[tokio::test]
    async fn test_submit_failure_never_polls() {
        let jobs = Arc::new(FakeJobs::new(vec![]).rejecting_submit(ClientError::Provider("bad prompt".into())));
        let (poller, clock) = poller(jobs.clone());

        let err = poller
            .run(&submission(), 10, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Submit(_)));
        assert_eq!(GenerationError::from(err).kind(), FailureKind::ProviderError);
        assert_eq!(jobs.polls(), 0);
        assert_eq!(clock.sleeps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_wait() {
        let jobs = Arc::new(FakeJobs::new(vec![succeeded("https://never")]));
        let (poller, _) = poller(jobs.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = poller.wait(&JobHandle::new("job-1"), 10, &cancel).await.unwrap_err();

        assert!(matches!(err, PollError::Cancelled(ref id) if id == "job-1"));
        assert_eq!(jobs.polls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_wait() {
        let jobs = Arc::new(FakeJobs::new((0..100).map(|_| running(1)).collect()));
        let poller = JobPoller::new(jobs.clone(), Duration::from_secs(10));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            trigger.cancel();
        });

        let err = poller.wait(&JobHandle::new("job-1"), 100, &cancel).await.unwrap_err();

        assert!(matches!(err, PollError::Cancelled(_)));
        assert_eq!(jobs.polls(), 2);
    }
}
