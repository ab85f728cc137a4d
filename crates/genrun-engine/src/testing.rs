//! In-memory fakes for the remote boundaries, shared by the engine's tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use genrun_client::{
    ClientError, FetchedBytes, Fetcher, GenerationBackend, GenerationRequest, JobBackend,
    JobSubmission, StatusQuery,
};
use genrun_core::JobHandle;

/// Fetcher serving scripted responses; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, FetchedBytes>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, url: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        self.responses.insert(
            url.to_string(),
            FetchedBytes {
                bytes,
                content_type: content_type.map(str::to_string),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, ClientError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses.get(url).cloned().ok_or_else(|| ClientError::Status {
            status: 404,
            body: format!("no such resource: {}", url),
        })
    }
}

type Reply = dyn Fn(&GenerationRequest) -> Result<String, ClientError> + Send + Sync;

/// Generation backend answering through a closure, with optional latency.
pub struct FakeGeneration {
    reply: Box<Reply>,
    delay: Duration,
    requests: Mutex<Vec<GenerationRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGeneration {
    pub fn new(
        reply: impl Fn(&GenerationRequest) -> Result<String, ClientError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            reply: Box::new(reply),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Always answer with the same text.
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for FakeGeneration {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, ClientError> {
        self.requests.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.reply)(request)
    }
}

/// Job backend replaying a scripted sequence of status answers.
pub struct FakeJobs {
    submit_reply: Mutex<Option<Result<JobHandle, ClientError>>>,
    script: Mutex<VecDeque<Result<StatusQuery, ClientError>>>,
    submissions: Mutex<Vec<JobSubmission>>,
    polls: AtomicUsize,
}

impl FakeJobs {
    /// Accepts submissions as `job-1` and answers polls from `script`.
    pub fn new(script: Vec<Result<StatusQuery, ClientError>>) -> Self {
        Self {
            submit_reply: Mutex::new(Some(Ok(JobHandle::new("job-1")))),
            script: Mutex::new(script.into()),
            submissions: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting_submit(self, err: ClientError) -> Self {
        *self.submit_reply.lock().unwrap() = Some(Err(err));
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBackend for FakeJobs {
    async fn submit(&self, submission: &JobSubmission) -> Result<JobHandle, ClientError> {
        self.submissions.lock().unwrap().push(submission.clone());
        self.submit_reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(JobHandle::new("job-1")))
    }

    async fn status(&self, _handle: &JobHandle) -> Result<StatusQuery, ClientError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(StatusQuery::Found(genrun_core::JobStatus::Pending)))
    }
}
