//! Genrun Engine
//!
//! Orchestrates generation work on top of the remote clients:
//! - [`runner`]: one image task, validation through persistence
//! - [`batch`]: many tasks under a concurrency cap, via the generic [`pool`]
//! - [`poller`]: the submit-and-poll state machine for job-based providers
//! - [`video`]: video jobs with a parameter-scaled deadline
//!
//! Core logic never reads the environment; everything comes in through
//! [`Config`] and the backend traits.

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod persist;
pub mod poller;
pub mod pool;
pub mod runner;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use genrun_client::{Fetcher, GenerationBackend, GenerationClient, HttpFetcher, JobBackend, JobClient};

pub use batch::BatchScheduler;
pub use config::{Config, ConfigError};
pub use error::GenerationError;
pub use extract::extract_images;
pub use normalize::ReferenceNormalizer;
pub use persist::OutputWriter;
pub use poller::{attempt_budget, Clock, JobPoller, PollError, PollSuccess, TokioClock};
pub use pool::{PoolError, WorkerPool};
pub use runner::TaskRunner;
pub use video::{deadline_minutes, VideoGenerator, VideoOutcome};

/// Everything a caller-facing surface needs, wired from one configuration.
#[derive(Clone)]
pub struct Engine {
    pub runner: Arc<TaskRunner>,
    pub batch: BatchScheduler,
    pub video: VideoGenerator,
}

impl Engine {
    /// Wire the engine against the real HTTP clients.
    pub fn from_config(config: &Config) -> Self {
        let generation = Arc::new(GenerationClient::new(
            &config.api_url,
            &config.api_key,
            config.request_timeout(),
        ));
        let jobs = Arc::new(JobClient::new(
            &config.video_api_url,
            &config.api_key,
            config.fetch_timeout(),
        ));
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout()));

        Self::with_backends(config, generation, jobs, fetcher)
    }

    /// Wire the engine against arbitrary backends.
    pub fn with_backends(
        config: &Config,
        generation: Arc<dyn GenerationBackend>,
        jobs: Arc<dyn JobBackend>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let runner = Arc::new(TaskRunner::new(config, generation, fetcher.clone()));
        let batch = BatchScheduler::new(runner.clone());

        let poller = JobPoller::new(jobs, config.poll_interval());
        let writer = OutputWriter::new(fetcher, config.default_output_dir());
        let video = VideoGenerator::new(poller, writer, config.video_model.clone());

        Self { runner, batch, video }
    }
}
