//! Bounded-concurrency batch scheduler over the single-task runner.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::info;

use genrun_core::{BatchRequest, BatchResult, CoreError, FailureKind, TaskResult};

use crate::pool::{PoolError, WorkerPool};
use crate::runner::TaskRunner;

/// Runs batches of generation tasks.
#[derive(Clone)]
pub struct BatchScheduler {
    runner: Arc<TaskRunner>,
}

impl BatchScheduler {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self { runner }
    }

    /// Run every task in the batch.
    ///
    /// Only the batch's own bounds can fail the call, and they are checked
    /// before any task starts. Task failures are reported per task.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchResult, CoreError> {
        request.validate()?;

        let limit = NonZeroUsize::new(request.concurrency)
            .ok_or_else(|| CoreError::InvalidParams("concurrency must be at least 1".to_string()))?;
        let pool = WorkerPool::new(limit);

        info!(tasks = request.tasks.len(), concurrency = limit.get(), "Starting batch");

        let outcomes = pool
            .run(request.tasks, |task_index, spec| {
                let runner = self.runner.clone();
                async move {
                    let result = runner.run(&spec).await;
                    info!(task_index, success = result.is_success(), "Batch task finished");
                    result
                }
            })
            .await;

        let results: Vec<TaskResult> = outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(pool_failure))
            .collect();
        let batch = BatchResult { results };

        info!(
            total = batch.len(),
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "Batch completed"
        );
        Ok(batch)
    }
}

fn pool_failure(err: PoolError) -> TaskResult {
    let kind = match err {
        PoolError::Panicked { .. } => FailureKind::Unknown,
        PoolError::Cancelled { .. } => FailureKind::Cancelled,
    };
    TaskResult::failure(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use genrun_client::{ClientError, ContentPart, GenerationRequest, MessageContent};
    use genrun_core::TaskSpec;

    use crate::config::Config;
    use crate::testing::{FakeFetcher, FakeGeneration};

    fn prompt_of(request: &GenerationRequest) -> String {
        match &request.messages[1].content {
            MessageContent::Parts(parts) => match &parts[0] {
                ContentPart::Text { text } => text.lines().next().unwrap_or_default().to_string(),
                _ => String::new(),
            },
            MessageContent::Text(text) => text.clone(),
        }
    }

    /// Echoes the prompt back as an image URL; prompts starting with "fail" error.
    fn echo_backend(delay: Duration) -> Arc<FakeGeneration> {
        Arc::new(
            FakeGeneration::new(|request| {
                let prompt = prompt_of(request);
                if prompt.starts_with("fail") {
                    Err(ClientError::Provider(format!("rejected {}", prompt)))
                } else {
                    Ok(format!("![img](https://cdn.example/{}.png)", prompt))
                }
            })
            .with_delay(delay),
        )
    }

    fn scheduler(backend: Arc<FakeGeneration>) -> BatchScheduler {
        let config = Config {
            api_key: "sk-test".to_string(),
            ..Config::default()
        };
        let runner = TaskRunner::new(&config, backend, Arc::new(FakeFetcher::new()));
        BatchScheduler::new(Arc::new(runner))
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_order_and_independent_failures() {
        let backend = echo_backend(Duration::from_millis(20));
        let tasks = vec![
            TaskSpec::new("t0"),
            TaskSpec::new("fail1"),
            TaskSpec::new("t2"),
            TaskSpec::new("t3").with_guidance(0.5),
            TaskSpec::new("t4"),
        ];

        let batch = scheduler(backend.clone())
            .run(BatchRequest::new(tasks).with_concurrency(2))
            .await
            .unwrap();

        assert_eq!(batch.len(), 5);
        assert_eq!(batch.succeeded(), 3);
        assert_eq!(batch.failed(), 2);

        for (i, expected) in [(0, "t0"), (2, "t2"), (4, "t4")] {
            let TaskResult::Success { outputs, .. } = &batch.results[i] else {
                panic!("task {} should succeed", i);
            };
            assert_eq!(outputs[0].locator(), format!("https://cdn.example/{}.png", expected));
        }
        assert_eq!(batch.results[1].failure_kind(), Some(FailureKind::ProviderError));
        assert_eq!(batch.results[3].failure_kind(), Some(FailureKind::InvalidParams));

        assert!(backend.max_in_flight() <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_respected() {
        let backend = echo_backend(Duration::from_millis(50));
        let tasks = (0..12).map(|i| TaskSpec::new(format!("t{}", i))).collect();

        let batch = scheduler(backend.clone())
            .run(BatchRequest::new(tasks).with_concurrency(4))
            .await
            .unwrap();

        assert_eq!(batch.succeeded(), 12);
        assert_eq!(backend.max_in_flight(), 4);
    }

    #[tokio::test]
    async fn test_bounds_checked_before_dispatch() {
        let backend = echo_backend(Duration::ZERO);
        let s = scheduler(backend.clone());

        let too_many = (0..21).map(|i| TaskSpec::new(format!("t{}", i))).collect();
        assert!(s.run(BatchRequest::new(too_many)).await.is_err());

        assert!(s.run(BatchRequest::new(Vec::new())).await.is_err());

        let zero = BatchRequest::new(vec![TaskSpec::new("t")]).with_concurrency(0);
        assert!(s.run(zero).await.is_err());

        let eleven = BatchRequest::new(vec![TaskSpec::new("t")]).with_concurrency(11);
        assert!(s.run(eleven).await.is_err());

        assert!(backend.requests().is_empty());
    }
}
