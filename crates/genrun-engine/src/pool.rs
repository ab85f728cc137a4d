//! Generic bounded worker pool.
//!
//! Runs a list of items through an async function with at most `limit`
//! executions in flight. Items launch in queue order; whenever one finishes the
//! next queued item starts. Results come back in input order no matter which
//! execution finished first.

use std::future::Future;
use std::num::NonZeroUsize;

use futures_util::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tokio::task::{AbortHandle, JoinError};
use tracing::{debug, warn};

/// An execution that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("task {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    #[error("task {index} was cancelled")]
    Cancelled { index: usize },
}

impl PoolError {
    fn from_join(index: usize, err: JoinError) -> Self {
        if err.is_panic() {
            let payload = err.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Self::Panicked { index, message }
        } else {
            Self::Cancelled { index }
        }
    }
}

/// Aborts every spawned execution when dropped, so abandoning the pool's
/// future does not leave work running in the background.
#[derive(Default)]
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Bounded-concurrency pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    limit: NonZeroUsize,
}

impl WorkerPool {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self { limit }
    }

    /// Run `f` over every item and collect the results in input order.
    ///
    /// `f` receives the item's index alongside the item. One execution
    /// failing or panicking never affects the others.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, f: F) -> Vec<Result<R, PoolError>>
    where
        F: Fn(usize, T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        let total = items.len();
        let mut queue = items.into_iter().enumerate();
        let mut slots: Vec<Option<Result<R, PoolError>>> = (0..total).map(|_| None).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut spawned = AbortOnDrop::default();

        debug!(total, limit = self.limit.get(), "Starting pool run");

        loop {
            while in_flight.len() < self.limit.get() {
                let Some((index, item)) = queue.next() else {
                    break;
                };
                let handle = tokio::spawn(f(index, item));
                spawned.0.push(handle.abort_handle());
                in_flight.push(async move { (index, handle.await) });
            }

            let Some((index, outcome)) = in_flight.next().await else {
                break;
            };

            let outcome = outcome.map_err(|e| PoolError::from_join(index, e));
            if let Err(e) = &outcome {
                warn!(index, error = %e, "Pool execution did not complete");
            }
            slots[index] = Some(outcome);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or(Err(PoolError::Cancelled { index })))
            .collect()
    }
}
