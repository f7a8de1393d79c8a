//! Bounded, order-preserving worker pool for model calls

use crate::{AgentError, Result};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs independent jobs with at most `max_concurrency` in flight. Model
/// calls inside a job go through [`WorkerPool::call`], so each attempt gets
/// its own timeout; an expired call fails with [`AgentError::Timeout`] and
/// does not affect the others.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_concurrency: usize,
    call_timeout: Duration,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY, DEFAULT_CALL_TIMEOUT)
    }
}

impl WorkerPool {
    pub fn new(max_concurrency: usize, call_timeout: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            call_timeout,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Apply the per-call timeout to one future
    pub async fn call<R, Fut>(&self, fut: Fut) -> Result<R>
    where
        Fut: Future<Output = Result<R>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(self.call_timeout)),
        }
    }

    /// Map `f` over `items`. Outputs are returned in input order.
    pub async fn run<T, O, F, Fut>(&self, items: Vec<T>, f: F) -> Vec<O>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = O>,
    {
        stream::iter(items.into_iter().map(f))
            .buffered(self.max_concurrency)
            .collect()
            .await
    }
}
