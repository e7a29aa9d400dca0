//! Global concurrency limiter
//!
//! Bounds the number of simultaneously in-flight analysis operations across
//! the whole batch, regardless of how many documents or pages are queued.
//! Waiters are admitted in FIFO order (tokio's semaphore is fair), so a
//! large document cannot starve a small one. The limiter applies no
//! backpressure of its own; callers decide how many `run` calls to issue.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// FIFO-fair concurrency limiter shared across a batch run
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `limit` concurrent operations
    ///
    /// A limit of zero would deadlock every caller, so it is clamped to 1.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Run a future once a slot is available
    ///
    /// The slot is held for the full duration of the future and released on
    /// completion, including when the future's work failed internally.
    pub async fn run<F>(&self, fut: F) -> F::Output
    where
        F: Future,
    {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("limiter semaphore closed");
        fut.await
    }

    /// Configured concurrency bound
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently free
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn run_executes_future() {
        let limiter = ConcurrencyLimiter::new(2);
        let value = limiter.run(async { 41 + 1 }).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn zero_limit_is_clamped() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.limit(), 1);
        // Must not deadlock.
        limiter.run(async {}).await;
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let limiter = Arc::new(ConcurrencyLimiter::new(3));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    limiter
                        .run(async {
                            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            current.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await;
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.available(), 3);
    }

    #[tokio::test]
    async fn slot_released_after_completion() {
        let limiter = ConcurrencyLimiter::new(1);
        limiter.run(async {}).await;
        limiter.run(async {}).await;
        assert_eq!(limiter.available(), 1);
    }
}
