//! Scheduler port
//!
//! Abstraction over timed suspension. The engine only suspends while
//! backing off from an unavailable server; tests substitute a scheduler
//! that records the requested delays, or run [`TokioScheduler`] on a
//! paused tokio clock.

use std::time::Duration;

/// Suspends the current task for a period of time
#[async_trait::async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Scheduler backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait::async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        // tokio panics on deadlines past its representable range
        match tokio::time::Instant::now().checked_add(duration) {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
