//! Deadline-bound request context.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Carries the caller's deadline into every store and cache call.
///
/// Dropping the operation future cancels whatever call is in flight; the deadline
/// turns a call that outlives it into a timeout at the calling operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
}

/// The deadline passed before the bound call finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

impl RequestContext {
    /// A context without a deadline.
    pub fn background() -> Self {
        Self { deadline: None }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Runs `fut` under this context's deadline.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| DeadlineExceeded),
            None => Ok(fut.await),
        }
    }
}
