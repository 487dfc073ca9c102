//! Best-effort application of advisory cache steps.
//!
//! A primary operation (register, login, ...) decides success or failure on its
//! own. Cache side effects run through [`BestEffort::apply`]: failures and
//! deadline overruns become [`CacheWarning`]s, get logged, and never reach the
//! caller.

use crate::context::RequestContext;
use crate::models::CacheError;
use std::future::Future;

/// A cache step that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheWarning {
    pub step: &'static str,
    pub error: CacheError,
}

impl std::fmt::Display for CacheWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step, self.error)
    }
}

/// Collects warnings from the advisory steps of one operation.
#[derive(Debug)]
pub struct BestEffort<'a> {
    ctx: &'a RequestContext,
    operation: &'static str,
    warnings: Vec<CacheWarning>,
}

impl<'a> BestEffort<'a> {
    pub fn new(ctx: &'a RequestContext, operation: &'static str) -> Self {
        Self {
            ctx,
            operation,
            warnings: Vec::new(),
        }
    }

    /// Runs one cache step under the context deadline.
    ///
    /// Returns the step's value, or `None` if it failed or timed out.
    pub async fn apply<T, F>(&mut self, step: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        let error = match self.ctx.bound(fut).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(error)) => error,
            Err(_) => CacheError::Timeout,
        };
        tracing::warn!(
            operation = self.operation,
            step,
            error = %error,
            "cache step failed; continuing"
        );
        self.warnings.push(CacheWarning { step, error });
        None
    }

    /// Records a failure a step reported without failing itself (e.g. one key of a purge).
    pub fn record(&mut self, step: &'static str, key: &str, error: CacheError) {
        tracing::warn!(
            operation = self.operation,
            step,
            key,
            error = %error,
            "cache step failed; continuing"
        );
        self.warnings.push(CacheWarning { step, error });
    }

    pub fn warnings(&self) -> &[CacheWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<CacheWarning> {
        self.warnings
    }
}
