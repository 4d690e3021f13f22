//! The operation contract: a two-phase unit of work driven by the invoker.

use async_trait::async_trait;

/// Dispatch lane selecting the concurrency policy for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// FIFO, at most one operation in flight at a time.
    Sequential,
    /// Dispatched independently as soon as a dispatch pass sees it.
    Parallel,
}

/// A unit of work with a two-phase lifecycle: asynchronous preparation,
/// then a synchronous run.
///
/// `prepare` resolves with the readiness verdict: `true` means the work may
/// run, `false` means preparation failed and `run` must not be invoked. The
/// invoker drops preparations that outlive its configured timeout, so
/// implementations must tolerate being cancelled at any await point.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Human-readable name, used in logs and diagnostics only.
    fn name(&self) -> &str;

    /// Carry out preparation and report readiness.
    async fn prepare(&self) -> bool;

    /// Execute the prepared work. Invoked at most once, off the dispatch
    /// loop, and only after `prepare` resolved `true`.
    fn run(&self);
}
