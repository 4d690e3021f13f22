//! Invoker operational metrics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::InvokeError;

/// Counters and gauges describing invoker activity.
///
/// Updated only by the dispatch loop; read through
/// [`Invoker::metrics`](crate::Invoker::metrics).
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvokerMetrics {
    /// Operations accepted by `execute`.
    pub submitted: u64,
    /// Operations handed to a runner on the sequential lane.
    pub dispatched_sequential: u64,
    /// Operations handed to a runner on the parallel lane.
    pub dispatched_parallel: u64,
    /// Runs that finished (a panicking run frees the lane all the same).
    pub completed: u64,
    /// Preparations that reported `false`.
    pub preparation_failed: u64,
    /// Preparations that outlived the timeout.
    pub preparation_timed_out: u64,
    /// Operations destroyed by their owner mid-flight.
    pub destroyed: u64,
    /// Queue entries found dead at dispatch time.
    pub stale_skipped: u64,
    /// Current sequential queue depth.
    pub sequential_queue_depth: usize,
    /// Parallel entries awaiting the next dispatch pass.
    pub parallel_pending: usize,
    /// Whether a sequential operation is between prepare and run
    /// completion right now.
    pub sequential_in_flight: bool,
    /// When the most recent runner reported back.
    pub last_completion: Option<DateTime<Utc>>,
}

impl InvokerMetrics {
    /// Record a runner's completion report.
    pub fn record_result(&mut self, result: &Result<(), InvokeError>) {
        match result {
            Ok(()) => self.completed += 1,
            Err(InvokeError::PreparationFailed { .. }) => self.preparation_failed += 1,
            Err(InvokeError::PreparationTimedOut { .. }) => self.preparation_timed_out += 1,
            Err(InvokeError::Destroyed { .. }) => self.destroyed += 1,
            Err(InvokeError::Stale { .. }) => self.stale_skipped += 1,
        }
        self.last_completion = Some(Utc::now());
    }

    /// Submissions resolved one way or another.
    pub fn settled(&self) -> u64 {
        self.completed
            + self.preparation_failed
            + self.preparation_timed_out
            + self.destroyed
            + self.stale_skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_is_all_zero() {
        let m = InvokerMetrics::default();
        assert_eq!(m.submitted, 0);
        assert_eq!(m.settled(), 0);
        assert!(!m.sequential_in_flight);
        assert!(m.last_completion.is_none());
    }

    #[test]
    fn record_success() {
        let mut m = InvokerMetrics::default();
        m.record_result(&Ok(()));

        assert_eq!(m.completed, 1);
        assert_eq!(m.settled(), 1);
        assert!(m.last_completion.is_some());
    }

    #[test]
    fn record_each_failure_class() {
        let mut m = InvokerMetrics::default();
        m.record_result(&Err(InvokeError::PreparationFailed { name: "a".into() }));
        m.record_result(&Err(InvokeError::PreparationTimedOut {
            name: "b".into(),
            timeout: Duration::from_secs(5),
        }));
        m.record_result(&Err(InvokeError::Destroyed { name: "c".into() }));
        m.record_result(&Err(InvokeError::Stale { name: "d".into() }));

        assert_eq!(m.preparation_failed, 1);
        assert_eq!(m.preparation_timed_out, 1);
        assert_eq!(m.destroyed, 1);
        assert_eq!(m.stale_skipped, 1);
        assert_eq!(m.completed, 0);
        assert_eq!(m.settled(), 4);
    }

    #[test]
    fn serializes_to_json() {
        let m = InvokerMetrics::default();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["submitted"], 0);
        assert_eq!(json["sequential_in_flight"], false);
    }
}
