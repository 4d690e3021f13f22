//! The dispatch queue pair owned by the invoker loop.

use std::collections::VecDeque;

use tracing::warn;

use gleis_core::{Lane, OperationHandle};

/// Ordered sequential queue plus unordered parallel set.
///
/// Entries leave a queue when popped for dispatch, not on completion;
/// in-flight tracking is the dispatch loop's business. Handles are weak,
/// so entries can die while queued and are skipped at pop time.
#[derive(Default)]
pub(crate) struct DispatchQueues {
    sequential: VecDeque<OperationHandle>,
    parallel: Vec<OperationHandle>,
}

impl DispatchQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, lane: Lane, handle: OperationHandle) {
        match lane {
            Lane::Sequential => self.sequential.push_back(handle),
            Lane::Parallel => self.parallel.push(handle),
        }
    }

    /// Pop the next live sequential entry in submission order, skipping
    /// entries destroyed while queued. Returns the live handle, if any,
    /// and the number of dead entries dropped on the way.
    pub fn pop_sequential(&mut self) -> (Option<OperationHandle>, usize) {
        let mut skipped = 0;
        while let Some(handle) = self.sequential.pop_front() {
            if handle.is_live() {
                return (Some(handle), skipped);
            }
            warn!(
                op = %handle.name(),
                id = %handle.id(),
                "dropping destroyed operation from sequential queue"
            );
            skipped += 1;
        }
        (None, skipped)
    }

    /// Take every queued parallel entry, live or not. The caller filters
    /// and dispatches each one independently.
    pub fn take_parallel(&mut self) -> Vec<OperationHandle> {
        std::mem::take(&mut self.parallel)
    }

    pub fn sequential_depth(&self) -> usize {
        self.sequential.len()
    }

    pub fn parallel_pending(&self) -> usize {
        self.parallel.len()
    }
}
