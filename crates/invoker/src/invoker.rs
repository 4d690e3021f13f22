//! The invoker: submission API, coalesced dispatch loop, and the
//! process-wide instance.
//!
//! All queue state lives on a dedicated dispatch loop driven by its own
//! runtime thread, so submissions are accepted from any thread, async or
//! not, and queue mutation never races. Runners execute on worker tasks
//! and report back through the same channel the submissions arrive on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gleis_core::{Lane, OperationHandle};

use crate::config::InvokerConfig;
use crate::error::InvokeError;
use crate::metrics::InvokerMetrics;
use crate::queues::DispatchQueues;
use crate::runner;

/// Commands crossing from callers and runners into the dispatch loop.
enum Command {
    Execute {
        handle: OperationHandle,
        in_sequence: bool,
    },
    Finished {
        lane: Lane,
        result: Result<(), InvokeError>,
    },
}

/// Two-lane operation scheduler.
///
/// Operations submitted with [`execute`](Invoker::execute) go through the
/// two-phase prepare/run protocol on worker tasks. The sequential lane is
/// FIFO with at most one operation in flight; the parallel lane dispatches
/// everything it sees. Bursts of submissions are folded into a single
/// dispatch pass.
///
/// Dropping an invoker lets in-flight work finish and abandons anything
/// still queued once the lane goes idle; the [`global`](Invoker::global)
/// instance is never dropped.
pub struct Invoker {
    tx: mpsc::UnboundedSender<Command>,
    in_sequence_mode: Arc<AtomicBool>,
    metrics: Arc<RwLock<InvokerMetrics>>,
}

impl Invoker {
    /// Start a new invoker with its own dispatch thread.
    pub fn new(config: InvokerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let in_sequence_mode = Arc::new(AtomicBool::new(config.in_sequence_mode));
        let metrics = Arc::new(RwLock::new(InvokerMetrics::default()));

        let dispatch = DispatchLoop {
            rx,
            tx: tx.downgrade(),
            queues: DispatchQueues::new(),
            in_flight: false,
            in_sequence_mode: Arc::clone(&in_sequence_mode),
            metrics: Arc::clone(&metrics),
            prepare_timeout: config.prepare_timeout(),
        };

        let worker_threads = config.resolved_worker_threads();
        std::thread::Builder::new()
            .name("gleis-invoker".into())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(worker_threads)
                    .thread_name("gleis-worker")
                    .enable_all()
                    .build()
                    .expect("failed to build invoker runtime");
                rt.block_on(dispatch.run());
            })
            .expect("failed to spawn invoker dispatch thread");

        Self {
            tx,
            in_sequence_mode,
            metrics,
        }
    }

    /// The process-wide invoker, created on first access from environment
    /// configuration and alive for the rest of the process.
    pub fn global() -> &'static Invoker {
        static GLOBAL: OnceLock<Invoker> = OnceLock::new();
        GLOBAL.get_or_init(|| Invoker::new(InvokerConfig::from_env()))
    }

    /// Submit an operation for dispatch.
    ///
    /// The operation goes to the sequential lane when `in_sequence` is
    /// true or the default lane mode is sequential, otherwise to the
    /// parallel lane. The handle is returned unchanged so the caller can
    /// keep interacting with the operation before it runs. A handle whose
    /// operation is already gone is a no-op.
    pub fn execute(&self, handle: OperationHandle, in_sequence: bool) -> OperationHandle {
        if !handle.is_live() {
            debug!(op = %handle.name(), "ignoring execute of destroyed operation");
            return handle;
        }
        info!(op = %handle.name(), id = %handle.id(), "preparing to execute operation");
        let command = Command::Execute {
            handle: handle.clone(),
            in_sequence,
        };
        if self.tx.send(command).is_err() {
            warn!(op = %handle.name(), "invoker dispatch loop is gone, dropping submission");
        }
        handle
    }

    /// Default lane mode: true = sequential.
    pub fn in_sequence(&self) -> bool {
        self.in_sequence_mode.load(Ordering::Acquire)
    }

    /// Set the default lane for future `execute` calls that do not ask
    /// for one.
    pub fn set_in_sequence(&self, in_sequence: bool) {
        self.in_sequence_mode.store(in_sequence, Ordering::Release);
    }

    /// Snapshot of the invoker metrics.
    pub fn metrics(&self) -> InvokerMetrics {
        self.metrics.read().unwrap().clone()
    }
}

/// The owning side of the invoker: sole mutator of the queues and the
/// sequential in-flight flag.
struct DispatchLoop {
    rx: mpsc::UnboundedReceiver<Command>,
    /// Weak so that in-flight runners, not the loop itself, keep the
    /// channel open during shutdown.
    tx: mpsc::WeakUnboundedSender<Command>,
    queues: DispatchQueues,
    in_flight: bool,
    in_sequence_mode: Arc<AtomicBool>,
    metrics: Arc<RwLock<InvokerMetrics>>,
    prepare_timeout: Duration,
}

impl DispatchLoop {
    async fn run(mut self) {
        debug!("invoker dispatch loop started");
        while let Some(command) = self.rx.recv().await {
            self.apply(command);
            // Coalesce: fold every command already pending into this pass
            // instead of dispatching once per submission.
            while let Ok(command) = self.rx.try_recv() {
                self.apply(command);
            }
            self.dispatch();
        }
        debug!("invoker dispatch loop stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Execute { handle, in_sequence } => {
                let lane = if in_sequence || self.in_sequence_mode.load(Ordering::Acquire) {
                    Lane::Sequential
                } else {
                    Lane::Parallel
                };
                if lane == Lane::Sequential
                    && (self.in_flight || self.queues.sequential_depth() > 0)
                {
                    info!(
                        op = %handle.name(),
                        depth = self.queues.sequential_depth(),
                        "operation queued behind earlier work"
                    );
                }
                self.queues.push(lane, handle);
                self.metrics.write().unwrap().submitted += 1;
            }
            Command::Finished { lane, result } => {
                if lane == Lane::Sequential {
                    self.in_flight = false;
                }
                if let Err(e) = &result {
                    warn!(lane = ?lane, error = %e, "operation abandoned");
                }
                self.metrics.write().unwrap().record_result(&result);
            }
        }
    }

    /// One dispatch pass over both lanes.
    fn dispatch(&mut self) {
        // Sequential lane: one at a time, FIFO, skipping entries that
        // died while queued.
        if !self.in_flight {
            let (next, skipped) = self.queues.pop_sequential();
            if skipped > 0 {
                self.metrics.write().unwrap().stale_skipped += skipped as u64;
            }
            if let Some(handle) = next {
                info!(
                    op = %handle.name(),
                    queued = self.queues.sequential_depth(),
                    "dispatching sequential operation"
                );
                if self.spawn_runner(handle, Lane::Sequential) {
                    self.in_flight = true;
                    self.metrics.write().unwrap().dispatched_sequential += 1;
                }
            }
        }

        // Parallel lane: everything currently queued, each independently.
        for handle in self.queues.take_parallel() {
            if handle.is_live() {
                info!(op = %handle.name(), "dispatching parallel operation");
                if self.spawn_runner(handle, Lane::Parallel) {
                    self.metrics.write().unwrap().dispatched_parallel += 1;
                }
            } else {
                warn!(op = %handle.name(), "dropping destroyed operation from parallel set");
                self.metrics.write().unwrap().stale_skipped += 1;
            }
        }

        let mut m = self.metrics.write().unwrap();
        m.sequential_queue_depth = self.queues.sequential_depth();
        m.parallel_pending = self.queues.parallel_pending();
        m.sequential_in_flight = self.in_flight;
    }

    /// Hand an operation to a runner on a worker task. Returns false only
    /// during shutdown, when there is nobody left to report to.
    fn spawn_runner(&self, handle: OperationHandle, lane: Lane) -> bool {
        let Some(tx) = self.tx.upgrade() else {
            return false;
        };
        let prepare_timeout = self.prepare_timeout;
        tokio::spawn(async move {
            let result = runner::run_for(&handle, prepare_timeout).await;
            // The loop must always learn the outcome, exactly once.
            let _ = tx.send(Command::Finished { lane, result });
        });
        true
    }
}
