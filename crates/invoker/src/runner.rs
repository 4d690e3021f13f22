//! Drives one operation through prepare → wait → run on a worker task.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use gleis_core::{OperationHandle, Phase, PhaseTracker};

use crate::error::InvokeError;

/// What the wait for readiness resolved to first.
enum Wait {
    Ready(bool),
    Destroyed,
    TimedOut,
}

/// Run one operation through the two-phase protocol.
///
/// Invokes `prepare`, waits for readiness, destruction or the timeout,
/// and runs the operation when preparation succeeded. Never called on the
/// dispatch loop itself. Whatever happens, the caller must report the
/// returned result back to the loop exactly once.
pub(crate) async fn run_for(
    handle: &OperationHandle,
    prepare_timeout: Duration,
) -> Result<(), InvokeError> {
    let name = handle.name().to_string();

    let Some(op) = handle.upgrade() else {
        return Err(InvokeError::Stale { name });
    };

    let mut lifecycle = PhaseTracker::new(name.as_str());
    lifecycle.advance(Phase::Preparing);
    debug!(op = %name, id = %handle.id(), "preparing");

    let wait = {
        let mut prepare = op.prepare();
        tokio::select! {
            ready = &mut prepare => Wait::Ready(ready),
            _ = handle.destroyed() => Wait::Destroyed,
            _ = sleep(prepare_timeout) => Wait::TimedOut,
        }
    };

    match wait {
        Wait::Ready(true) => {
            lifecycle.advance(Phase::Ready);
            // The owner may have pulled the operation while the readiness
            // verdict was in flight; a stale verdict must not start a run.
            if handle.is_destroyed() {
                lifecycle.advance(Phase::Destroyed);
                warn!(op = %name, "operation destroyed after becoming ready");
                return Err(InvokeError::Destroyed { name });
            }
            lifecycle.advance(Phase::Running);
            debug!(op = %name, "running");
            match tokio::task::spawn_blocking(move || op.run()).await {
                Ok(()) => {
                    lifecycle.advance(Phase::Completed);
                    info!(op = %name, "operation completed");
                }
                Err(e) => {
                    // A panicking run still frees the lane.
                    lifecycle.advance(Phase::Completed);
                    error!(op = %name, error = %e, "operation run panicked");
                }
            }
            Ok(())
        }
        Wait::Ready(false) => {
            lifecycle.advance(Phase::Failed);
            warn!(op = %name, "operation failed preparation");
            Err(InvokeError::PreparationFailed { name })
        }
        Wait::TimedOut => {
            lifecycle.advance(Phase::TimedOut);
            warn!(
                op = %name,
                timeout = ?prepare_timeout,
                "operation did not become ready in time"
            );
            Err(InvokeError::PreparationTimedOut {
                name,
                timeout: prepare_timeout,
            })
        }
        Wait::Destroyed => {
            lifecycle.advance(Phase::Destroyed);
            warn!(op = %name, "operation destroyed while waiting for readiness");
            Err(InvokeError::Destroyed { name })
        }
    }
}
