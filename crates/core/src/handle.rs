//! Weak observation of externally owned operations.
//!
//! The invoker never owns an operation. It stores [`OperationHandle`]s,
//! which observe liveness without extending lifetime and subscribe to the
//! one-shot destruction notification fired when the [`OperationOwner`] is
//! dropped. Liveness must be re-checked after every suspension point.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::operation::Operation;

/// One-shot destruction notification shared between an owner and the
/// handles observing it.
///
/// Safe for late subscribers: waiting after the signal has fired resolves
/// immediately.
#[derive(Debug, Default)]
pub struct DestroySignal {
    fired: AtomicBool,
    notify: Notify,
}

impl DestroySignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal and wake every waiter. Idempotent.
    pub fn fire(&self) {
        self.fired.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Wait until the signal fires.
    pub async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before the flag check so a concurrent fire() cannot
        // slip between the check and the wait.
        notified.as_mut().enable();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

/// Owning side of a submitted operation.
///
/// The creator keeps the owner (and, via [`OperationOwner::from_arc`],
/// optionally a typed `Arc` to interact with the operation) and hands
/// [`OperationHandle`]s to the invoker. Dropping the owner at any point,
/// including while a runner is waiting on the operation, fires the
/// destruction notification and makes every handle dead.
///
/// Liveness is governed by the owner alone: outstanding `Arc` clones keep
/// the memory valid but do not keep the operation alive for dispatch.
pub struct OperationOwner {
    op: Arc<dyn Operation>,
    destroy: Arc<DestroySignal>,
    id: Uuid,
}

impl OperationOwner {
    pub fn new(op: impl Operation + 'static) -> Self {
        Self::from_arc(Arc::new(op))
    }

    /// Build an owner from an existing `Arc`, letting the caller retain a
    /// typed clone for interaction before the operation runs.
    pub fn from_arc(op: Arc<dyn Operation>) -> Self {
        Self {
            op,
            destroy: Arc::new(DestroySignal::new()),
            id: Uuid::new_v4(),
        }
    }

    pub fn name(&self) -> &str {
        self.op.name()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// A weak handle suitable for queueing in the invoker.
    pub fn handle(&self) -> OperationHandle {
        OperationHandle {
            op: Arc::downgrade(&self.op),
            destroy: Arc::clone(&self.destroy),
            name: Arc::from(self.op.name()),
            id: self.id,
        }
    }

    /// Destroy the operation explicitly. Equivalent to dropping the owner.
    pub fn destroy(self) {}
}

impl Drop for OperationOwner {
    fn drop(&mut self) {
        self.destroy.fire();
    }
}

impl fmt::Debug for OperationOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationOwner")
            .field("name", &self.op.name())
            .field("id", &self.id)
            .finish()
    }
}

/// Weak handle to an operation: does not keep it alive, detects its
/// destruction, and can still name it in diagnostics after it is gone.
#[derive(Clone)]
pub struct OperationHandle {
    op: Weak<dyn Operation>,
    destroy: Arc<DestroySignal>,
    name: Arc<str>,
    id: Uuid,
}

impl OperationHandle {
    /// The operation's name, captured at handle creation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submission id, stable across handle clones.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_live(&self) -> bool {
        !self.destroy.is_fired() && self.op.strong_count() > 0
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroy.is_fired()
    }

    /// Borrow the operation for use. Returns `None` once the owner has
    /// destroyed it, even if other `Arc` clones still exist.
    pub fn upgrade(&self) -> Option<Arc<dyn Operation>> {
        if self.destroy.is_fired() {
            return None;
        }
        self.op.upgrade()
    }

    /// Resolves when the owner destroys the operation. Resolves
    /// immediately if it already has.
    pub async fn destroyed(&self) {
        self.destroy.wait().await;
    }
}

impl fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}
