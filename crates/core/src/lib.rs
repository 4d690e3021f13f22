pub mod handle;
pub mod lifecycle;
pub mod operation;

pub use handle::{DestroySignal, OperationHandle, OperationOwner};
pub use lifecycle::{Phase, PhaseTracker};
pub use operation::{Lane, Operation};
