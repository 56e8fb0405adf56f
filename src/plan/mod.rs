//! The write barrier and everything it drives: the barrier itself, the
//! per-worker write buffer, the flush into the mark work queue, and the typed
//! memory operations that run the barrier in bulk.

pub mod barrier_state;
pub mod barriers;
pub mod flush;
pub mod tracing;
pub mod typed_memory;
pub mod wbbuf;

pub use barriers::{Barrier, HybridBarrier, NoBarrier};
pub use tracing::{MarkWorkQueue, SharedMarkQueue};
pub use wbbuf::WriteBuffer;
