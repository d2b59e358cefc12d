//! Pooled per-call state.
//!
//! * [`RuntimeContext`]: buffers, cycle-detection set, indent bookkeeping and
//!   the VM stacks for one encode or decode call.
//! * [`MapContext`]: entry collection and ordering for one map being encoded.
//!
//! Both come from bounded free-lists ([`Pool`]) guarded by a `parking_lot`
//! mutex held only for a push or pop.

mod context;
mod map_context;
mod pool;

pub use context::{acquire_context, release_context, ContextGuard, ContextLengths, RuntimeContext};
pub use map_context::MapContext;
pub use pool::{Pool, Poolable};
