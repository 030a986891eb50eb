//! Cooperative cancellation
//!
//! - **signal**: abort controller/signal pair with a stable captured reason
//! - **scope**: per-call-tree scope that detaches its listeners on close

mod scope;
mod signal;

pub use scope::CancellationScope;
pub use signal::{AbortController, AbortReason, AbortSignal, ListenerId};
