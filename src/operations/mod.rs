//! Operation descriptors, handlers and the per-client registry
//!
//! An operation is a marker type implementing [`Operation`]; a descriptor
//! pairs it with an input. Handlers are registered per kind in an
//! [`OperationRegistry`] owned by one [`crate::LedgerClient`], which resolves
//! them and runs them under an [`ExecutionScope`].

mod descriptor;
mod handler;
mod registry;
mod scope;
mod task;

pub use descriptor::{Operation, OperationDescriptor};
pub use handler::{FnHandler, OperationHandler};
pub use registry::{OperationPlugin, OperationRegistry};
pub use scope::{ExecuteOptions, ExecutionScope};
pub use task::{ExecutionStatus, OperationTask};
