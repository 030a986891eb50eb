//! Per-client handler registry
//!
//! Handlers are stored type-erased under their operation's `KIND` and
//! downcast back on lookup. Registration is a setup-phase activity: the
//! client builder owns a mutable registry, and a built client only reads it.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::descriptor::{Operation, OperationDescriptor};
use super::handler::{FnHandler, OperationHandler};
use super::scope::ExecutionScope;
use crate::client::LedgerClient;
use crate::errors::SdkError;

/// Installs a group of handlers in one go
pub trait OperationPlugin {
    fn install(&self, registry: &mut OperationRegistry);
}

impl<F> OperationPlugin for F
where
    F: Fn(&mut OperationRegistry),
{
    fn install(&self, registry: &mut OperationRegistry) {
        self(registry)
    }
}

struct Entry {
    operation: &'static str,
    handler: Arc<dyn Any + Send + Sync>,
}

/// Map from operation kind to handler
#[derive(Default)]
pub struct OperationRegistry {
    handlers: HashMap<&'static str, Entry>,
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` under `O::KIND`; a previous handler for that kind is
    /// replaced
    pub fn register<O, H>(&mut self, handler: H) -> &mut Self
    where
        O: Operation,
        H: OperationHandler<O> + 'static,
    {
        let handler: Arc<dyn OperationHandler<O>> = Arc::new(handler);
        let entry = Entry {
            operation: type_name::<O>(),
            handler: Arc::new(handler),
        };

        match self.handlers.insert(O::KIND, entry) {
            Some(previous) => warn!(
                kind = O::KIND,
                previous = previous.operation,
                replacement = type_name::<O>(),
                "Replacing registered operation handler"
            ),
            None => debug!(kind = O::KIND, "Registered operation handler"),
        }
        self
    }

    /// Register an async closure as the handler for `O`
    pub fn register_fn<O, F, Fut>(&mut self, f: F) -> &mut Self
    where
        O: Operation,
        F: Fn(OperationDescriptor<O>, LedgerClient, ExecutionScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O::Output, SdkError>> + Send + 'static,
    {
        self.register::<O, _>(FnHandler::<O, F>::new(f))
    }

    /// Handler registered for `O::KIND`
    pub fn handler<O: Operation>(&self) -> Result<Arc<dyn OperationHandler<O>>, SdkError> {
        let entry = self
            .handlers
            .get(O::KIND)
            .ok_or_else(|| SdkError::HandlerMissing {
                kind: O::KIND.to_string(),
            })?;

        // Two operation types declaring the same KIND end up here
        entry
            .handler
            .downcast_ref::<Arc<dyn OperationHandler<O>>>()
            .cloned()
            .ok_or_else(|| SdkError::HandlerTypeMismatch {
                kind: O::KIND.to_string(),
            })
    }

    /// Handler for a descriptor's kind
    pub fn get<O: Operation>(
        &self,
        _descriptor: &OperationDescriptor<O>,
    ) -> Result<Arc<dyn OperationHandler<O>>, SdkError> {
        self.handler::<O>()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn install(&mut self, plugin: &dyn OperationPlugin) -> &mut Self {
        plugin.install(self);
        self
    }
}
