//! Handler trait and closure adapter

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use super::descriptor::{Operation, OperationDescriptor};
use super::scope::ExecutionScope;
use crate::client::LedgerClient;
use crate::errors::SdkError;

/// Executes one operation kind
///
/// Handlers own their suspension points: they are expected to call
/// [`ExecutionScope::raise_if_cancelled`] after each awaited step. The client
/// never polls on their behalf.
#[async_trait]
pub trait OperationHandler<O: Operation>: Send + Sync {
    async fn handle(
        &self,
        descriptor: OperationDescriptor<O>,
        client: &LedgerClient,
        scope: ExecutionScope,
    ) -> Result<O::Output, SdkError>;
}

/// Adapts an async closure into an [`OperationHandler`]
///
/// The closure receives an owned clone of the client so the returned future
/// does not borrow from the call site.
pub struct FnHandler<O, F> {
    f: F,
    _operation: PhantomData<fn() -> O>,
}

impl<O, F> FnHandler<O, F> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _operation: PhantomData,
        }
    }
}

impl<O: Operation, F> fmt::Debug for FnHandler<O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("kind", &O::KIND).finish()
    }
}

#[async_trait]
impl<O, F, Fut> OperationHandler<O> for FnHandler<O, F>
where
    O: Operation,
    F: Fn(OperationDescriptor<O>, LedgerClient, ExecutionScope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O::Output, SdkError>> + Send,
{
    async fn handle(
        &self,
        descriptor: OperationDescriptor<O>,
        client: &LedgerClient,
        scope: ExecutionScope,
    ) -> Result<O::Output, SdkError> {
        (self.f)(descriptor, client.clone(), scope).await
    }
}
