//! Cooperative cancellation scope for one asynchronous call tree
//!
//! A scope wraps an [`AbortSignal`] and remembers every listener it attached
//! through [`CancellationScope::on_cancel`]. Closing the scope detaches those
//! listeners; [`CancellationScope::run`] closes it on every exit path,
//! including when the future it drives is dropped mid-await.
//!
//! Nothing here preempts running code. Work observes cancellation only where
//! it calls [`CancellationScope::raise_if_cancelled`] (or awaits
//! [`CancellationScope::cancelled`]).

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::signal::{AbortReason, AbortSignal, ListenerId};
use crate::errors::SdkError;

#[derive(Debug, Default)]
struct ScopeState {
    closed: bool,
    listeners: Vec<ListenerId>,
}

/// Cancellation surface threaded through an execution
#[derive(Debug, Clone)]
pub struct CancellationScope {
    signal: AbortSignal,
    state: Arc<Mutex<ScopeState>>,
}

impl CancellationScope {
    pub fn new(signal: AbortSignal) -> Self {
        Self {
            signal,
            state: Arc::new(Mutex::new(ScopeState::default())),
        }
    }

    /// Scope over a signal that never fires
    pub fn detached() -> Self {
        Self::new(AbortSignal::never())
    }

    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_aborted()
    }

    /// The captured reason; the same `Arc` on every read
    pub fn cancellation_error(&self) -> Option<Arc<AbortReason>> {
        self.signal.reason()
    }

    /// No-op while pending, `SdkError::Cancelled` once the signal fired
    pub fn raise_if_cancelled(&self) -> Result<(), SdkError> {
        match self.signal.reason() {
            Some(reason) => Err(SdkError::Cancelled { reason }),
            None => Ok(()),
        }
    }

    /// Register a listener run once if the signal fires while the scope is
    /// open. Returns false (and drops the listener) if the scope is closed.
    pub fn on_cancel<F>(&self, listener: F) -> bool
    where
        F: FnOnce(&Arc<AbortReason>) + Send + 'static,
    {
        if self.state.lock().closed {
            return false;
        }

        // The listener may run inline if the signal already fired, so the
        // state lock must not be held across registration.
        let id = self.signal.add_listener(listener);

        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            self.signal.remove_listener(id);
            return false;
        }
        state.listeners.push(id);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Detach every listener this scope registered. Idempotent.
    pub fn close(&self) {
        let listeners = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.listeners)
        };

        let detached = listeners
            .into_iter()
            .filter(|id| self.signal.remove_listener(*id))
            .count();
        trace!(detached, "Cancellation scope closed");
    }

    /// Run `callback` under this scope and close the scope on the way out,
    /// whether the callback returns, fails, or its future is dropped.
    pub async fn run<F, Fut, T>(&self, callback: F) -> T
    where
        F: FnOnce(CancellationScope) -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = scopeguard::guard(self.clone(), |scope| scope.close());
        callback(self.clone()).await
    }

    /// Resolves once the underlying signal fires
    pub async fn cancelled(&self) {
        self.signal.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::AbortController;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_raise_if_cancelled_before_fire_is_ok() {
        let controller = AbortController::new();
        let scope = CancellationScope::new(controller.signal());

        assert!(!scope.is_cancelled());
        assert!(scope.cancellation_error().is_none());
        assert!(scope.raise_if_cancelled().is_ok());
        assert!(scope.raise_if_cancelled().is_ok());
    }

    #[test]
    fn test_raise_if_cancelled_returns_same_reason() {
        let controller = AbortController::new();
        let scope = CancellationScope::new(controller.signal());
        controller.abort("gave up");

        let first = match scope.raise_if_cancelled() {
            Err(SdkError::Cancelled { reason }) => reason,
            other => panic!("expected Cancelled, got {:?}", other),
        };
        let second = match scope.raise_if_cancelled() {
            Err(SdkError::Cancelled { reason }) => reason,
            other => panic!("expected Cancelled, got {:?}", other),
        };

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &scope.cancellation_error().unwrap()));
    }

    #[tokio::test]
    async fn test_run_detaches_listeners_on_success() {
        let controller = AbortController::new();
        let scope = CancellationScope::new(controller.signal());
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        let value = scope
            .run(|s| async move {
                s.on_cancel(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                });
                assert_eq!(s.signal().listener_count(), 1);
                7
            })
            .await;

        assert_eq!(value, 7);
        assert!(scope.is_closed());
        assert_eq!(controller.signal().listener_count(), 0);

        controller.abort("late");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_detaches_listeners_on_error() {
        let controller = AbortController::new();
        let scope = CancellationScope::new(controller.signal());

        let result: Result<(), SdkError> = scope
            .run(|s| async move {
                s.on_cancel(|_| {});
                Err(SdkError::Configuration("boom".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(controller.signal().listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_detaches_when_future_dropped() {
        let controller = AbortController::new();
        let scope = CancellationScope::new(controller.signal());

        let fut = scope.run(|s| async move {
            s.on_cancel(|_| {});
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), fut).await;

        assert!(timed_out.is_err());
        assert!(scope.is_closed());
        assert_eq!(controller.signal().listener_count(), 0);
    }

    #[test]
    fn test_on_cancel_after_close_is_rejected() {
        let controller = AbortController::new();
        let scope = CancellationScope::new(controller.signal());
        scope.close();

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let attached = scope.on_cancel(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!attached);
        controller.abort("after close");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_on_cancel_fires_while_open() {
        let controller = AbortController::new();
        let scope = CancellationScope::new(controller.signal());
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        assert!(scope.on_cancel(move |reason| {
            assert_eq!(reason.message(), "now");
            h.fetch_add(1, Ordering::SeqCst);
        }));

        controller.abort("now");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_scope_never_cancels() {
        let scope = CancellationScope::detached();
        assert!(!scope.is_cancelled());
        assert!(scope.raise_if_cancelled().is_ok());
    }
}
