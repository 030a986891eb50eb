//! Abort signal shared between a caller and the work it started
//!
//! An [`AbortController`] owns the right to fire; every clone of its
//! [`AbortSignal`] observes the same state. Firing captures a single
//! [`AbortReason`] behind an `Arc`, so every reader sees the same object and
//! callers can compare by identity with [`Arc::ptr_eq`].
//!
//! Listeners are kept in a small table keyed by [`ListenerId`] so a scope can
//! detach exactly the listeners it registered when it closes.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Reason captured when a signal fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortReason {
    message: String,
}

impl AbortReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for AbortReason {
    fn default() -> Self {
        Self::new("aborted")
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&str> for AbortReason {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AbortReason {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Handle returned by [`AbortSignal::add_listener`], used to detach it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnOnce(&Arc<AbortReason>) + Send>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
    reason: Option<Arc<AbortReason>>,
}

struct SignalInner {
    token: CancellationToken,
    table: Mutex<ListenerTable>,
}

impl SignalInner {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            table: Mutex::new(ListenerTable::default()),
        }
    }
}

/// Observer side of an abort controller
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<SignalInner>,
}

impl fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.inner.table.lock();
        f.debug_struct("AbortSignal")
            .field("aborted", &table.reason.is_some())
            .field("listeners", &table.entries.len())
            .finish()
    }
}

impl AbortSignal {
    fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner::new()),
        }
    }

    /// A signal nobody holds a controller for; it stays pending forever
    pub fn never() -> Self {
        Self::new()
    }

    /// True once the signal has fired
    pub fn is_aborted(&self) -> bool {
        self.inner.table.lock().reason.is_some()
    }

    /// The reason captured at fire time, `None` while pending
    pub fn reason(&self) -> Option<Arc<AbortReason>> {
        self.inner.table.lock().reason.clone()
    }

    /// Register a listener invoked once when the signal fires.
    ///
    /// If the signal already fired the listener runs immediately and the
    /// returned id refers to nothing.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: FnOnce(&Arc<AbortReason>) + Send + 'static,
    {
        let mut table = self.inner.table.lock();
        let id = ListenerId(table.next_id);
        table.next_id += 1;

        if let Some(reason) = table.reason.clone() {
            drop(table);
            listener(&reason);
            return id;
        }

        table.entries.push((id, Box::new(listener)));
        id
    }

    /// Detach a listener. Returns false if it already ran or was removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut table = self.inner.table.lock();
        let before = table.entries.len();
        table.entries.retain(|(entry_id, _)| *entry_id != id);
        table.entries.len() != before
    }

    /// Number of listeners still attached
    pub fn listener_count(&self) -> usize {
        self.inner.table.lock().entries.len()
    }

    /// Resolves once the signal fires
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// The underlying token, for code that already speaks `tokio_util`
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Derived signal that fires with the parent's reason when the parent
    /// fires, and can also be fired on its own through the returned controller.
    ///
    /// A child that fires first detaches its listener from the parent.
    pub fn child(&self) -> AbortController {
        let controller = AbortController::new();
        let child = controller.signal();
        let id = self.add_listener(move |reason| {
            child.fire(reason.clone());
        });

        // weak, so the parent table and the child table never form a cycle
        let parent: Weak<SignalInner> = Arc::downgrade(&self.inner);
        controller.signal.add_listener(move |_| {
            if let Some(inner) = parent.upgrade() {
                AbortSignal { inner }.remove_listener(id);
            }
        });
        controller
    }

    fn fire(&self, reason: Arc<AbortReason>) -> bool {
        let listeners = {
            let mut table = self.inner.table.lock();
            if table.reason.is_some() {
                return false;
            }
            table.reason = Some(reason.clone());
            std::mem::take(&mut table.entries)
        };

        self.inner.token.cancel();

        debug!(reason = %reason, listeners = listeners.len(), "Abort signal fired");
        for (_, listener) in listeners {
            listener(&reason);
        }
        true
    }
}

/// Owner side: the only way to fire a signal
#[derive(Debug, Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::new(),
        }
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Fire the signal. Only the first call has any effect; returns whether
    /// this call was the one that fired it.
    pub fn abort(&self, reason: impl Into<AbortReason>) -> bool {
        self.signal.fire(Arc::new(reason.into()))
    }

    /// Fire with an already captured reason, keeping its identity
    pub fn abort_with(&self, reason: Arc<AbortReason>) -> bool {
        self.signal.fire(reason)
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }

    /// Fire the signal after `delay` unless it fired earlier.
    ///
    /// Must be called from within a tokio runtime.
    pub fn abort_after(&self, delay: Duration, reason: impl Into<AbortReason>) -> JoinHandle<()> {
        let controller = self.clone();
        let reason = reason.into();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    controller.abort(reason);
                }
                _ = controller.signal.cancelled() => {}
            }
        })
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}
