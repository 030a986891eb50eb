//! Background executions and their status

use std::fmt;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::descriptor::Operation;
use crate::cancellation::{AbortController, AbortReason};
use crate::errors::SdkError;

/// Lifecycle of one execution
///
/// `Pending -> Running -> {Successful | Failed | Cancelled}`; terminal states
/// are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Successful,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed | Self::Cancelled)
    }

    pub fn from_result<T>(result: &Result<T, SdkError>) -> Self {
        match result {
            Ok(_) => Self::Successful,
            Err(err) if err.is_cancelled() => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an execution running on the tokio runtime
pub struct OperationTask<O: Operation> {
    controller: AbortController,
    status: watch::Receiver<ExecutionStatus>,
    handle: JoinHandle<Result<O::Output, SdkError>>,
}

impl<O: Operation> OperationTask<O> {
    pub(crate) fn new(
        controller: AbortController,
        status: watch::Receiver<ExecutionStatus>,
        handle: JoinHandle<Result<O::Output, SdkError>>,
    ) -> Self {
        Self {
            controller,
            status,
            handle,
        }
    }

    pub fn kind(&self) -> &'static str {
        O::KIND
    }

    /// Abort this execution. Returns false if it was already aborted.
    pub fn cancel(&self, reason: impl Into<AbortReason>) -> bool {
        self.controller.abort(reason)
    }

    pub fn status(&self) -> ExecutionStatus {
        *self.status.borrow()
    }

    /// Receiver that observes every later transition
    pub fn status_changes(&self) -> watch::Receiver<ExecutionStatus> {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the execution's result
    pub async fn join(self) -> Result<O::Output, SdkError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(SdkError::Handler(anyhow::anyhow!(
                "{} task did not complete: {}",
                O::KIND,
                err
            ))),
        }
    }
}

impl<O: Operation> fmt::Debug for OperationTask<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTask")
            .field("kind", &O::KIND)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_terminal_states() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Successful.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_from_result() {
        let ok: Result<(), SdkError> = Ok(());
        let failed: Result<(), SdkError> = Err(SdkError::Configuration("bad".into()));
        let cancelled: Result<(), SdkError> = Err(SdkError::Cancelled {
            reason: Arc::new(AbortReason::new("stop")),
        });

        assert_eq!(ExecutionStatus::from_result(&ok), ExecutionStatus::Successful);
        assert_eq!(ExecutionStatus::from_result(&failed), ExecutionStatus::Failed);
        assert_eq!(ExecutionStatus::from_result(&cancelled), ExecutionStatus::Cancelled);
        assert_eq!(ExecutionStatus::Cancelled.to_string(), "cancelled");
    }
}
