//! Crate-level error taxonomy
//!
//! Every public async entry point returns [`SdkError`]. Cancellation is a
//! distinct variant so callers can tell an abandoned execution apart from a
//! failed one without inspecting messages.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::cancellation::AbortReason;
use crate::rpc::RpcManagerError;
use crate::tx_builder::TransactionBuilderError;

#[derive(Error, Debug)]
pub enum SdkError {
    /// The execution's abort signal fired
    ///
    /// `reason` is the exact `Arc` captured when the signal fired.
    #[error("Operation cancelled: {reason}")]
    Cancelled { reason: Arc<AbortReason> },

    /// No handler registered for the descriptor's kind
    #[error("No operation handler registered for kind {kind:?}")]
    HandlerMissing { kind: String },

    /// A handler is registered under the kind, but for another operation type
    #[error("Operation handler for kind {kind:?} expects a different operation type")]
    HandlerTypeMismatch { kind: String },

    /// One chunk of a batched account read failed; no partial results
    #[error("Account read failed for chunk {chunk_index} ({chunk_len} addresses): {source}")]
    ChunkedReadFailure {
        chunk_index: usize,
        chunk_len: usize,
        #[source]
        source: RpcManagerError,
    },

    /// RPC failure outside of batched reads (scans, blockhash lookups)
    #[error(transparent)]
    Rpc(#[from] RpcManagerError),

    /// Failure reported by the send collaborator, unchanged
    #[error("Send failed: {0}")]
    SendFailure(#[source] RpcManagerError),

    #[error(transparent)]
    Builder(#[from] TransactionBuilderError),

    /// Account data could not be interpreted as requested
    #[error("Invalid data for account {address}: {reason}")]
    InvalidAccountData { address: Pubkey, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure raised by a domain operation handler
    #[error("Handler error: {0}")]
    Handler(#[from] anyhow::Error),
}

impl SdkError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The captured abort reason, for cancelled executions
    pub fn cancellation_reason(&self) -> Option<&Arc<AbortReason>> {
        match self {
            Self::Cancelled { reason } => Some(reason),
            _ => None,
        }
    }

    /// Check if retrying the same call might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ChunkedReadFailure { source, .. } => source.is_retryable(),
            Self::Rpc(err) | Self::SendFailure(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::Cancelled { .. } => "cancelled",
            Self::HandlerMissing { .. } => "handler_missing",
            Self::HandlerTypeMismatch { .. } => "handler_type",
            Self::ChunkedReadFailure { .. } => "chunked_read",
            Self::Rpc(_) => "rpc",
            Self::SendFailure(_) => "send",
            Self::Builder(err) => err.category(),
            Self::InvalidAccountData { .. } => "account_data",
            Self::Configuration(_) => "config",
            Self::Handler(_) => "handler",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_distinguishable() {
        let reason = Arc::new(AbortReason::new("user navigated away"));
        let err = SdkError::Cancelled {
            reason: reason.clone(),
        };

        assert!(err.is_cancelled());
        assert!(Arc::ptr_eq(err.cancellation_reason().unwrap(), &reason));
        assert_eq!(err.category(), "cancelled");
        assert_eq!(err.to_string(), "Operation cancelled: user navigated away");

        let failed = SdkError::HandlerMissing {
            kind: "Ping".to_string(),
        };
        assert!(!failed.is_cancelled());
        assert!(failed.cancellation_reason().is_none());
    }

    #[test]
    fn test_retryability_follows_rpc_error() {
        let err = SdkError::ChunkedReadFailure {
            chunk_index: 2,
            chunk_len: 100,
            source: RpcManagerError::Timeout {
                endpoint: "ep".to_string(),
                timeout_ms: 1000,
            },
        };
        assert!(err.is_retryable());
        assert_eq!(err.category(), "chunked_read");

        let err = SdkError::SendFailure(RpcManagerError::InsufficientFunds {
            endpoint: "ep".to_string(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conversions() {
        let err: SdkError = TransactionBuilderError::MissingFeePayer.into();
        assert_eq!(err.category(), "fee_payer");

        let err: SdkError = anyhow::anyhow!("asset is frozen").into();
        assert_eq!(err.to_string(), "Handler error: asset is frozen");
    }
}
