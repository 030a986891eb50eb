//! Failure classification for ledger RPC traffic
//!
//! The Solana client reports most failures as free text. [`RpcManagerError`]
//! sorts them into the handful of cases callers act on differently: retry
//! later, refresh the blockhash, or give up.

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_rpc_client_api::request::RpcError;
use thiserror::Error;

/// Failures reported by the RPC and send collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcManagerError {
    /// Request never got a response (connection, DNS, TLS)
    #[error("{endpoint}: transport failure: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint}: no response within {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Server answered with a JSON-RPC error
    #[error("{endpoint}: rpc error {code:?}: {message}")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("{endpoint}: rate limited")]
    RateLimitExceeded { endpoint: String },

    #[error("{endpoint}: blockhash not found")]
    BlockhashNotFound { endpoint: String },

    /// Last valid block height passed before confirmation
    #[error("{endpoint}: transaction expired")]
    TransactionExpired { endpoint: String },

    #[error("{endpoint}: account {account} not found")]
    AccountNotFound { account: String, endpoint: String },

    #[error("{endpoint}: insufficient funds for fee or rent")]
    InsufficientFunds { endpoint: String },

    /// Request rejected before it reached the wire
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("rpc configuration: {0}")]
    Configuration(String),

    /// Response that breaks the RPC contract
    #[error("internal: {0}")]
    Internal(String),
}

/// Message fragments, checked in order; the first hit decides the kind
const PATTERNS: &[(Kind, &[&str])] = &[
    (Kind::Blockhash, &["blockhash not found"]),
    (Kind::Expired, &["transaction expired", "block height exceeded"]),
    (Kind::MissingAccount, &["account not found"]),
    (Kind::Funds, &["insufficient funds", "insufficient lamports"]),
    (Kind::RateLimit, &["rate limit", "too many requests", "429"]),
    (Kind::Timeout, &["timeout", "timed out"]),
    (
        Kind::Transport,
        &["connection refused", "error sending request", "dns error"],
    ),
];

#[derive(Clone, Copy)]
enum Kind {
    Blockhash,
    Expired,
    MissingAccount,
    Funds,
    RateLimit,
    Timeout,
    Transport,
}

impl RpcManagerError {
    /// Whether the same request may succeed if sent again
    ///
    /// Nothing in this crate retries; the classification is for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. }
            | Self::Timeout { .. }
            | Self::RateLimitExceeded { .. }
            | Self::BlockhashNotFound { .. } => true,
            // 5xx-style server codes
            Self::RpcResponse { code, .. } => code.is_some_and(|c| (500..600).contains(&c)),
            _ => false,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::RpcResponse { endpoint, .. }
            | Self::RateLimitExceeded { endpoint }
            | Self::BlockhashNotFound { endpoint }
            | Self::TransactionExpired { endpoint }
            | Self::AccountNotFound { endpoint, .. }
            | Self::InsufficientFunds { endpoint } => Some(endpoint),
            Self::Validation(_) | Self::Configuration(_) | Self::Internal(_) => None,
        }
    }

    /// Classify a client error raised while talking to `endpoint`
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        if let ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, .. }) =
            err.kind()
        {
            return match Self::classify(message, endpoint) {
                Self::RpcResponse {
                    endpoint, message, ..
                } => Self::RpcResponse {
                    endpoint,
                    message,
                    code: Some(*code),
                },
                known => known,
            };
        }
        Self::classify(&err.to_string(), endpoint)
    }

    /// Classify a raw error message reported by `endpoint`
    pub fn classify(message: &str, endpoint: &str) -> Self {
        let lowered = message.to_lowercase();
        let endpoint = endpoint.to_string();

        let kind = PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|needle| lowered.contains(needle)))
            .map(|(kind, _)| *kind);

        match kind {
            Some(Kind::Blockhash) => Self::BlockhashNotFound { endpoint },
            Some(Kind::Expired) => Self::TransactionExpired { endpoint },
            Some(Kind::MissingAccount) => Self::AccountNotFound {
                account: "unknown".to_string(),
                endpoint,
            },
            Some(Kind::Funds) => Self::InsufficientFunds { endpoint },
            Some(Kind::RateLimit) => Self::RateLimitExceeded { endpoint },
            Some(Kind::Timeout) => Self::Timeout {
                endpoint,
                timeout_ms: 0,
            },
            Some(Kind::Transport) => Self::Transport {
                endpoint,
                message: message.to_string(),
            },
            None => Self::RpcResponse {
                endpoint,
                message: message.to_string(),
                code: embedded_code(&lowered),
            },
        }
    }
}

/// `... code: 503 ...` as found in flattened client error text
fn embedded_code(lowered: &str) -> Option<i64> {
    let (_, rest) = lowered.split_once("code:")?;
    rest.split_whitespace()
        .next()?
        .trim_end_matches(',')
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_rpc_client_api::request::RpcResponseErrorData;

    const EP: &str = "http://localhost:8899";

    #[test]
    fn test_retryable_kinds() {
        let retryable = [
            RpcManagerError::classify("connection refused", EP),
            RpcManagerError::classify("request timed out", EP),
            RpcManagerError::classify("429 Too Many Requests", EP),
            RpcManagerError::classify("Blockhash not found", EP),
            RpcManagerError::classify("code: 503 node is behind", EP),
        ];
        assert!(retryable.iter().all(RpcManagerError::is_retryable));

        let terminal = [
            RpcManagerError::classify("Transaction expired: block height exceeded", EP),
            RpcManagerError::classify("insufficient lamports 10, need 20", EP),
            RpcManagerError::classify("code: -32602 invalid params", EP),
            RpcManagerError::Validation("empty filter".into()),
            RpcManagerError::Internal("length mismatch".into()),
        ];
        assert!(terminal.iter().all(|err| !err.is_retryable()));
    }

    #[test]
    fn test_endpoint_only_for_wire_errors() {
        assert_eq!(
            RpcManagerError::classify("dns error", EP).endpoint(),
            Some(EP)
        );
        assert_eq!(RpcManagerError::Validation("x".into()).endpoint(), None);
    }

    #[test]
    fn test_unknown_text_keeps_embedded_code() {
        match RpcManagerError::classify("RPC response error code: 503, node is behind", EP) {
            RpcManagerError::RpcResponse { code, message, .. } => {
                assert_eq!(code, Some(503));
                assert!(message.contains("node is behind"));
            }
            other => panic!("expected RpcResponse, got {:?}", other),
        }
        assert!(matches!(
            RpcManagerError::classify("something odd", EP),
            RpcManagerError::RpcResponse { code: None, .. }
        ));
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        // mentions both a missing blockhash and a timeout
        assert!(matches!(
            RpcManagerError::classify("blockhash not found after timeout", EP),
            RpcManagerError::BlockhashNotFound { .. }
        ));
    }

    #[test]
    fn test_structured_response_keeps_code() {
        let err = ClientError::from(RpcError::RpcResponseError {
            code: -32005,
            message: "Node is unhealthy".to_string(),
            data: RpcResponseErrorData::Empty,
        });
        assert_eq!(
            RpcManagerError::from_client_error(err, "ep"),
            RpcManagerError::RpcResponse {
                endpoint: "ep".to_string(),
                message: "Node is unhealthy".to_string(),
                code: Some(-32005),
            }
        );

        let err = ClientError::from(RpcError::RpcResponseError {
            code: -32002,
            message: "Transaction simulation failed: Blockhash not found".to_string(),
            data: RpcResponseErrorData::Empty,
        });
        assert!(matches!(
            RpcManagerError::from_client_error(err, "ep"),
            RpcManagerError::BlockhashNotFound { .. }
        ));
    }
}
