//! Error types for transaction composition
//!
//! Builder composition itself never fails; these errors come from turning a
//! builder into a wire transaction and from send-time signer checks.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Errors raised while materialising or signing a composed transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionBuilderError {
    /// No fee payer was set and none could be defaulted
    #[error("Transaction has no fee payer")]
    MissingFeePayer,

    /// No recent blockhash in the transaction options
    ///
    /// The send collaborator normally fills this in; it is only an error
    /// for callers signing a materialised transaction themselves.
    #[error("Transaction has no recent blockhash")]
    MissingBlockhash,

    /// An account marked as signer has no matching signer
    #[error("Missing signer for account {pubkey}")]
    MissingSigner {
        /// The account that must sign
        pubkey: Pubkey,
    },

    /// A pre-signature was supplied for a key that is not a signer
    #[error("Pre-signature supplied for non-signer account {pubkey}")]
    UnexpectedPreSignature { pubkey: Pubkey },

    /// The builder holds no instructions
    #[error("Transaction has no instructions")]
    Empty,

    /// Failed to sign the transaction
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl TransactionBuilderError {
    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingFeePayer => "fee_payer",
            Self::MissingBlockhash => "blockhash",
            Self::MissingSigner { .. } => "signer",
            Self::UnexpectedPreSignature { .. } => "signer",
            Self::Empty => "validation",
            Self::Signing(_) => "signing",
        }
    }

    /// Create a signing failure
    pub fn signing_failed(reason: impl Into<String>) -> Self {
        Self::Signing(reason.into())
    }
}
