//! Transaction options carried by a builder
//!
//! The blockhash and expiry height a transaction is built against, plus
//! signatures collected ahead of time (for example from a co-signer that
//! signed the same message elsewhere).

use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};

/// Blockhash, expiry and pre-collected signatures for one transaction
///
/// All fields are optional. The send collaborator fills in a fresh blockhash
/// when none is set; pre-signatures are only meaningful together with the
/// blockhash they were produced against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Recent blockhash the message is built against
    pub recent_blockhash: Option<Hash>,

    /// Last block height at which the blockhash is still valid
    pub last_valid_block_height: Option<u64>,

    /// Signatures already produced by other parties, keyed by signer
    pub pre_signatures: Vec<(Pubkey, Signature)>,
}

impl TransactionOptions {
    pub fn with_blockhash(mut self, blockhash: Hash, last_valid_block_height: u64) -> Self {
        self.recent_blockhash = Some(blockhash);
        self.last_valid_block_height = Some(last_valid_block_height);
        self
    }

    pub fn with_pre_signature(mut self, signer: Pubkey, signature: Signature) -> Self {
        self.pre_signatures.push((signer, signature));
        self
    }

    /// True when a blockhash is present
    pub fn has_blockhash(&self) -> bool {
        self.recent_blockhash.is_some()
    }
}
