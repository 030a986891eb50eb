//! RPC Module
//!
//! Boundary traits for the ledger-access and send collaborators, plus the
//! concrete implementations over the nonblocking Solana RPC client and an
//! in-memory ledger for tests and local simulation.

use async_trait::async_trait;
use solana_sdk::{account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey};

use crate::errors::SdkError;
use crate::tx_builder::{SendableTransaction, SignerRef};

// Submodules
pub mod client;
pub mod memory;
pub mod rpc_errors;

// Re-exports for convenience
pub use client::{RpcTransactionSender, SolanaRpc};
pub use memory::InMemoryLedger;
pub use rpc_errors::RpcManagerError;
pub use crate::tx_builder::SendResponse;

/// Wire-level program account filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    /// Account data at `offset` starts with `bytes`
    Memcmp { offset: usize, bytes: Vec<u8> },
    /// Account data is exactly this many bytes long
    DataSize(u64),
}

impl ScanFilter {
    /// Evaluate the filter against raw account data
    pub fn matches(&self, data: &[u8]) -> bool {
        match self {
            ScanFilter::Memcmp { offset, bytes } => data
                .get(*offset..offset.saturating_add(bytes.len()))
                .map(|window| window == bytes.as_slice())
                .unwrap_or(false),
            ScanFilter::DataSize(size) => data.len() as u64 == *size,
        }
    }
}

/// Byte range of account data returned by a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSlice {
    pub offset: usize,
    pub length: usize,
}

impl DataSlice {
    /// Cut `data` down to the slice, clamped to the available bytes
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        let start = self.offset.min(data.len());
        let end = self.offset.saturating_add(self.length).min(data.len());
        data[start..end].to_vec()
    }
}

/// Per-scan request options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    pub commitment: CommitmentConfig,
    pub data_slice: Option<DataSlice>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            commitment: CommitmentConfig::confirmed(),
            data_slice: None,
        }
    }
}

/// Ledger read access
///
/// Implementations never retry and never return partial results: a call
/// either yields everything it was asked for or fails.
#[async_trait]
pub trait AccountRpc: Send + Sync {
    /// Read `addresses`, result positionally aligned with the input
    async fn read_accounts(
        &self,
        addresses: &[Pubkey],
        commitment: CommitmentConfig,
    ) -> Result<Vec<Option<Account>>, RpcManagerError>;

    /// Accounts owned by `program_id` matching every filter, in server order
    async fn scan_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[ScanFilter],
        config: ScanConfig,
    ) -> Result<Vec<(Pubkey, Account)>, RpcManagerError>;

    /// Recent blockhash and the last block height at which it is valid
    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), RpcManagerError>;
}

/// Confirmation settings handed to the send collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmOptions {
    /// Commitment to confirm at; the collaborator's default when `None`
    pub commitment: Option<CommitmentConfig>,
    pub skip_preflight: bool,
    pub max_retries: Option<usize>,
}

impl ConfirmOptions {
    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = Some(commitment);
        self
    }
}

/// Ledger send access
///
/// Receives the materialised transaction and the full accumulated signer
/// set, duplicates included.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    async fn send_and_confirm(
        &self,
        transaction: SendableTransaction,
        signers: Vec<SignerRef>,
        options: Option<ConfirmOptions>,
    ) -> Result<SendResponse, SdkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memcmp_filter() {
        let filter = ScanFilter::Memcmp {
            offset: 2,
            bytes: vec![7, 8],
        };
        assert!(filter.matches(&[0, 0, 7, 8, 9]));
        assert!(!filter.matches(&[0, 0, 7, 9]));
        assert!(!filter.matches(&[0, 0, 7]));
    }

    #[test]
    fn test_data_size_filter() {
        assert!(ScanFilter::DataSize(3).matches(&[1, 2, 3]));
        assert!(!ScanFilter::DataSize(3).matches(&[1, 2]));
    }

    #[test]
    fn test_data_slice_clamps() {
        let slice = DataSlice {
            offset: 2,
            length: 10,
        };
        assert_eq!(slice.apply(&[1, 2, 3, 4]), vec![3, 4]);
        assert!(slice.apply(&[1]).is_empty());

        let empty = DataSlice {
            offset: 0,
            length: 0,
        };
        assert!(empty.apply(&[1, 2, 3]).is_empty());
    }
}
