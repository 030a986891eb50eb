//! In-memory ledger backed by `parking_lot` locks.
//!
//! Implements both collaborator traits against a local account table so
//! query and execution code can run without a validator. Every call is
//! recorded and failures can be injected per address or per call type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, signer::Signer,
};

use super::client::sign_required;
use super::{
    AccountRpc, ConfirmOptions, RpcManagerError, ScanConfig, ScanFilter, SendResponse,
    TransactionSender,
};
use crate::errors::SdkError;
use crate::tx_builder::{SendableTransaction, SignerRef};

const ENDPOINT: &str = "memory";

/// Arguments of one recorded `scan_program_accounts` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCall {
    pub program_id: Pubkey,
    pub filters: Vec<ScanFilter>,
    pub config: ScanConfig,
}

/// One transaction accepted by the in-memory sender
#[derive(Debug, Clone)]
pub struct RecordedSend {
    /// Fully signed transaction as it would have gone on the wire
    pub transaction: SendableTransaction,
    /// Public keys of the signer set handed over, duplicates included
    pub signer_pubkeys: Vec<Pubkey>,
    pub options: Option<ConfirmOptions>,
}

#[derive(Debug, Default)]
struct Failures {
    read_addresses: Vec<Pubkey>,
    scans: Option<RpcManagerError>,
    sends: Option<RpcManagerError>,
}

/// In-memory ledger for development and testing.
///
/// Accounts are kept in insertion order, which is also the order scans
/// return matches in.
pub struct InMemoryLedger {
    accounts: RwLock<Vec<(Pubkey, Account)>>,
    blockhash: RwLock<(Hash, u64)>,
    read_delay: RwLock<Option<Duration>>,
    failures: Mutex<Failures>,
    read_calls: Mutex<Vec<Vec<Pubkey>>>,
    scan_calls: Mutex<Vec<ScanCall>>,
    sends: Mutex<Vec<RecordedSend>>,
    blockhash_requests: AtomicU64,
}

impl InMemoryLedger {
    /// Creates an empty ledger with a fixed blockhash valid until height 1000.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Vec::new()),
            blockhash: RwLock::new((Hash::new_unique(), 1_000)),
            read_delay: RwLock::new(None),
            failures: Mutex::new(Failures::default()),
            read_calls: Mutex::new(Vec::new()),
            scan_calls: Mutex::new(Vec::new()),
            sends: Mutex::new(Vec::new()),
            blockhash_requests: AtomicU64::new(0),
        }
    }

    pub fn with_account(self, address: Pubkey, account: Account) -> Self {
        self.insert_account(address, account);
        self
    }

    /// Insert or replace; a replaced account keeps its position
    pub fn insert_account(&self, address: Pubkey, account: Account) {
        let mut accounts = self.accounts.write();
        match accounts.iter_mut().find(|(key, _)| *key == address) {
            Some(entry) => entry.1 = account,
            None => accounts.push((address, account)),
        }
    }

    /// Insert an account owned by `owner` holding `data`
    pub fn insert_program_account(&self, address: Pubkey, owner: Pubkey, data: Vec<u8>) {
        self.insert_account(
            address,
            Account {
                lamports: 1_000_000,
                data,
                owner,
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    pub fn remove_account(&self, address: &Pubkey) -> Option<Account> {
        let mut accounts = self.accounts.write();
        let position = accounts.iter().position(|(key, _)| key == address)?;
        Some(accounts.remove(position).1)
    }

    pub fn account(&self, address: &Pubkey) -> Option<Account> {
        self.accounts
            .read()
            .iter()
            .find(|(key, _)| key == address)
            .map(|(_, account)| account.clone())
    }

    pub fn set_blockhash(&self, blockhash: Hash, last_valid_block_height: u64) {
        *self.blockhash.write() = (blockhash, last_valid_block_height);
    }

    /// Delay every read and scan by `delay`
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.write() = delay;
    }

    /// Fail any read call whose address list contains `address`
    pub fn fail_reads_for(&self, address: Pubkey) {
        self.failures.lock().read_addresses.push(address);
    }

    pub fn fail_scans_with(&self, err: RpcManagerError) {
        self.failures.lock().scans = Some(err);
    }

    pub fn fail_sends_with(&self, err: RpcManagerError) {
        self.failures.lock().sends = Some(err);
    }

    pub fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    /// Address lists of every read call, in call order
    pub fn read_calls(&self) -> Vec<Vec<Pubkey>> {
        self.read_calls.lock().clone()
    }

    pub fn scan_calls(&self) -> Vec<ScanCall> {
        self.scan_calls.lock().clone()
    }

    pub fn sent_transactions(&self) -> Vec<RecordedSend> {
        self.sends.lock().clone()
    }

    pub fn blockhash_requests(&self) -> u64 {
        self.blockhash_requests.load(Ordering::Relaxed)
    }

    async fn simulate_latency(&self) {
        let delay = *self.read_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn current_blockhash(&self) -> (Hash, u64) {
        self.blockhash_requests.fetch_add(1, Ordering::Relaxed);
        *self.blockhash.read()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("accounts", &self.accounts.read().len())
            .field("read_calls", &self.read_calls.lock().len())
            .field("sends", &self.sends.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AccountRpc for InMemoryLedger {
    async fn read_accounts(
        &self,
        addresses: &[Pubkey],
        _commitment: CommitmentConfig,
    ) -> Result<Vec<Option<Account>>, RpcManagerError> {
        self.read_calls.lock().push(addresses.to_vec());
        self.simulate_latency().await;

        let failing = {
            let failures = self.failures.lock();
            addresses
                .iter()
                .find(|address| failures.read_addresses.contains(address))
                .copied()
        };
        if let Some(address) = failing {
            return Err(RpcManagerError::Transport {
                endpoint: ENDPOINT.to_string(),
                message: format!("injected read failure for {}", address),
            });
        }

        Ok(addresses.iter().map(|address| self.account(address)).collect())
    }

    async fn scan_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[ScanFilter],
        config: ScanConfig,
    ) -> Result<Vec<(Pubkey, Account)>, RpcManagerError> {
        self.scan_calls.lock().push(ScanCall {
            program_id: *program_id,
            filters: filters.to_vec(),
            config,
        });
        self.simulate_latency().await;

        if let Some(err) = self.failures.lock().scans.clone() {
            return Err(err);
        }

        let accounts = self.accounts.read();
        Ok(accounts
            .iter()
            .filter(|(_, account)| account.owner == *program_id)
            .filter(|(_, account)| filters.iter().all(|filter| filter.matches(&account.data)))
            .map(|(address, account)| {
                let mut account = account.clone();
                if let Some(slice) = config.data_slice {
                    account.data = slice.apply(&account.data);
                }
                (*address, account)
            })
            .collect())
    }

    async fn latest_blockhash(
        &self,
        _commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), RpcManagerError> {
        Ok(self.current_blockhash())
    }
}

#[async_trait]
impl TransactionSender for InMemoryLedger {
    async fn send_and_confirm(
        &self,
        mut transaction: SendableTransaction,
        signers: Vec<SignerRef>,
        options: Option<ConfirmOptions>,
    ) -> Result<SendResponse, SdkError> {
        if let Some(err) = self.failures.lock().sends.clone() {
            return Err(SdkError::SendFailure(err));
        }

        if !transaction.has_blockhash() {
            let (blockhash, height) = self.current_blockhash();
            transaction.transaction.message.recent_blockhash = blockhash;
            transaction.last_valid_block_height = Some(height);
        }

        sign_required(&mut transaction, &signers)?;

        let signature = transaction
            .transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_else(Signature::default);
        let last_valid_block_height = transaction.last_valid_block_height;

        self.sends.lock().push(RecordedSend {
            transaction,
            signer_pubkeys: signers.iter().map(|signer| signer.pubkey()).collect(),
            options,
        });

        Ok(SendResponse {
            signature,
            last_valid_block_height,
        })
    }
}
