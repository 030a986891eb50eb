//! Collaborators backed by the nonblocking Solana RPC client
//!
//! Both types share one `RpcClient`. Reads go through a `governor` rate
//! limiter when one is configured; every call is timed and counted.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use solana_account_decoder::{UiAccountEncoding, UiDataSliceConfig};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::{
    account::Account, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, signer::Signer,
};
use tracing::{debug, instrument, warn};

use super::{
    AccountRpc, ConfirmOptions, RpcManagerError, ScanConfig, ScanFilter, SendResponse,
    TransactionSender,
};
use crate::config::RpcConfig;
use crate::errors::SdkError;
use crate::metrics::{metrics, Timer};
use crate::tx_builder::{dedupe_signers, SendableTransaction, SignerRef, TransactionBuilderError};

/// Build the shared RPC client described by `config`
pub fn rpc_client_from_config(config: &RpcConfig) -> Result<Arc<RpcClient>, SdkError> {
    let commitment = config
        .commitment_config()
        .map_err(|err| SdkError::Configuration(err.to_string()))?;
    Ok(Arc::new(RpcClient::new_with_timeout_and_commitment(
        config.url.clone(),
        Duration::from_millis(config.timeout_ms),
        commitment,
    )))
}

fn build_limiter(rate_limit_rps: Option<u32>) -> Option<Arc<DefaultDirectRateLimiter>> {
    rate_limit_rps
        .and_then(NonZeroU32::new)
        .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))))
}

/// [`AccountRpc`] over a live RPC endpoint
pub struct SolanaRpc {
    client: Arc<RpcClient>,
    endpoint: String,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("endpoint", &self.endpoint)
            .field("rate_limited", &self.limiter.is_some())
            .finish_non_exhaustive()
    }
}

impl SolanaRpc {
    /// Wrap `client`; `rate_limit_rps` of `None` or `0` disables throttling
    pub fn new(client: Arc<RpcClient>, rate_limit_rps: Option<u32>) -> Self {
        Self {
            endpoint: client.url(),
            limiter: build_limiter(rate_limit_rps),
            client,
        }
    }

    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    fn classify(&self, err: solana_client::client_error::ClientError) -> RpcManagerError {
        RpcManagerError::from_client_error(err, &self.endpoint)
    }
}

/// Translate scan filters into their RPC wire form
pub fn to_rpc_filters(filters: &[ScanFilter]) -> Vec<RpcFilterType> {
    filters
        .iter()
        .map(|filter| match filter {
            ScanFilter::Memcmp { offset, bytes } => {
                RpcFilterType::Memcmp(Memcmp::new_base58_encoded(*offset, bytes))
            }
            ScanFilter::DataSize(size) => RpcFilterType::DataSize(*size),
        })
        .collect()
}

#[async_trait]
impl AccountRpc for SolanaRpc {
    #[instrument(skip(self, addresses), fields(endpoint = %self.endpoint, count = addresses.len()))]
    async fn read_accounts(
        &self,
        addresses: &[Pubkey],
        commitment: CommitmentConfig,
    ) -> Result<Vec<Option<Account>>, RpcManagerError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        self.throttle().await;
        let timer = Timer::start();
        let result = self
            .client
            .get_multiple_accounts_with_commitment(addresses, commitment)
            .await;
        timer.finish_rpc("getMultipleAccounts", result.is_ok());
        if let Some(m) = metrics() {
            m.rpc_accounts_requested.inc_by(addresses.len() as u64);
        }

        let accounts = result.map_err(|err| self.classify(err))?.value;
        if accounts.len() != addresses.len() {
            return Err(RpcManagerError::Internal(format!(
                "getMultipleAccounts returned {} results for {} addresses",
                accounts.len(),
                addresses.len()
            )));
        }

        debug!(
            found = accounts.iter().filter(|a| a.is_some()).count(),
            "Read accounts"
        );
        Ok(accounts)
    }

    #[instrument(skip(self, filters), fields(endpoint = %self.endpoint, filters = filters.len()))]
    async fn scan_program_accounts(
        &self,
        program_id: &Pubkey,
        filters: &[ScanFilter],
        config: ScanConfig,
    ) -> Result<Vec<(Pubkey, Account)>, RpcManagerError> {
        let rpc_filters = to_rpc_filters(filters);
        let rpc_config = RpcProgramAccountsConfig {
            filters: (!rpc_filters.is_empty()).then_some(rpc_filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(UiAccountEncoding::Base64),
                data_slice: config.data_slice.map(|slice| UiDataSliceConfig {
                    offset: slice.offset,
                    length: slice.length,
                }),
                commitment: Some(config.commitment),
                min_context_slot: None,
            },
            with_context: None,
            sort_results: None,
        };

        self.throttle().await;
        let timer = Timer::start();
        let result = self
            .client
            .get_program_accounts_with_config(program_id, rpc_config)
            .await;
        timer.finish_rpc("getProgramAccounts", result.is_ok());

        let matches = result.map_err(|err| self.classify(err))?;
        debug!(matches = matches.len(), "Scanned program accounts");
        Ok(matches)
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn latest_blockhash(
        &self,
        commitment: CommitmentConfig,
    ) -> Result<(Hash, u64), RpcManagerError> {
        self.throttle().await;
        let timer = Timer::start();
        let result = self
            .client
            .get_latest_blockhash_with_commitment(commitment)
            .await;
        timer.finish_rpc("getLatestBlockhash", result.is_ok());
        result.map_err(|err| self.classify(err))
    }
}

/// [`TransactionSender`] over a live RPC endpoint
///
/// Fills in a blockhash when the transaction has none, de-duplicates the
/// signer set, refuses to send with a required signer missing and partially
/// signs so pre-collected signatures survive.
pub struct RpcTransactionSender {
    client: Arc<RpcClient>,
    endpoint: String,
}

impl std::fmt::Debug for RpcTransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcTransactionSender")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RpcTransactionSender {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self {
            endpoint: client.url(),
            client,
        }
    }

    fn classify(&self, err: solana_client::client_error::ClientError) -> RpcManagerError {
        RpcManagerError::from_client_error(err, &self.endpoint)
    }
}

/// Sign every still-empty required slot that one of `signers` covers
///
/// Fails with the first required signer that is neither pre-signed nor
/// covered. Returns the number of signatures produced.
pub fn sign_required(
    sendable: &mut SendableTransaction,
    signers: &[SignerRef],
) -> Result<usize, TransactionBuilderError> {
    let transaction = &mut sendable.transaction;
    let signer_count = transaction.message.header.num_required_signatures as usize;
    let required: Vec<Pubkey> = transaction
        .message
        .account_keys
        .iter()
        .take(signer_count)
        .copied()
        .collect();

    let presigned: HashSet<Pubkey> = required
        .iter()
        .zip(transaction.signatures.iter())
        .filter(|(_, signature)| **signature != Signature::default())
        .map(|(key, _)| *key)
        .collect();

    let to_sign: Vec<SignerRef> = dedupe_signers(signers)
        .into_iter()
        .filter(|signer| {
            let key = signer.pubkey();
            required.contains(&key) && !presigned.contains(&key)
        })
        .collect();

    let covered: HashSet<Pubkey> = to_sign.iter().map(|signer| signer.pubkey()).collect();
    if let Some(pubkey) = required
        .iter()
        .find(|key| !presigned.contains(key) && !covered.contains(key))
    {
        return Err(TransactionBuilderError::MissingSigner { pubkey: *pubkey });
    }

    let refs: Vec<&dyn Signer> = to_sign
        .iter()
        .map(|signer| signer.as_ref() as &dyn Signer)
        .collect();
    let blockhash = transaction.message.recent_blockhash;
    transaction
        .try_partial_sign(&refs, blockhash)
        .map_err(|err| TransactionBuilderError::signing_failed(err.to_string()))?;

    Ok(refs.len())
}

#[async_trait]
impl TransactionSender for RpcTransactionSender {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn send_and_confirm(
        &self,
        mut transaction: SendableTransaction,
        signers: Vec<SignerRef>,
        options: Option<ConfirmOptions>,
    ) -> Result<SendResponse, SdkError> {
        let options = options.unwrap_or_default();
        let commitment = options.commitment.unwrap_or_else(|| self.client.commitment());

        if !transaction.has_blockhash() {
            let timer = Timer::start();
            let result = self
                .client
                .get_latest_blockhash_with_commitment(commitment)
                .await;
            timer.finish_rpc("getLatestBlockhash", result.is_ok());
            let (blockhash, last_valid_block_height) =
                result.map_err(|err| SdkError::Rpc(self.classify(err)))?;
            transaction.transaction.message.recent_blockhash = blockhash;
            transaction.last_valid_block_height = Some(last_valid_block_height);
        }

        let signed = sign_required(&mut transaction, &signers)?;
        debug!(signed, supplied = signers.len(), "Signed transaction");

        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(commitment.commitment),
            max_retries: options.max_retries,
            ..Default::default()
        };

        let timer = Timer::start();
        let result = self
            .client
            .send_and_confirm_transaction_with_spinner_and_config(
                &transaction.transaction,
                commitment,
                config,
            )
            .await;
        timer.finish_rpc("sendTransaction", result.is_ok());

        let signature = result.map_err(|err| {
            let err = self.classify(err);
            warn!(error = %err, "Transaction send failed");
            SdkError::SendFailure(err)
        })?;

        Ok(SendResponse {
            signature,
            last_valid_block_height: transaction.last_valid_block_height,
        })
    }
}
