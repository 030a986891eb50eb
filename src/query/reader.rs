//! Batched account reads
//!
//! A [`BatchedAccountReader`] splits its address list into chunks no larger
//! than the per-call limit, reads the chunks with bounded parallelism and
//! reassembles the results in input order. [`LazyAccountQuery`] is the
//! deferred form: nothing is read until it is run, and every run reads again.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use solana_sdk::{account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey};
use tracing::debug;

use crate::config::{QueryConfig, MAX_ACCOUNTS_PER_REQUEST};
use crate::errors::SdkError;
use crate::rpc::{AccountRpc, RpcManagerError};

/// One address and its state, `None` when the account does not exist
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAccount {
    pub address: Pubkey,
    pub account: Option<Account>,
}

impl FetchedAccount {
    pub fn exists(&self) -> bool {
        self.account.is_some()
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.account.as_ref().map(|account| account.data.as_slice())
    }
}

/// Chunked, order-preserving reader over a fixed address list
#[derive(Clone)]
pub struct BatchedAccountReader {
    rpc: Arc<dyn AccountRpc>,
    addresses: Vec<Pubkey>,
    commitment: CommitmentConfig,
    max_chunk_size: usize,
    parallelism: usize,
}

impl fmt::Debug for BatchedAccountReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchedAccountReader")
            .field("addresses", &self.addresses.len())
            .field("commitment", &self.commitment)
            .field("max_chunk_size", &self.max_chunk_size)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

impl BatchedAccountReader {
    pub fn new(rpc: Arc<dyn AccountRpc>, addresses: Vec<Pubkey>) -> Self {
        Self::with_config(rpc, addresses, &QueryConfig::default())
    }

    pub fn with_config(
        rpc: Arc<dyn AccountRpc>,
        addresses: Vec<Pubkey>,
        config: &QueryConfig,
    ) -> Self {
        Self {
            rpc,
            addresses,
            commitment: CommitmentConfig::confirmed(),
            max_chunk_size: config.max_accounts_per_request.clamp(1, MAX_ACCOUNTS_PER_REQUEST),
            parallelism: config.max_parallel_requests.max(1),
        }
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    /// Addresses per read call, clamped to `1..=100`
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size.clamp(1, MAX_ACCOUNTS_PER_REQUEST);
        self
    }

    /// Chunk reads in flight at once, at least 1
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn addresses(&self) -> &[Pubkey] {
        &self.addresses
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    /// The exact partition `get` will issue, in order
    pub fn chunks(&self) -> std::slice::Chunks<'_, Pubkey> {
        self.addresses.chunks(self.max_chunk_size)
    }

    /// Read every address; `result[i]` belongs to `addresses()[i]`
    ///
    /// Any failed chunk fails the whole call.
    pub async fn get(&self) -> Result<Vec<FetchedAccount>, SdkError> {
        if self.addresses.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            addresses = self.addresses.len(),
            chunk_size = self.max_chunk_size,
            parallelism = self.parallelism,
            "Reading accounts in chunks"
        );

        let commitment = self.commitment;
        // each read owns its slice so the returned future stays `Send`
        let owned: Vec<Vec<Pubkey>> = self.chunks().map(<[Pubkey]>::to_vec).collect();
        let reads = owned.into_iter().enumerate().map(|(chunk_index, chunk)| {
            let rpc = Arc::clone(&self.rpc);
            async move {
                let accounts = rpc
                    .read_accounts(&chunk, commitment)
                    .await
                    .map_err(|source| SdkError::ChunkedReadFailure {
                        chunk_index,
                        chunk_len: chunk.len(),
                        source,
                    })?;

                if accounts.len() != chunk.len() {
                    return Err(SdkError::ChunkedReadFailure {
                        chunk_index,
                        chunk_len: chunk.len(),
                        source: RpcManagerError::Internal(format!(
                            "expected {} results, got {}",
                            chunk.len(),
                            accounts.len()
                        )),
                    });
                }
                Ok::<_, SdkError>(accounts)
            }
        });

        // `buffered` yields in submission order whatever the completion order
        let chunks: Vec<Vec<Option<Account>>> = stream::iter(reads)
            .buffered(self.parallelism)
            .try_collect()
            .await?;

        Ok(self
            .addresses
            .iter()
            .zip(chunks.into_iter().flatten())
            .map(|(address, account)| FetchedAccount {
                address: *address,
                account,
            })
            .collect())
    }

    /// Read a single-address reader
    pub async fn get_one(&self) -> Result<FetchedAccount, SdkError> {
        if self.addresses.len() != 1 {
            return Err(SdkError::Configuration(format!(
                "get_one needs exactly one address, reader holds {}",
                self.addresses.len()
            )));
        }
        let mut fetched = self.get().await?;
        fetched
            .pop()
            .ok_or_else(|| SdkError::Configuration("read returned no result".to_string()))
    }

    /// Deferred, re-runnable form of [`get`](Self::get)
    pub fn lazy(&self) -> LazyAccountQuery<FetchedAccount> {
        LazyAccountQuery {
            reader: self.clone(),
            transform: Arc::new(|fetched: FetchedAccount| fetched),
        }
    }

    /// Deferred read with `f` applied to every result
    pub fn map<U, F>(&self, f: F) -> LazyAccountQuery<U>
    where
        F: Fn(FetchedAccount) -> U + Send + Sync + 'static,
    {
        LazyAccountQuery {
            reader: self.clone(),
            transform: Arc::new(f),
        }
    }
}

/// Deferred account read
///
/// Not a cache: every [`run`](Self::run) re-issues the reads.
pub struct LazyAccountQuery<T> {
    reader: BatchedAccountReader,
    transform: Arc<dyn Fn(FetchedAccount) -> T + Send + Sync>,
}

impl<T> Clone for LazyAccountQuery<T> {
    fn clone(&self) -> Self {
        Self {
            reader: self.reader.clone(),
            transform: Arc::clone(&self.transform),
        }
    }
}

impl<T> fmt::Debug for LazyAccountQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyAccountQuery")
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> LazyAccountQuery<T> {
    pub async fn run(&self) -> Result<Vec<T>, SdkError> {
        let fetched = self.reader.get().await?;
        Ok(fetched.into_iter().map(|item| (self.transform)(item)).collect())
    }

    /// Compose another per-result transformation
    pub fn map<U, F>(&self, f: F) -> LazyAccountQuery<U>
    where
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.transform);
        LazyAccountQuery {
            reader: self.reader.clone(),
            transform: Arc::new(move |fetched| f(inner(fetched))),
        }
    }

    pub fn reader(&self) -> &BatchedAccountReader {
        &self.reader
    }
}

impl<T, E> LazyAccountQuery<Result<T, E>>
where
    T: 'static,
    E: Into<SdkError> + 'static,
{
    /// Run and fail on the first result the transformation rejected
    pub async fn try_run(&self) -> Result<Vec<T>, SdkError> {
        self.run()
            .await?
            .into_iter()
            .map(|item| item.map_err(Into::into))
            .collect()
    }
}
