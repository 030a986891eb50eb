//! Program account scans
//!
//! [`ProgramAccountScanner`] collects server-side filters (ANDed), an
//! optional data slice and an optional client-side ordering, then runs one
//! `getProgramAccounts`-style scan. Matches can be piped into a
//! [`BatchedAccountReader`] through [`ProgramAccountScanner::get_multiple_accounts`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use solana_sdk::{account::Account, commitment_config::CommitmentConfig, pubkey::Pubkey};
use tracing::debug;

use super::filter::FilterValue;
use super::reader::BatchedAccountReader;
use crate::config::QueryConfig;
use crate::errors::SdkError;
use crate::rpc::{AccountRpc, DataSlice, ScanConfig, ScanFilter};

/// One scan match with its (possibly sliced) state
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedAccount {
    pub address: Pubkey,
    pub account: Account,
}

impl ScannedAccount {
    pub fn data(&self) -> &[u8] {
        &self.account.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Equals { offset: usize, value: FilterValue },
    Size(u64),
}

type Comparator = Arc<dyn Fn(&ScannedAccount, &ScannedAccount) -> Ordering + Send + Sync>;

/// Filtered scan over the accounts owned by one program
#[derive(Clone)]
pub struct ProgramAccountScanner {
    rpc: Arc<dyn AccountRpc>,
    program_id: Pubkey,
    predicates: Vec<Predicate>,
    data_slice: Option<DataSlice>,
    commitment: CommitmentConfig,
    comparator: Option<Comparator>,
    query_config: QueryConfig,
}

impl fmt::Debug for ProgramAccountScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramAccountScanner")
            .field("program_id", &self.program_id)
            .field("predicates", &self.predicates)
            .field("data_slice", &self.data_slice)
            .field("commitment", &self.commitment)
            .field("sorted", &self.comparator.is_some())
            .finish()
    }
}

impl ProgramAccountScanner {
    pub fn new(rpc: Arc<dyn AccountRpc>, program_id: Pubkey) -> Self {
        Self {
            rpc,
            program_id,
            predicates: Vec::new(),
            data_slice: None,
            commitment: CommitmentConfig::confirmed(),
            comparator: None,
            query_config: QueryConfig::default(),
        }
    }

    /// Settings for readers created by `get_multiple_accounts`
    pub fn with_query_config(mut self, config: QueryConfig) -> Self {
        self.query_config = config;
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Data at `offset` must equal `value`
    pub fn where_eq(mut self, offset: usize, value: impl Into<FilterValue>) -> Self {
        self.predicates.push(Predicate::Equals {
            offset,
            value: value.into(),
        });
        self
    }

    /// Data must be exactly `size` bytes
    pub fn where_size(mut self, size: u64) -> Self {
        self.predicates.push(Predicate::Size(size));
        self
    }

    /// Return only `length` bytes starting at `offset` of each match
    pub fn slice(mut self, offset: usize, length: usize) -> Self {
        self.data_slice = Some(DataSlice { offset, length });
        self
    }

    /// Return matches without data
    pub fn without_data(self) -> Self {
        self.slice(0, 0)
    }

    /// Order matches client-side; server-side filtering is unaffected
    pub fn sort_using<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&ScannedAccount, &ScannedAccount) -> Ordering + Send + Sync + 'static,
    {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    /// Wire filters in the order they were added
    pub fn filters(&self) -> Result<Vec<ScanFilter>, SdkError> {
        self.predicates
            .iter()
            .map(|predicate| match predicate {
                Predicate::Equals { offset, value } => Ok(ScanFilter::Memcmp {
                    offset: *offset,
                    bytes: value.to_bytes()?,
                }),
                Predicate::Size(size) => Ok(ScanFilter::DataSize(*size)),
            })
            .collect()
    }

    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            commitment: self.commitment,
            data_slice: self.data_slice,
        }
    }

    /// Run the scan
    ///
    /// Matches come back in server order, then sorted if a comparator is set.
    pub async fn get(&self) -> Result<Vec<ScannedAccount>, SdkError> {
        let filters = self.filters()?;
        let matches = self
            .rpc
            .scan_program_accounts(&self.program_id, &filters, self.scan_config())
            .await?;

        debug!(
            program = %self.program_id,
            filters = filters.len(),
            matches = matches.len(),
            "Program account scan complete"
        );

        let mut scanned: Vec<ScannedAccount> = matches
            .into_iter()
            .map(|(address, account)| ScannedAccount { address, account })
            .collect();

        if let Some(comparator) = &self.comparator {
            // stable: ties keep server order
            scanned.sort_by(|a, b| comparator(a, b));
        }
        Ok(scanned)
    }

    pub async fn get_and_map<U, F>(&self, f: F) -> Result<Vec<U>, SdkError>
    where
        F: Fn(ScannedAccount) -> U,
    {
        Ok(self.get().await?.into_iter().map(f).collect())
    }

    /// Addresses of all matches; data is not requested
    pub async fn get_public_keys(&self) -> Result<Vec<Pubkey>, SdkError> {
        let scanner = self.clone().without_data();
        scanner
            .get_and_map(|scanned| scanned.address)
            .await
    }

    /// Reader over the addresses stored in the first 32 bytes of each match
    pub async fn get_multiple_accounts(&self) -> Result<BatchedAccountReader, SdkError> {
        self.get_multiple_accounts_with(address_from_data).await
    }

    /// Reader over the addresses `selector` extracts from each match
    pub async fn get_multiple_accounts_with<F>(
        &self,
        selector: F,
    ) -> Result<BatchedAccountReader, SdkError>
    where
        F: Fn(&ScannedAccount) -> Result<Pubkey, SdkError>,
    {
        let addresses = self
            .get()
            .await?
            .iter()
            .map(selector)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(
            BatchedAccountReader::with_config(Arc::clone(&self.rpc), addresses, &self.query_config)
                .with_commitment(self.commitment),
        )
    }
}

/// Interpret the leading 32 bytes of a match as an address
pub fn address_from_data(scanned: &ScannedAccount) -> Result<Pubkey, SdkError> {
    scanned
        .data()
        .get(..32)
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .map(Pubkey::new_from_array)
        .ok_or_else(|| SdkError::InvalidAccountData {
            address: scanned.address,
            reason: format!(
                "expected at least 32 bytes to read an address, got {}",
                scanned.data().len()
            ),
        })
}
