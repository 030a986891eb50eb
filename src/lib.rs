//! Ledger SDK - operation execution and transaction composition engine
//!
//! This library binds typed operations to handlers, threads cooperative
//! cancellation through every execution, composes instructions into
//! transactions and turns account reads and program scans into chunked,
//! rate-limited RPC calls.

pub mod cancellation;
pub mod client;
pub mod config;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod observability;
pub mod operations;
pub mod query;
pub mod rpc;
pub mod tx_builder;

// Re-export commonly used types
pub use cancellation::{AbortController, AbortReason, AbortSignal, CancellationScope};
pub use client::{LedgerClient, LedgerClientBuilder};
pub use config::SdkConfig;
pub use errors::SdkError;
pub use operations::{
    ExecuteOptions, ExecutionScope, ExecutionStatus, Operation, OperationDescriptor,
    OperationHandler, OperationPlugin, OperationRegistry, OperationTask,
};
pub use query::{BatchedAccountReader, FilterValue, ProgramAccountScanner};
pub use rpc::{AccountRpc, InMemoryLedger, TransactionSender};
pub use tx_builder::{InstructionRecord, SignerRef, TransactionBuilder};

pub use solana_sdk::{pubkey::Pubkey, signature::Signature};
