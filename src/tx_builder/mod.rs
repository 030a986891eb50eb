//! Transaction composition
//!
//! The builder accumulates instruction records in execution order and turns
//! them into a wire transaction for the send collaborator.
//!
//! ## Modules
//! - **errors**: materialisation and signer errors
//! - **record**: one instruction plus its signers and label
//! - **context**: blockhash, expiry and pre-signatures
//! - **builder**: the composer itself, including label-addressed splitting
//! - **instructions**: send-time signer bookkeeping
//! - **output**: materialised transactions and send results
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use ledger_sdk::tx_builder::{InstructionRecord, TransactionBuilder};
//!
//! let (setup, rest) = TransactionBuilder::new()
//!     .set_fee_payer(payer)
//!     .add(InstructionRecord::new(create_ix).with_signer(mint.clone()).with_label("create"))
//!     .add(InstructionRecord::new(init_ix).with_label("init"))
//!     .add(mint_to_ix)
//!     .split_after_label("init");
//!
//! let output = setup.with_context(mint.pubkey()).send_and_confirm(&sender, None).await?;
//! ```

pub mod errors;
pub use errors::TransactionBuilderError;

mod builder;
mod context;
pub mod instructions;
mod output;
mod record;

pub use builder::{BuilderItem, TransactionBuilder};
pub use context::TransactionOptions;
pub use instructions::{check_signers, dedupe_signers, missing_signers, required_signers};
pub use output::{SendAndConfirmOutput, SendResponse, SendableTransaction};
pub use record::{signer_ref, InstructionRecord, SignerRef};
