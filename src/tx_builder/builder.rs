//! Ordered instruction composer
//!
//! [`TransactionBuilder`] accumulates [`InstructionRecord`]s in execution
//! order together with a fee payer, transaction options and a typed context
//! value. Composition never fails and never reorders: appending another
//! builder splices its records in as one contiguous block.

use std::fmt;

use solana_sdk::{
    instruction::Instruction, message::Message, pubkey::Pubkey, signer::Signer,
    transaction::Transaction,
};

use super::context::TransactionOptions;
use super::errors::TransactionBuilderError;
use super::output::{SendAndConfirmOutput, SendableTransaction};
use super::record::{InstructionRecord, SignerRef};
use crate::errors::SdkError;
use crate::rpc::{ConfirmOptions, TransactionSender};

/// Something that can be appended to or prepended onto a builder
///
/// Either a single record or the flattened records of another builder.
#[derive(Debug, Clone)]
pub enum BuilderItem {
    Record(InstructionRecord),
    Records(Vec<InstructionRecord>),
}

impl BuilderItem {
    fn into_records(self) -> Vec<InstructionRecord> {
        match self {
            BuilderItem::Record(record) => vec![record],
            BuilderItem::Records(records) => records,
        }
    }
}

impl From<InstructionRecord> for BuilderItem {
    fn from(record: InstructionRecord) -> Self {
        BuilderItem::Record(record)
    }
}

impl From<Instruction> for BuilderItem {
    fn from(instruction: Instruction) -> Self {
        BuilderItem::Record(InstructionRecord::new(instruction))
    }
}

impl From<Vec<InstructionRecord>> for BuilderItem {
    fn from(records: Vec<InstructionRecord>) -> Self {
        BuilderItem::Records(records)
    }
}

impl<C> From<TransactionBuilder<C>> for BuilderItem {
    fn from(builder: TransactionBuilder<C>) -> Self {
        BuilderItem::Records(builder.records)
    }
}

impl<C> From<&TransactionBuilder<C>> for BuilderItem {
    fn from(builder: &TransactionBuilder<C>) -> Self {
        BuilderItem::Records(builder.records.clone())
    }
}

/// Ordered sequence of instruction records plus fee payer, options and context
///
/// Methods take `self` and hand it back so calls chain:
///
/// ```rust,ignore
/// let builder = TransactionBuilder::new()
///     .set_fee_payer(payer)
///     .add(InstructionRecord::new(create_ix).with_signer(mint).with_label("create"))
///     .append(vec![BuilderItem::from(init_ix), other_builder.into()])
///     .with_context(mint_pubkey);
/// ```
#[derive(Clone)]
pub struct TransactionBuilder<C = ()> {
    records: Vec<InstructionRecord>,
    fee_payer: Option<SignerRef>,
    options: TransactionOptions,
    context: C,
}

impl TransactionBuilder<()> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Default> Default for TransactionBuilder<C> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            fee_payer: None,
            options: TransactionOptions::default(),
            context: C::default(),
        }
    }
}

impl<C> TransactionBuilder<C> {
    /// Append items at the end, in the order given
    pub fn append<I>(mut self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<BuilderItem>,
    {
        for item in items {
            self.records.extend(item.into().into_records());
        }
        self
    }

    /// Insert items at the front; the items keep their relative order
    pub fn prepend<I>(mut self, items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<BuilderItem>,
    {
        let mut front: Vec<InstructionRecord> = items
            .into_iter()
            .flat_map(|item| item.into().into_records())
            .collect();
        if front.is_empty() {
            return self;
        }
        front.append(&mut self.records);
        self.records = front;
        self
    }

    /// Append a single record, instruction or builder
    pub fn add(self, item: impl Into<BuilderItem>) -> Self {
        self.append(std::iter::once(item))
    }

    pub fn set_fee_payer(mut self, fee_payer: SignerRef) -> Self {
        self.fee_payer = Some(fee_payer);
        self
    }

    /// Public key of the fee payer, if one was set
    pub fn get_fee_payer(&self) -> Option<Pubkey> {
        self.fee_payer.as_ref().map(|payer| payer.pubkey())
    }

    pub fn fee_payer_signer(&self) -> Option<&SignerRef> {
        self.fee_payer.as_ref()
    }

    pub fn set_transaction_options(mut self, options: TransactionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transaction_options(&self) -> &TransactionOptions {
        &self.options
    }

    pub fn set_context(mut self, context: C) -> Self {
        self.context = context;
        self
    }

    /// Replace the context with a value of another type
    pub fn with_context<T>(self, context: T) -> TransactionBuilder<T> {
        TransactionBuilder {
            records: self.records,
            fee_payer: self.fee_payer,
            options: self.options,
            context,
        }
    }

    pub fn get_context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// Fee payer first, then every record's signers in record order
    ///
    /// Duplicates are kept; see [`super::instructions::dedupe_signers`].
    pub fn get_signers(&self) -> Vec<SignerRef> {
        self.fee_payer
            .iter()
            .chain(self.records.iter().flat_map(|record| record.signers.iter()))
            .cloned()
            .collect()
    }

    pub fn get_signer_pubkeys(&self) -> Vec<Pubkey> {
        self.get_signers().iter().map(|signer| signer.pubkey()).collect()
    }

    pub fn get_instructions(&self) -> Vec<Instruction> {
        self.records
            .iter()
            .map(|record| record.instruction.clone())
            .collect()
    }

    pub fn get_instruction_count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[InstructionRecord] {
        &self.records
    }

    /// Labels of labelled records, in record order
    pub fn labels(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|record| record.label.as_deref())
            .collect()
    }

    /// Position of the first record carrying `label`
    pub fn find_label(&self, label: &str) -> Option<usize> {
        self.records.iter().position(|record| record.has_label(label))
    }

    /// Apply `f` only when `condition` holds
    pub fn when(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Apply `f` only when `condition` does not hold
    pub fn unless(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        self.when(!condition, f)
    }

    /// Materialise the records into an unsigned wire transaction
    ///
    /// The recent blockhash is applied when the options carry one and every
    /// pre-signature is placed into its signer slot.
    pub fn to_sendable_transaction(&self) -> Result<SendableTransaction, TransactionBuilderError> {
        let payer = self
            .get_fee_payer()
            .ok_or(TransactionBuilderError::MissingFeePayer)?;

        let message = Message::new(&self.get_instructions(), Some(&payer));
        let mut transaction = Transaction::new_unsigned(message);

        if let Some(blockhash) = self.options.recent_blockhash {
            transaction.message.recent_blockhash = blockhash;
        }

        let signer_count = transaction.message.header.num_required_signatures as usize;
        for (pubkey, signature) in &self.options.pre_signatures {
            let slot = transaction.message.account_keys[..signer_count]
                .iter()
                .position(|key| key == pubkey)
                .ok_or(TransactionBuilderError::UnexpectedPreSignature { pubkey: *pubkey })?;
            transaction.signatures[slot] = *signature;
        }

        Ok(SendableTransaction {
            transaction,
            last_valid_block_height: self.options.last_valid_block_height,
        })
    }

    /// Hand the materialised transaction and signer set to `sender`
    ///
    /// The sender's response comes back merged with this builder's context.
    pub async fn send_and_confirm(
        self,
        sender: &dyn TransactionSender,
        confirm_options: Option<ConfirmOptions>,
    ) -> Result<SendAndConfirmOutput<C>, SdkError> {
        if self.is_empty() {
            return Err(TransactionBuilderError::Empty.into());
        }

        let transaction = self.to_sendable_transaction()?;
        let signers = self.get_signers();

        tracing::debug!(
            instructions = self.records.len(),
            signers = signers.len(),
            "Submitting composed transaction"
        );

        let response = sender
            .send_and_confirm(transaction, signers, confirm_options)
            .await?;

        Ok(SendAndConfirmOutput {
            response,
            context: self.context,
        })
    }
}

impl<C: Clone> TransactionBuilder<C> {
    /// Split so that the record labelled `label` starts the second half
    ///
    /// Both halves keep the fee payer, options and context. When no record
    /// carries `label`, every record stays in the first half.
    pub fn split_before_label(&self, label: &str) -> (Self, Self) {
        let at = self.find_label(label).unwrap_or(self.records.len());
        self.split_at(at)
    }

    /// Split so that the record labelled `label` ends the first half
    pub fn split_after_label(&self, label: &str) -> (Self, Self) {
        let at = self
            .find_label(label)
            .map(|position| position + 1)
            .unwrap_or(self.records.len());
        self.split_at(at)
    }

    fn split_at(&self, at: usize) -> (Self, Self) {
        let (before, after) = self.records.split_at(at);
        (self.with_records(before.to_vec()), self.with_records(after.to_vec()))
    }

    fn with_records(&self, records: Vec<InstructionRecord>) -> Self {
        Self {
            records,
            fee_payer: self.fee_payer.clone(),
            options: self.options.clone(),
            context: self.context.clone(),
        }
    }
}

impl<C: fmt::Debug> fmt::Debug for TransactionBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionBuilder")
            .field("records", &self.records)
            .field("fee_payer", &self.get_fee_payer())
            .field("options", &self.options)
            .field("context", &self.context)
            .finish()
    }
}
