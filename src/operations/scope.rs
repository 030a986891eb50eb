//! Per-call options and the execution scope handed to handlers

use std::fmt;

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signer::Signer};

use crate::cancellation::{AbortSignal, CancellationScope};
use crate::errors::SdkError;
use crate::observability::{CorrelationId, TraceContext};
use crate::rpc::ConfirmOptions;
use crate::tx_builder::SignerRef;

/// Caller options for one execution; every field is optional
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Abort signal; a never-firing one is used when absent
    pub signal: Option<AbortSignal>,

    /// Fee payer; the client's default when absent
    pub payer: Option<SignerRef>,

    /// Read commitment; the client's default when absent
    pub commitment: Option<CommitmentConfig>,

    pub confirm_options: Option<ConfirmOptions>,

    /// Trace of the execution that started this one
    pub parent: Option<TraceContext>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_payer(mut self, payer: SignerRef) -> Self {
        self.payer = Some(payer);
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = Some(commitment);
        self
    }

    pub fn with_confirm_options(mut self, confirm_options: ConfirmOptions) -> Self {
        self.confirm_options = Some(confirm_options);
        self
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("signal", &self.signal)
            .field("payer", &self.payer.as_ref().map(|payer| payer.pubkey()))
            .field("commitment", &self.commitment)
            .field("confirm_options", &self.confirm_options)
            .field("parent", &self.parent.as_ref().map(|trace| trace.correlation_id))
            .finish()
    }
}

/// Everything a handler needs besides its input and the client
///
/// Resolved once per execution: the cancellation surface, the fee payer
/// (caller's or the client default), commitment, confirmation settings and
/// the trace position.
#[derive(Clone)]
pub struct ExecutionScope {
    cancellation: CancellationScope,
    payer: SignerRef,
    commitment: CommitmentConfig,
    confirm_options: Option<ConfirmOptions>,
    trace: TraceContext,
}

impl ExecutionScope {
    pub(crate) fn new(
        cancellation: CancellationScope,
        payer: SignerRef,
        commitment: CommitmentConfig,
        confirm_options: Option<ConfirmOptions>,
        trace: TraceContext,
    ) -> Self {
        Self {
            cancellation,
            payer,
            commitment,
            confirm_options,
            trace,
        }
    }

    pub fn cancellation(&self) -> &CancellationScope {
        &self.cancellation
    }

    pub fn signal(&self) -> &AbortSignal {
        self.cancellation.signal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Call between awaited steps so cancellation surfaces promptly
    pub fn raise_if_cancelled(&self) -> Result<(), SdkError> {
        self.cancellation.raise_if_cancelled()
    }

    pub fn payer(&self) -> &SignerRef {
        &self.payer
    }

    pub fn payer_pubkey(&self) -> Pubkey {
        self.payer.pubkey()
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    pub fn confirm_options(&self) -> Option<ConfirmOptions> {
        self.confirm_options
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.trace.correlation_id
    }

    /// Options for executing another operation from within this one
    ///
    /// The nested execution shares this signal, payer and settings and is
    /// traced as a child of this execution.
    pub fn child_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            signal: Some(self.signal().clone()),
            payer: Some(self.payer.clone()),
            commitment: Some(self.commitment),
            confirm_options: self.confirm_options,
            parent: Some(self.trace.clone()),
        }
    }
}

impl fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionScope")
            .field("cancelled", &self.is_cancelled())
            .field("payer", &self.payer_pubkey())
            .field("commitment", &self.commitment)
            .field("trace", &self.trace)
            .finish()
    }
}
