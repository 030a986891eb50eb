//! Instruction records: one instruction plus the signers it needs

use std::fmt;
use std::sync::Arc;

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signer::Signer};

/// Shared handle to anything able to sign
///
/// Keypairs, `NullSigner`s standing in for external wallets, and custom
/// signers all fit behind this alias.
pub type SignerRef = Arc<dyn Signer + Send + Sync>;

/// Wrap a concrete signer into a [`SignerRef`]
pub fn signer_ref<S>(signer: S) -> SignerRef
where
    S: Signer + Send + Sync + 'static,
{
    Arc::new(signer)
}

/// An instruction together with its required signers and an optional label
///
/// Signers are kept in insertion order and are never de-duplicated here.
#[derive(Clone)]
pub struct InstructionRecord {
    pub instruction: Instruction,
    pub signers: Vec<SignerRef>,
    pub label: Option<String>,
}

impl InstructionRecord {
    pub fn new(instruction: Instruction) -> Self {
        Self {
            instruction,
            signers: Vec::new(),
            label: None,
        }
    }

    pub fn with_signer(mut self, signer: SignerRef) -> Self {
        self.signers.push(signer);
        self
    }

    pub fn with_signers(mut self, signers: impl IntoIterator<Item = SignerRef>) -> Self {
        self.signers.extend(signers);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }

    pub fn signer_pubkeys(&self) -> Vec<Pubkey> {
        self.signers.iter().map(|s| s.pubkey()).collect()
    }
}

impl fmt::Debug for InstructionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionRecord")
            .field("program_id", &self.instruction.program_id)
            .field("data_len", &self.instruction.data.len())
            .field("signers", &self.signer_pubkeys())
            .field("label", &self.label)
            .finish()
    }
}

impl From<Instruction> for InstructionRecord {
    fn from(instruction: Instruction) -> Self {
        Self::new(instruction)
    }
}
