//! Signer bookkeeping over composed instructions
//!
//! The builder keeps every signer it is handed, duplicates included. These
//! helpers are what a send collaborator uses right before signing: collapse
//! the signer list and check that every account marked `is_signer` (plus the
//! fee payer) is covered.

use std::collections::HashSet;

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signer::Signer};

use super::errors::TransactionBuilderError;
use super::record::SignerRef;

/// Keep the first signer for every public key, preserving order
pub fn dedupe_signers(signers: &[SignerRef]) -> Vec<SignerRef> {
    let mut seen = HashSet::new();
    signers
        .iter()
        .filter(|signer| seen.insert(signer.pubkey()))
        .cloned()
        .collect()
}

/// Accounts that must sign, fee payer first, then in instruction order
pub fn required_signers(instructions: &[Instruction], fee_payer: Option<&Pubkey>) -> Vec<Pubkey> {
    let mut seen = HashSet::new();
    let mut required = Vec::new();

    if let Some(payer) = fee_payer {
        seen.insert(*payer);
        required.push(*payer);
    }

    for ix in instructions {
        for meta in ix.accounts.iter().filter(|meta| meta.is_signer) {
            if seen.insert(meta.pubkey) {
                required.push(meta.pubkey);
            }
        }
    }

    required
}

/// Required signers that nothing in `available` covers
pub fn missing_signers(
    instructions: &[Instruction],
    fee_payer: Option<&Pubkey>,
    available: impl IntoIterator<Item = Pubkey>,
) -> Vec<Pubkey> {
    let available: HashSet<Pubkey> = available.into_iter().collect();
    required_signers(instructions, fee_payer)
        .into_iter()
        .filter(|key| !available.contains(key))
        .collect()
}

/// Fail with the first required signer that is not available
pub fn check_signers(
    instructions: &[Instruction],
    fee_payer: Option<&Pubkey>,
    available: impl IntoIterator<Item = Pubkey>,
) -> Result<(), TransactionBuilderError> {
    match missing_signers(instructions, fee_payer, available).first() {
        Some(pubkey) => Err(TransactionBuilderError::MissingSigner { pubkey: *pubkey }),
        None => Ok(()),
    }
}
