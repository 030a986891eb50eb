//! Materialised transactions and send results
//!
//! [`SendableTransaction`] is what a builder hands to the send collaborator.
//! [`SendAndConfirmOutput`] is what comes back: the collaborator's response
//! merged with the builder's context, so out-of-band data (a freshly
//! generated account key, say) travels with the confirmation.

use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

/// Wire-level transaction plus the expiry height it was built against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendableTransaction {
    /// Unsigned (or partially pre-signed) transaction
    pub transaction: Transaction,

    /// Last valid block height for the transaction's blockhash, if known
    pub last_valid_block_height: Option<u64>,
}

impl SendableTransaction {
    /// False while the message still carries the default blockhash
    pub fn has_blockhash(&self) -> bool {
        self.transaction.message.recent_blockhash != Hash::default()
    }

    /// Fee payer (first account key), if the message has any keys
    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.transaction.message.account_keys.first()
    }

    /// Signer keys in message order
    pub fn required_signers(&self) -> &[Pubkey] {
        let count = self.transaction.message.header.num_required_signatures as usize;
        let keys = &self.transaction.message.account_keys;
        &keys[..count.min(keys.len())]
    }
}

/// Response of the send collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResponse {
    pub signature: Signature,
    pub last_valid_block_height: Option<u64>,
}

/// Send response merged with the builder's context
#[derive(Debug, Clone)]
pub struct SendAndConfirmOutput<C> {
    pub response: SendResponse,
    pub context: C,
}

impl<C> SendAndConfirmOutput<C> {
    pub fn signature(&self) -> &Signature {
        &self.response.signature
    }

    pub fn into_parts(self) -> (SendResponse, C) {
        (self.response, self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{
        instruction::{AccountMeta, Instruction},
        message::Message,
    };

    #[test]
    fn test_required_signers_from_header() {
        let payer = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let ix = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[0],
            vec![AccountMeta::new(other, true), AccountMeta::new(Pubkey::new_unique(), false)],
        );
        let tx = Transaction::new_unsigned(Message::new(&[ix], Some(&payer)));
        let sendable = SendableTransaction {
            transaction: tx,
            last_valid_block_height: None,
        };

        assert_eq!(sendable.fee_payer(), Some(&payer));
        assert_eq!(sendable.required_signers(), &[payer, other]);
        assert!(!sendable.has_blockhash());
    }

    #[test]
    fn test_output_into_parts() {
        let output = SendAndConfirmOutput {
            response: SendResponse {
                signature: Signature::default(),
                last_valid_block_height: Some(42),
            },
            context: "new-mint",
        };
        assert_eq!(output.signature(), &Signature::default());
        let (response, context) = output.into_parts();
        assert_eq!(response.last_valid_block_height, Some(42));
        assert_eq!(context, "new-mint");
    }
}
