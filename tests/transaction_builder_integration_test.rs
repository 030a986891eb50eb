//! Ordering and signer properties of the transaction builder

use std::collections::VecDeque;

use ledger_sdk::tx_builder::{signer_ref, BuilderItem, InstructionRecord, TransactionBuilder};
use proptest::prelude::*;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Keypair, signer::Signer};

fn tagged(tag: u16) -> Instruction {
    Instruction::new_with_bytes(Pubkey::default(), &tag.to_le_bytes(), vec![])
}

fn tags(builder: &TransactionBuilder) -> Vec<u16> {
    builder
        .get_instructions()
        .iter()
        .map(|ix| u16::from_le_bytes([ix.data[0], ix.data[1]]))
        .collect()
}

#[derive(Debug, Clone)]
enum Step {
    Append(Vec<u16>),
    Prepend(Vec<u16>),
}

fn step() -> impl Strategy<Value = Step> {
    let batch = proptest::collection::vec(any::<u16>(), 0..4);
    prop_oneof![
        batch.clone().prop_map(Step::Append),
        batch.prop_map(Step::Prepend),
    ]
}

proptest! {
    #[test]
    fn prop_append_prepend_follow_call_order(steps in proptest::collection::vec(step(), 0..16)) {
        let mut expected = VecDeque::new();
        let mut builder = TransactionBuilder::new();

        for step in steps {
            match step {
                Step::Append(batch) => {
                    expected.extend(batch.iter().copied());
                    builder = builder.append(batch.into_iter().map(tagged));
                }
                Step::Prepend(batch) => {
                    for tag in batch.iter().rev() {
                        expected.push_front(*tag);
                    }
                    builder = builder.prepend(batch.into_iter().map(tagged));
                }
            }
        }

        prop_assert_eq!(tags(&builder), Vec::from(expected));
    }

    #[test]
    fn prop_composed_builder_stays_contiguous(
        outer in proptest::collection::vec(any::<u16>(), 0..8),
        inner in proptest::collection::vec(any::<u16>(), 0..8),
        at in 0usize..8,
    ) {
        let at = at.min(outer.len());
        let nested = TransactionBuilder::new().append(inner.iter().copied().map(tagged));

        let builder = TransactionBuilder::new()
            .append(outer[..at].iter().copied().map(tagged))
            .add(&nested)
            .append(outer[at..].iter().copied().map(tagged));

        let mut expected = outer[..at].to_vec();
        expected.extend(&inner);
        expected.extend(&outer[at..]);
        prop_assert_eq!(tags(&builder), expected);
        prop_assert_eq!(tags(&nested), inner);
    }
}

#[test]
fn test_signers_fee_payer_first_duplicates_kept() {
    let fee_payer = signer_ref(Keypair::new());
    let s1 = signer_ref(Keypair::new());
    let s2 = signer_ref(Keypair::new());

    let builder = TransactionBuilder::new()
        .set_fee_payer(fee_payer.clone())
        .add(InstructionRecord::new(tagged(1)).with_signer(s1.clone()))
        .add(InstructionRecord::new(tagged(2)).with_signers(vec![s2.clone(), s1.clone()]));

    assert_eq!(
        builder.get_signer_pubkeys(),
        vec![fee_payer.pubkey(), s1.pubkey(), s2.pubkey(), s1.pubkey()]
    );
}

#[test]
fn test_mixed_items_in_one_append() {
    let nested = TransactionBuilder::new().append(vec![tagged(2), tagged(3)]);
    let builder = TransactionBuilder::new().append(vec![
        BuilderItem::from(tagged(1)),
        BuilderItem::from(nested),
        BuilderItem::from(InstructionRecord::new(tagged(4)).with_label("last")),
    ]);

    assert_eq!(tags(&builder), vec![1, 2, 3, 4]);
    assert_eq!(builder.find_label("last"), Some(3));
}

#[test]
fn test_split_halves_reassemble() {
    let builder = TransactionBuilder::new().append(vec![
        InstructionRecord::new(tagged(1)),
        InstructionRecord::new(tagged(2)).with_label("mid"),
        InstructionRecord::new(tagged(3)),
    ]);

    let (before, after) = builder.split_before_label("mid");
    assert_eq!(tags(&before), vec![1]);
    assert_eq!(tags(&after), vec![2, 3]);

    let (before, after) = builder.split_after_label("mid");
    assert_eq!(tags(&before), vec![1, 2]);
    assert_eq!(tags(&after), vec![3]);

    let rejoined = before.add(after);
    assert_eq!(tags(&rejoined), tags(&builder));
}
