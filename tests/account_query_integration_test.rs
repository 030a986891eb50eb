//! Integration tests for batched account reads and program scans

use std::sync::Arc;

use ledger_sdk::config::QueryConfig;
use ledger_sdk::query::FetchedAccount;
use ledger_sdk::rpc::RpcManagerError;
use ledger_sdk::tx_builder::signer_ref;
use ledger_sdk::{
    BatchedAccountReader, FilterValue, InMemoryLedger, LedgerClient, ProgramAccountScanner,
    SdkError,
};
use proptest::prelude::*;
use solana_sdk::{account::Account, pubkey::Pubkey, signature::Keypair};

const TOKEN_ACCOUNT_LEN: usize = 165;

fn token_like(owner_key: &Pubkey, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    data[..32].copy_from_slice(owner_key.as_ref());
    data
}

fn fixture() -> (Arc<InMemoryLedger>, Pubkey, Pubkey, Vec<Pubkey>) {
    let ledger = Arc::new(InMemoryLedger::new());
    let program = Pubkey::new_unique();
    let wallet = Pubkey::new_unique();
    let mut hits = Vec::new();

    // 5 accounts: two match both the wallet and the size
    let first = Pubkey::new_unique();
    ledger.insert_program_account(first, program, token_like(&wallet, TOKEN_ACCOUNT_LEN));
    hits.push(first);
    ledger.insert_program_account(
        Pubkey::new_unique(),
        program,
        token_like(&Pubkey::new_unique(), TOKEN_ACCOUNT_LEN),
    );
    ledger.insert_program_account(Pubkey::new_unique(), program, token_like(&wallet, 82));
    let second = Pubkey::new_unique();
    ledger.insert_program_account(second, program, token_like(&wallet, TOKEN_ACCOUNT_LEN));
    hits.push(second);
    ledger.insert_program_account(Pubkey::new_unique(), program, token_like(&wallet, 200));

    (ledger, program, wallet, hits)
}

#[tokio::test]
async fn test_scan_by_owner_and_size() {
    let (ledger, program, wallet, hits) = fixture();

    let matches = ProgramAccountScanner::new(ledger.clone(), program)
        .where_eq(0, wallet)
        .where_size(TOKEN_ACCOUNT_LEN as u64)
        .get()
        .await
        .unwrap();

    let addresses: Vec<Pubkey> = matches.iter().map(|m| m.address).collect();
    assert_eq!(addresses, hits);
    assert!(matches.iter().all(|m| m.data().len() == TOKEN_ACCOUNT_LEN));
    assert_eq!(ledger.scan_calls().len(), 1);

    let reversed: Vec<Pubkey> = ProgramAccountScanner::new(ledger.clone(), program)
        .where_eq(0, wallet)
        .where_size(TOKEN_ACCOUNT_LEN as u64)
        .sort_using(|a, b| b.address.cmp(&a.address))
        .get_public_keys()
        .await
        .unwrap();
    let mut expected = hits.clone();
    expected.sort_by(|a, b| b.cmp(a));
    assert_eq!(reversed, expected);
}

#[tokio::test]
async fn test_scan_through_client_uses_its_settings() {
    let (ledger, program, wallet, hits) = fixture();
    let client = LedgerClient::builder()
        .in_memory(ledger.clone())
        .fee_payer(signer_ref(Keypair::new()))
        .build()
        .unwrap();

    let keys = client
        .program_accounts(program)
        .where_eq(0, FilterValue::base58(wallet.to_string()))
        .where_size(TOKEN_ACCOUNT_LEN as u64)
        .get_public_keys()
        .await
        .unwrap();
    assert_eq!(keys, hits);
}

#[tokio::test]
async fn test_scan_then_read_referenced_accounts() {
    let ledger = Arc::new(InMemoryLedger::new());
    let program = Pubkey::new_unique();
    let referenced: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
    for (i, target) in referenced.iter().enumerate() {
        let mut data = target.to_bytes().to_vec();
        data.push(i as u8);
        ledger.insert_program_account(Pubkey::new_unique(), program, data);
        ledger.insert_account(*target, Account::new(100 + i as u64, 0, &Pubkey::new_unique()));
    }

    let reader = ProgramAccountScanner::new(ledger.clone(), program)
        .sort_using(|a, b| b.data()[32].cmp(&a.data()[32]))
        .get_multiple_accounts()
        .await
        .unwrap();

    let lamports: Vec<u64> = reader
        .map(|fetched: FetchedAccount| fetched.account.map(|a| a.lamports).unwrap_or(0))
        .run()
        .await
        .unwrap();
    assert_eq!(lamports, vec![102, 101, 100]);
}

#[tokio::test]
async fn test_one_failing_chunk_fails_whole_read() {
    let ledger = Arc::new(InMemoryLedger::new());
    let addresses: Vec<Pubkey> = (0..250).map(|_| Pubkey::new_unique()).collect();
    ledger.fail_reads_for(addresses[180]);

    let err = BatchedAccountReader::new(ledger.clone(), addresses)
        .get()
        .await
        .unwrap_err();
    match err {
        SdkError::ChunkedReadFailure {
            chunk_index,
            chunk_len,
            source,
        } => {
            assert_eq!(chunk_index, 1);
            assert_eq!(chunk_len, 100);
            assert!(matches!(source, RpcManagerError::Transport { .. }));
        }
        other => panic!("expected ChunkedReadFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_lazy_query_reruns_each_time() {
    let ledger = Arc::new(InMemoryLedger::new());
    let address = Pubkey::new_unique();
    let query = BatchedAccountReader::new(ledger.clone(), vec![address]).lazy();
    assert!(ledger.read_calls().is_empty());

    assert!(!query.run().await.unwrap()[0].exists());
    ledger.insert_account(address, Account::new(1, 0, &Pubkey::new_unique()));
    assert!(query.run().await.unwrap()[0].exists());
    assert_eq!(ledger.read_calls().len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_reader_output_aligns_with_input(
        total in 0usize..320,
        present_mask in proptest::collection::vec(any::<bool>(), 320),
        chunk in 1usize..=100,
        parallelism in 1usize..6,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let ledger = Arc::new(InMemoryLedger::new());
        let addresses: Vec<Pubkey> = (0..total).map(|_| Pubkey::new_unique()).collect();
        for (address, present) in addresses.iter().zip(&present_mask) {
            if *present {
                ledger.insert_account(*address, Account::new(1, 0, &Pubkey::new_unique()));
            }
        }

        let config = QueryConfig {
            max_accounts_per_request: chunk,
            max_parallel_requests: parallelism,
        };
        let reader = BatchedAccountReader::with_config(ledger.clone(), addresses.clone(), &config);
        let fetched = runtime.block_on(reader.get()).unwrap();

        prop_assert_eq!(fetched.len(), addresses.len());
        for (i, item) in fetched.iter().enumerate() {
            prop_assert_eq!(item.address, addresses[i]);
            prop_assert_eq!(item.exists(), present_mask[i]);
        }

        let calls = ledger.read_calls();
        prop_assert_eq!(calls.len(), total.div_ceil(chunk));
        prop_assert!(calls.iter().all(|c| c.len() <= chunk && !c.is_empty()));
        // chunks may be issued in any order when several are in flight
        let mut requested = calls.concat();
        let mut expected = addresses.clone();
        requested.sort();
        expected.sort();
        prop_assert_eq!(requested, expected);
    }
}
