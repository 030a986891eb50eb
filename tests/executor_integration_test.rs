//! Integration tests for operation registration and execution

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledger_sdk::tx_builder::signer_ref;
use ledger_sdk::{
    AbortController, ExecuteOptions, ExecutionScope, ExecutionStatus, InMemoryLedger,
    LedgerClient, Operation, OperationDescriptor, OperationHandler, OperationRegistry, SdkError,
};
use solana_sdk::{account::Account, pubkey::Pubkey, signature::Keypair};

#[derive(Debug, Clone, PartialEq)]
struct PingOutput {
    value: u32,
}

struct Ping;

impl Operation for Ping {
    const KIND: &'static str = "Ping";
    type Input = ();
    type Output = PingOutput;
}

struct Unregistered;

impl Operation for Unregistered {
    const KIND: &'static str = "Unregistered";
    type Input = ();
    type Output = ();
}

struct SlowStep;

impl Operation for SlowStep {
    const KIND: &'static str = "SlowStep";
    type Input = Duration;
    type Output = ();
}

/// Counts lamports across a set of accounts
struct TotalLamports;

impl Operation for TotalLamports {
    const KIND: &'static str = "TotalLamports";
    type Input = Vec<Pubkey>;
    type Output = u64;
}

struct TotalLamportsHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl OperationHandler<TotalLamports> for TotalLamportsHandler {
    async fn handle(
        &self,
        descriptor: OperationDescriptor<TotalLamports>,
        client: &LedgerClient,
        scope: ExecutionScope,
    ) -> Result<u64, SdkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let accounts = client
            .accounts(descriptor.into_input())
            .with_commitment(scope.commitment())
            .get()
            .await?;
        scope.raise_if_cancelled()?;

        Ok(accounts
            .iter()
            .filter_map(|fetched| fetched.account.as_ref())
            .map(|account| account.lamports)
            .sum())
    }
}

fn ping_plugin(registry: &mut OperationRegistry) {
    registry.register_fn::<Ping, _, _>(|_, _, _| async { Ok(PingOutput { value: 1 }) });
}

fn base_client() -> ledger_sdk::LedgerClientBuilder {
    LedgerClient::builder()
        .in_memory(Arc::new(InMemoryLedger::new()))
        .fee_payer(signer_ref(Keypair::new()))
}

#[tokio::test]
async fn test_registered_ping_returns_value() {
    let client = base_client().plugin(ping_plugin).build().unwrap();

    let output = client
        .execute(Ping::descriptor(()), ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(output, PingOutput { value: 1 });
}

#[tokio::test]
async fn test_unregistered_kind_fails_with_handler_missing() {
    let client = base_client().plugin(ping_plugin).build().unwrap();

    let err = client
        .execute(Unregistered::descriptor(()), ExecuteOptions::default())
        .await
        .unwrap_err();
    match err {
        SdkError::HandlerMissing { kind } => assert_eq!(kind, "Unregistered"),
        other => panic!("expected HandlerMissing, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_abort_during_handler_suspension_cancels() {
    let reached_after = Arc::new(AtomicBool::new(false));
    let flag = reached_after.clone();

    let client = base_client()
        .register_fn::<SlowStep, _, _>(move |descriptor, _, scope| {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(descriptor.into_input()).await;
                scope.raise_if_cancelled()?;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        })
        .build()
        .unwrap();

    let controller = AbortController::new();
    controller.abort_after(Duration::from_millis(10), "caller gave up");

    let err = client
        .execute(
            SlowStep::descriptor(Duration::from_millis(100)),
            ExecuteOptions::new().with_signal(controller.signal()),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(
        err.cancellation_reason().map(|reason| reason.message().to_string()),
        Some("caller gave up".to_string())
    );
    assert!(!reached_after.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_identical_calls_run_independently() {
    let calls = Arc::new(AtomicUsize::new(0));
    let ledger = Arc::new(InMemoryLedger::new());
    let a = Pubkey::new_unique();
    let b = Pubkey::new_unique();
    ledger.insert_account(a, Account::new(5, 0, &Pubkey::new_unique()));
    ledger.insert_account(b, Account::new(7, 0, &Pubkey::new_unique()));

    let client = LedgerClient::builder()
        .in_memory(ledger.clone())
        .fee_payer(signer_ref(Keypair::new()))
        .register::<TotalLamports, _>(TotalLamportsHandler {
            calls: calls.clone(),
        })
        .build()
        .unwrap();

    let missing = Pubkey::new_unique();
    let input = vec![a, missing, b];
    let (first, second) = tokio::join!(
        client.execute(
            TotalLamports::descriptor(input.clone()),
            ExecuteOptions::default()
        ),
        client.execute(TotalLamports::descriptor(input), ExecuteOptions::default()),
    );

    assert_eq!(first.unwrap(), 12);
    assert_eq!(second.unwrap(), 12);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(ledger.read_calls().len(), 2);
}

#[tokio::test]
async fn test_clients_have_independent_registries() {
    let with_ping = base_client().plugin(ping_plugin).build().unwrap();
    let without = base_client().build().unwrap();

    assert!(with_ping.registry().contains("Ping"));
    assert!(!without.registry().contains("Ping"));
    assert!(matches!(
        without
            .execute(Ping::descriptor(()), ExecuteOptions::default())
            .await,
        Err(SdkError::HandlerMissing { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_spawned_execution_walks_status_machine() {
    let client = base_client()
        .register_fn::<SlowStep, _, _>(|descriptor, _, scope| async move {
            tokio::time::sleep(descriptor.into_input()).await;
            scope.raise_if_cancelled()
        })
        .build()
        .unwrap();

    let task = client.spawn(
        SlowStep::descriptor(Duration::from_millis(30)),
        ExecuteOptions::default(),
    );
    let mut changes = task.status_changes();
    let mut seen = vec![*changes.borrow_and_update()];
    while !seen.last().is_some_and(|status| status.is_terminal()) {
        if changes.changed().await.is_err() {
            break;
        }
        seen.push(*changes.borrow_and_update());
    }
    task.join().await.unwrap();

    assert_eq!(seen.first(), Some(&ExecutionStatus::Pending));
    assert_eq!(seen.last(), Some(&ExecutionStatus::Successful));
    assert_eq!(seen.iter().filter(|s| s.is_terminal()).count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_spawn_ends_cancelled() {
    let client = base_client()
        .register_fn::<SlowStep, _, _>(|descriptor, _, scope| async move {
            tokio::time::sleep(descriptor.into_input()).await;
            scope.raise_if_cancelled()
        })
        .build()
        .unwrap();

    let task = client.spawn(
        SlowStep::descriptor(Duration::from_millis(100)),
        ExecuteOptions::default(),
    );
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(task.status(), ExecutionStatus::Running);

    task.cancel("stop");
    let status = task.status_changes();
    assert!(task.join().await.unwrap_err().is_cancelled());
    assert_eq!(*status.borrow(), ExecutionStatus::Cancelled);
}
