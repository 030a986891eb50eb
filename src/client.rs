//! Top-level client
//!
//! A [`LedgerClient`] owns the read and send collaborators, the default fee
//! payer and its own [`OperationRegistry`]. Clones share all of it. Every
//! `execute` call derives a fresh [`ExecutionScope`] and runs the registered
//! handler inside a [`CancellationScope`] that is closed on the way out.

use std::fmt;
use std::sync::Arc;

use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signer::Signer};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::cancellation::{AbortController, AbortSignal, CancellationScope};
use crate::config::{QueryConfig, SdkConfig};
use crate::errors::SdkError;
use crate::metrics::Timer;
use crate::observability::TraceContext;
use crate::operations::{
    ExecuteOptions, ExecutionScope, ExecutionStatus, Operation, OperationDescriptor,
    OperationHandler, OperationPlugin, OperationRegistry, OperationTask,
};
use crate::query::{BatchedAccountReader, ProgramAccountScanner};
use crate::rpc::{
    client::rpc_client_from_config, AccountRpc, InMemoryLedger, RpcTransactionSender, SolanaRpc,
    TransactionSender,
};
use crate::tx_builder::{SendAndConfirmOutput, SignerRef, TransactionBuilder};

struct ClientInner {
    rpc: Arc<dyn AccountRpc>,
    sender: Arc<dyn TransactionSender>,
    registry: OperationRegistry,
    fee_payer: SignerRef,
    query_config: QueryConfig,
    commitment: CommitmentConfig,
}

/// Entry point for executing operations against one ledger
#[derive(Clone)]
pub struct LedgerClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerClient")
            .field("fee_payer", &self.inner.fee_payer.pubkey())
            .field("commitment", &self.inner.commitment)
            .field("query_config", &self.inner.query_config)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl LedgerClient {
    pub fn builder() -> LedgerClientBuilder {
        LedgerClientBuilder::default()
    }

    /// Builder wired to the RPC endpoint in `config`
    ///
    /// Reads and sends share one `RpcClient`. Reads are throttled by
    /// `rpc.rate_limit_rps` when it is set.
    pub fn builder_from_config(
        config: &SdkConfig,
        fee_payer: SignerRef,
    ) -> Result<LedgerClientBuilder, SdkError> {
        config
            .validate()
            .map_err(|err| SdkError::Configuration(err.to_string()))?;

        let client = rpc_client_from_config(&config.rpc)?;
        let commitment = config
            .rpc
            .commitment_config()
            .map_err(|err| SdkError::Configuration(err.to_string()))?;

        info!(
            endpoint = %config.rpc.url,
            commitment = ?commitment.commitment,
            rate_limit_rps = ?config.rpc.rate_limit(),
            "Connecting ledger client"
        );

        Ok(LedgerClientBuilder::default()
            .rpc(Arc::new(SolanaRpc::new(
                Arc::clone(&client),
                config.rpc.rate_limit(),
            )))
            .sender(Arc::new(RpcTransactionSender::new(client)))
            .fee_payer(fee_payer)
            .query_config(config.query.clone())
            .commitment(commitment))
    }

    /// Client with no registered handlers, wired to the RPC endpoint in `config`
    pub fn from_config(config: &SdkConfig, fee_payer: SignerRef) -> Result<Self, SdkError> {
        Self::builder_from_config(config, fee_payer)?.build()
    }

    pub fn rpc(&self) -> &Arc<dyn AccountRpc> {
        &self.inner.rpc
    }

    pub fn sender(&self) -> &Arc<dyn TransactionSender> {
        &self.inner.sender
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.inner.registry
    }

    /// Fee payer used when an execution does not name one
    pub fn default_fee_payer(&self) -> &SignerRef {
        &self.inner.fee_payer
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.inner.query_config
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.inner.commitment
    }

    /// Reader over `addresses` using this client's chunking settings
    pub fn accounts(&self, addresses: Vec<Pubkey>) -> BatchedAccountReader {
        BatchedAccountReader::with_config(
            Arc::clone(&self.inner.rpc),
            addresses,
            &self.inner.query_config,
        )
        .with_commitment(self.inner.commitment)
    }

    /// Scanner over the accounts owned by `program_id`
    pub fn program_accounts(&self, program_id: Pubkey) -> ProgramAccountScanner {
        ProgramAccountScanner::new(Arc::clone(&self.inner.rpc), program_id)
            .with_query_config(self.inner.query_config.clone())
            .with_commitment(self.inner.commitment)
    }

    /// Handler registered for `O`
    pub fn handler<O: Operation>(&self) -> Result<Arc<dyn OperationHandler<O>>, SdkError> {
        self.inner.registry.handler::<O>()
    }

    fn execution_scope(&self, kind: &'static str, options: ExecuteOptions) -> ExecutionScope {
        let signal = options.signal.unwrap_or_else(AbortSignal::never);
        let trace = match &options.parent {
            Some(parent) => parent.child(kind),
            None => TraceContext::root(kind),
        };

        ExecutionScope::new(
            CancellationScope::new(signal),
            options
                .payer
                .unwrap_or_else(|| Arc::clone(&self.inner.fee_payer)),
            options.commitment.unwrap_or(self.inner.commitment),
            options.confirm_options,
            trace,
        )
    }

    /// Run the handler registered for the descriptor's kind
    ///
    /// Fails with `HandlerMissing` before anything runs when no handler is
    /// registered. A handler that returns normally after the signal fired
    /// still yields `Cancelled`.
    #[instrument(
        name = "execute",
        skip_all,
        fields(kind = O::KIND, correlation_id = tracing::field::Empty)
    )]
    pub async fn execute<O: Operation>(
        &self,
        descriptor: OperationDescriptor<O>,
        options: ExecuteOptions,
    ) -> Result<O::Output, SdkError> {
        let handler = self.inner.registry.handler::<O>().map_err(|err| {
            warn!(error = %err, "Operation has no usable handler");
            err
        })?;

        let scope = self.execution_scope(O::KIND, options);
        tracing::Span::current().record(
            "correlation_id",
            tracing::field::display(scope.correlation_id()),
        );
        debug!(
            payer = %scope.payer_pubkey(),
            nested = !scope.trace().is_root(),
            "Executing operation"
        );

        let timer = Timer::start();
        let cancellation = scope.cancellation().clone();
        let result = cancellation
            .run(|_| handler.handle(descriptor, self, scope))
            .await;

        let result = match (result, cancellation.cancellation_error()) {
            (Ok(_), Some(reason)) => Err(SdkError::Cancelled { reason }),
            (result, _) => result,
        };

        let status = ExecutionStatus::from_result(&result);
        match &result {
            Ok(_) => debug!(elapsed_secs = timer.elapsed_secs(), "Operation succeeded"),
            Err(err) if err.is_cancelled() => {
                info!(reason = ?err.cancellation_reason(), "Operation cancelled")
            }
            Err(err) => warn!(error = %err, category = err.category(), "Operation failed"),
        }
        timer.finish_operation(O::KIND, status.as_str());

        result
    }

    /// Run an execution on the tokio runtime
    ///
    /// The task gets its own abort controller. A caller signal in `options`
    /// is chained to it, so either side can cancel. Must be called from
    /// within a tokio runtime.
    pub fn spawn<O: Operation>(
        &self,
        descriptor: OperationDescriptor<O>,
        mut options: ExecuteOptions,
    ) -> OperationTask<O> {
        let controller = AbortController::new();
        let parent = options.signal.replace(controller.signal());
        let (status_tx, status_rx) = watch::channel(ExecutionStatus::Pending);

        let client = self.clone();
        let forward = controller.clone();
        let handle = tokio::spawn(async move {
            let parent_scope = parent
                .map(CancellationScope::new)
                .unwrap_or_else(CancellationScope::detached);

            parent_scope
                .run(|parent_scope| async move {
                    parent_scope.on_cancel(move |reason| {
                        forward.abort_with(Arc::clone(reason));
                    });

                    status_tx.send_replace(ExecutionStatus::Running);
                    let result = client.execute(descriptor, options).await;
                    status_tx.send_replace(ExecutionStatus::from_result(&result));
                    result
                })
                .await
        });

        OperationTask::new(controller, status_rx, handle)
    }

    /// Send a composed builder from inside a handler
    ///
    /// The scope's payer is used when the builder has none, the scope's
    /// confirmation settings apply, and cancellation is checked on both sides
    /// of the send.
    pub async fn send_and_confirm<C>(
        &self,
        builder: TransactionBuilder<C>,
        scope: &ExecutionScope,
    ) -> Result<SendAndConfirmOutput<C>, SdkError> {
        scope.raise_if_cancelled()?;

        let builder = match builder.get_fee_payer() {
            Some(_) => builder,
            None => builder.set_fee_payer(Arc::clone(scope.payer())),
        };
        let output = builder
            .send_and_confirm(self.inner.sender.as_ref(), scope.confirm_options())
            .await?;

        scope.raise_if_cancelled()?;
        Ok(output)
    }
}

/// Setup phase for a [`LedgerClient`]; the registry is frozen by `build`
pub struct LedgerClientBuilder {
    rpc: Option<Arc<dyn AccountRpc>>,
    sender: Option<Arc<dyn TransactionSender>>,
    fee_payer: Option<SignerRef>,
    query_config: QueryConfig,
    commitment: CommitmentConfig,
    registry: OperationRegistry,
}

impl Default for LedgerClientBuilder {
    fn default() -> Self {
        Self {
            rpc: None,
            sender: None,
            fee_payer: None,
            query_config: QueryConfig::default(),
            commitment: CommitmentConfig::confirmed(),
            registry: OperationRegistry::new(),
        }
    }
}

impl fmt::Debug for LedgerClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerClientBuilder")
            .field("rpc", &self.rpc.is_some())
            .field("sender", &self.sender.is_some())
            .field("fee_payer", &self.fee_payer.as_ref().map(|payer| payer.pubkey()))
            .field("commitment", &self.commitment)
            .field("registry", &self.registry)
            .finish()
    }
}

impl LedgerClientBuilder {
    pub fn rpc(mut self, rpc: Arc<dyn AccountRpc>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    pub fn sender(mut self, sender: Arc<dyn TransactionSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Use one in-memory ledger for both reads and sends
    pub fn in_memory(self, ledger: Arc<InMemoryLedger>) -> Self {
        self.rpc(ledger.clone()).sender(ledger)
    }

    pub fn fee_payer(mut self, fee_payer: SignerRef) -> Self {
        self.fee_payer = Some(fee_payer);
        self
    }

    pub fn query_config(mut self, query_config: QueryConfig) -> Self {
        self.query_config = query_config;
        self
    }

    pub fn commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn register<O, H>(mut self, handler: H) -> Self
    where
        O: Operation,
        H: OperationHandler<O> + 'static,
    {
        self.registry.register::<O, H>(handler);
        self
    }

    pub fn register_fn<O, F, Fut>(mut self, f: F) -> Self
    where
        O: Operation,
        F: Fn(OperationDescriptor<O>, LedgerClient, ExecutionScope) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<O::Output, SdkError>> + Send + 'static,
    {
        self.registry.register_fn::<O, F, Fut>(f);
        self
    }

    pub fn plugin(mut self, plugin: impl OperationPlugin) -> Self {
        plugin.install(&mut self.registry);
        self
    }

    pub fn build(self) -> Result<LedgerClient, SdkError> {
        let rpc = self
            .rpc
            .ok_or_else(|| SdkError::Configuration("ledger client needs an rpc collaborator".into()))?;
        let sender = self.sender.ok_or_else(|| {
            SdkError::Configuration("ledger client needs a send collaborator".into())
        })?;
        let fee_payer = self
            .fee_payer
            .ok_or_else(|| SdkError::Configuration("ledger client needs a default fee payer".into()))?;

        debug!(
            fee_payer = %fee_payer.pubkey(),
            handlers = self.registry.len(),
            "Ledger client built"
        );

        Ok(LedgerClient {
            inner: Arc::new(ClientInner {
                rpc,
                sender,
                registry: self.registry,
                fee_payer,
                query_config: self.query_config,
                commitment: self.commitment,
            }),
        })
    }
}
