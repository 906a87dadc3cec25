//! Client
//!
//! Entry point of the crate. A [`Client`] owns the address book, the node
//! transport and the optional mirror node, and executes transactions on behalf
//! of an operator account:
//!
//! - unpinned transactions get a fresh id for the operator and a set of
//!   candidate nodes picked from the healthy part of the address book
//! - transactions paid by the operator are signed with the operator key
//! - at most `max_concurrent_requests` executions run at once
//! - the address book can be refreshed from the mirror on a schedule
//!
//! Cloning a client is cheap and clones share all state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod response;
pub use response::*;

use crate::config::ClientConfig;
use crate::constants::NETWORK_UPDATE_INITIAL_DELAY;
use crate::models::{
    AccountId, ChunkError, ConfigError, ExecutionError, NodeEntry, TransactionError, TransactionId,
};
use crate::services::chunking::{ChunkedOutcome, ChunkedSubmission, ChunkedSubmissionCoordinator};
use crate::services::execution::{DispatchSettings, ExecutionDispatcher};
use crate::services::mirror::{MirrorNode, MirrorRestClient};
use crate::services::network::{AddressBook, NodeHealthTracker};
use crate::services::receipt::ReceiptPoller;
use crate::services::signing::{PublicKey, SignerFn, TransactionSigner};
use crate::services::transaction::Transaction;
use crate::services::transport::NodeTransport;
use crate::utils::log_client_info;

/// Account paying for transactions by default, with its signing key.
#[derive(Clone)]
pub struct Operator {
    pub account_id: AccountId,
    pub public_key: PublicKey,
    signer: SignerFn,
}

impl Operator {
    pub fn new<S>(account_id: AccountId, signer: S) -> Self
    where
        S: TransactionSigner + 'static,
    {
        let public_key = signer.public_key();
        let signer = Arc::new(signer);
        Self {
            account_id,
            public_key,
            signer: Arc::new(move |body: &[u8]| signer.sign(body)),
        }
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

struct NetworkUpdateTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct ClientInner {
    config: ClientConfig,
    address_book: Arc<AddressBook>,
    dispatcher: Arc<ExecutionDispatcher>,
    poller: Arc<ReceiptPoller>,
    chunker: ChunkedSubmissionCoordinator,
    operator: Option<Operator>,
    permits: Semaphore,
    runtime: Option<Handle>,
    network_updates: Mutex<Option<NetworkUpdateTask>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(task) = self.network_updates.get_mut().take() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address_book", &self.inner.address_book)
            .field("operator", &self.inner.operator)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    network: Option<Vec<NodeEntry>>,
    transport: Option<Arc<dyn NodeTransport>>,
    mirror: Option<Arc<dyn MirrorNode>>,
    operator: Option<Operator>,
    runtime: Option<Handle>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Initial nodes. Takes precedence over the nodes of the config.
    pub fn network(mut self, network: Vec<NodeEntry>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn NodeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Mirror node to use. Without one, a REST client is created from
    /// `mirror_url` when the config sets it.
    pub fn mirror(mut self, mirror: Arc<dyn MirrorNode>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn operator<S>(mut self, account_id: AccountId, signer: S) -> Self
    where
        S: TransactionSigner + 'static,
    {
        self.operator = Some(Operator::new(account_id, signer));
        self
    }

    /// Runtime used by the blocking calls and the scheduled network updates.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the client.
    ///
    /// When the config sets a network update period and a mirror is available,
    /// the scheduled refresh starts right away, provided a runtime is
    /// available.
    ///
    /// # Errors
    /// * `ConfigError::Missing` - No transport was given
    /// * `ConfigError::EmptyNetwork` - No nodes to start with
    /// * any validation error of the config
    pub fn build(self) -> Result<Client, ConfigError> {
        let config = self.config;
        config.validate()?;
        let transport = self.transport.ok_or(ConfigError::Missing("transport"))?;

        let network = match self.network {
            Some(network) => network,
            None => config
                .network
                .iter()
                .map(NodeEntry::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        };
        if network.is_empty() {
            return Err(ConfigError::EmptyNetwork);
        }

        let mirror = match (self.mirror, config.mirror_url.as_deref()) {
            (Some(mirror), _) => Some(mirror),
            (None, Some(url)) => {
                let client = MirrorRestClient::new(url).map_err(|e| ConfigError::InvalidValue {
                    field: "mirror_url",
                    reason: e.to_string(),
                })?;
                Some(Arc::new(client) as Arc<dyn MirrorNode>)
            }
            (None, None) => None,
        };

        let health = Arc::new(NodeHealthTracker::new(
            config.min_node_backoff,
            config.max_node_backoff,
        ));
        let address_book = Arc::new(AddressBook::new(network, health, mirror));
        let settings = DispatchSettings::from(&config);
        let dispatcher = Arc::new(ExecutionDispatcher::new(
            address_book.clone(),
            transport.clone(),
            settings,
        ));
        let poller = Arc::new(ReceiptPoller::from_settings(
            address_book.clone(),
            transport,
            &settings,
        ));
        let chunker = ChunkedSubmissionCoordinator::new(
            dispatcher.clone(),
            poller.clone(),
            config.receipt_timeout,
        );

        log_client_info(&config);
        config.log_config();

        let client = Client {
            inner: Arc::new(ClientInner {
                permits: Semaphore::new(config.max_concurrent_requests),
                config,
                address_book,
                dispatcher,
                poller,
                chunker,
                operator: self.operator,
                runtime: self.runtime,
                network_updates: Mutex::new(None),
            }),
        };
        if let Some(period) = client.inner.config.network_update_period {
            if client.inner.address_book.mirror().is_some() {
                client.start_network_updates(period);
            }
        }
        Ok(client)
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn address_book(&self) -> &Arc<AddressBook> {
        &self.inner.address_book
    }

    /// Replaces the whole network with `network`.
    ///
    /// Unlike a mirror refresh, the health of every node is forgotten.
    ///
    /// # Errors
    /// * `ConfigError::EmptyNetwork` - `network` has no nodes; the book is unchanged
    pub fn set_network(&self, network: Vec<NodeEntry>) -> Result<(), ConfigError> {
        if network.is_empty() {
            return Err(ConfigError::EmptyNetwork);
        }
        info!(nodes = %network.len(), "network replaced");
        self.inner.address_book.replace(network);
        Ok(())
    }

    pub fn operator_account_id(&self) -> Option<AccountId> {
        self.inner.operator.as_ref().map(|operator| operator.account_id)
    }

    pub fn receipt_poller(&self) -> &ReceiptPoller {
        &self.inner.poller
    }

    /// Executes a transaction until a node accepts it.
    ///
    /// The transaction is frozen first when needed. Missing ids are generated
    /// for the operator and missing node lists are picked from the address
    /// book.
    pub async fn execute(
        &self,
        transaction: &mut Transaction,
    ) -> Result<TransactionResponse, ExecutionError> {
        self.execute_with_cancel(transaction, &CancellationToken::new())
            .await
    }

    pub async fn execute_with_cancel(
        &self,
        transaction: &mut Transaction,
        cancel: &CancellationToken,
    ) -> Result<TransactionResponse, ExecutionError> {
        self.prepare(transaction)?;

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
            permit = self.inner.permits.acquire() => permit.map_err(|_| ExecutionError::Cancelled)?,
        };

        let submission = self
            .inner
            .dispatcher
            .execute(transaction, cancel)
            .await
            .into_result()?;
        Ok(TransactionResponse::new(
            submission,
            transaction.node_account_ids(),
        ))
    }

    /// Blocking form of [`Client::execute`].
    ///
    /// Runs on the runtime given to the builder. Must not be called from
    /// within an async context.
    pub fn execute_blocking(
        &self,
        transaction: &mut Transaction,
    ) -> Result<TransactionResponse, ExecutionError> {
        self.block_on(self.execute(transaction))?
    }

    /// Submits a payload in chunks.
    ///
    /// Missing ids and node lists are filled in as for [`Client::execute`].
    pub async fn submit_chunked(
        &self,
        submission: ChunkedSubmission,
    ) -> Result<ChunkedOutcome, ChunkError> {
        self.submit_chunked_with_cancel(submission, &CancellationToken::new())
            .await
    }

    pub async fn submit_chunked_with_cancel(
        &self,
        mut submission: ChunkedSubmission,
        cancel: &CancellationToken,
    ) -> Result<ChunkedOutcome, ChunkError> {
        if submission.transaction_id().is_none() {
            submission.set_transaction_id(self.generate_transaction_id()?);
        }
        if submission.node_account_ids().is_empty() {
            submission.set_node_account_ids(self.pick_nodes().map_err(|_| TransactionError::NoNodes)?);
        }
        if let Some(operator) = &self.inner.operator {
            if submission.transaction_id().map(|id| id.account_id) == Some(operator.account_id) {
                submission = submission.sign_with(operator.public_key.clone(), operator.signer.clone());
            }
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChunkError::Cancelled { committed: 0 }),
            permit = self.inner.permits.acquire() => {
                permit.map_err(|_| ChunkError::Cancelled { committed: 0 })?
            }
        };
        self.inner.chunker.submit(&submission, cancel).await
    }

    /// Starts refreshing the address book from the mirror every `period`,
    /// replacing any running schedule. The first refresh runs after a short
    /// initial delay. Failures are logged and the schedule continues.
    ///
    /// # Returns
    /// * `true` - The schedule started
    /// * `false` - No mirror or no runtime available
    pub fn start_network_updates(&self, period: Duration) -> bool {
        if self.inner.address_book.mirror().is_none() {
            warn!("no mirror configured, network updates not started");
            return false;
        }
        let Some(runtime) = self.runtime_handle() else {
            warn!("no async runtime, network updates not started");
            return false;
        };
        self.stop_network_updates();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let book = self.inner.address_book.clone();
        let handle = runtime.spawn(async move {
            let mut delay = NETWORK_UPDATE_INITIAL_DELAY.min(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                match book.refresh_now().await {
                    Ok(nodes) => debug!(nodes = %nodes, "scheduled network update applied"),
                    Err(e) => warn!(error = %e, "scheduled network update failed"),
                }
                delay = period;
            }
        });
        info!(period_secs = %period.as_secs(), "network updates started");
        *self.inner.network_updates.lock() = Some(NetworkUpdateTask { cancel, handle });
        true
    }

    pub fn stop_network_updates(&self) {
        if let Some(task) = self.inner.network_updates.lock().take() {
            task.cancel.cancel();
            task.handle.abort();
            debug!("network updates stopped");
        }
    }

    pub fn is_updating_network(&self) -> bool {
        self.inner.network_updates.lock().is_some()
    }

    fn runtime_handle(&self) -> Option<Handle> {
        self.inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> Result<F::Output, ExecutionError> {
        let runtime = self.inner.runtime.as_ref().ok_or(ExecutionError::NoRuntime)?;
        Ok(runtime.block_on(future))
    }

    fn generate_transaction_id(&self) -> Result<TransactionId, TransactionError> {
        let operator = self.inner.operator.as_ref().ok_or_else(|| {
            TransactionError::Validation(
                "transaction id must be set when the client has no operator".into(),
            )
        })?;
        Ok(TransactionId::generate(operator.account_id))
    }

    fn pick_nodes(&self) -> Result<Vec<AccountId>, ExecutionError> {
        let nodes = self
            .inner
            .address_book
            .node_account_ids_for_execute(self.inner.config.max_nodes_per_transaction);
        if nodes.is_empty() {
            return Err(ExecutionError::NoNodesAvailable);
        }
        Ok(nodes)
    }

    /// Fills in the id and nodes, freezes, and adds the operator signer.
    fn prepare(&self, transaction: &mut Transaction) -> Result<(), ExecutionError> {
        if !transaction.is_frozen() {
            if transaction.transaction_id().is_none() {
                transaction.set_generated_transaction_id(self.generate_transaction_id()?);
            }
            if transaction.node_account_ids().is_empty() {
                transaction.set_node_account_ids(self.pick_nodes()?);
            }
            transaction.freeze()?;
        }

        // whatever the operator key holds is overwritten, injected bytes included
        if let Some(operator) = &self.inner.operator {
            if transaction.transaction_id().map(|id| id.account_id) == Some(operator.account_id) {
                transaction.sign_with(operator.public_key.clone(), operator.signer.clone());
            }
        }
        Ok(())
    }
}
