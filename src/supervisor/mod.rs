//! TimeNode supervisor
//!
//! Owns the background worker and drives its lifecycle:
//! `Idle → Starting → Running → Scanning → Stopped`
//!
//! - Spawns and replaces the worker (one live generation at a time)
//! - Runs the periodic polls and the liveness signal
//! - Applies worker events to the published session
//! - Persists wallet material, flags and strategy
//!
//! This is the only layer that turns errors into notifications.

pub mod events;
pub mod polling;
pub mod session;
pub mod strategy;

pub use events::{Notification, NotificationLevel, SupervisorEvent};
pub use polling::{PollIntervals, PollKind, PollingLoops};
pub use session::{Balances, LogBuffer, LogView, Session, Stats};
pub use strategy::{EconomicStrategy, StrategyError, StrategyUpdate};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::crypto::{
    CryptoError, EncryptionBox, KeystoreError, OwnershipProof, SignatureError, SignatureVerifier,
    V3Keystore,
};
use crate::network::{ChainClient, ChainError, CustomProvider, NetworkRegistry};
use crate::storage::{keys, KeyValueStore, StorageError};
use crate::tier::NodeTier;
use crate::worker::{
    BridgeError, LogLevel, WorkerCommand, WorkerEvent, WorkerHandle, WorkerOptions, WorkerSpawner,
    WorkerTuning,
};

const EVENT_CAPACITY: usize = 256;

const UNLOCK_FAILED: &str = "Unable to unlock the TimeNode. Please try again";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    Idle,
    /// Worker spawned, START sent
    Starting,
    /// STARTED received, polls running
    Running,
    Scanning,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub intervals: PollIntervals,
    pub tuning: WorkerTuning,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("No keystore stored")]
    MissingKeystore,

    #[error("No password given")]
    MissingPassword,

    #[error("No worker running")]
    NotRunning,

    #[error("Worker stopped before replying")]
    WorkerLost,

    #[error("A claimed-transactions request is already in flight")]
    RequestInFlight,

    #[error("Not enough DAY tokens. Current balance: {0}")]
    InsufficientBalance(u64),

    #[error("Unsupported custom provider.")]
    UnsupportedProvider,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Keystore(#[from] KeystoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Set when a graph poll goes out, cleared by its reply
#[derive(Debug, Default)]
struct GraphFlags {
    bounties: AtomicBool,
    processed_txs: AtomicBool,
}

impl GraphFlags {
    fn mark(&self, kind: PollKind) {
        match kind {
            PollKind::BountiesGraph => self.bounties.store(true, Ordering::SeqCst),
            PollKind::ProcessedTxs => self.processed_txs.store(true, Ordering::SeqCst),
            _ => {}
        }
    }
}

/// Tasks and handles tied to the live worker
#[derive(Default)]
struct Runtime {
    worker: Option<WorkerHandle>,
    pump: Option<JoinHandle<()>>,
    polling: PollingLoops,
    liveness: Option<JoinHandle<()>>,
    pending_start: Option<oneshot::Sender<()>>,
    /// Outstanding claimed-transactions request
    claimed: Option<oneshot::Sender<Vec<Value>>>,
}

impl Runtime {
    /// Closing `claimed` fails the waiting caller with `WorkerLost`.
    fn drop_worker(&mut self) {
        self.polling.cancel_all();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.pending_start = None;
        self.claimed = None;
        self.worker = None;
    }

    fn stop_liveness(&mut self) {
        if let Some(liveness) = self.liveness.take() {
            liveness.abort();
        }
    }
}

struct Inner {
    storage: Arc<dyn KeyValueStore>,
    encryption: EncryptionBox,
    chain: Arc<dyn ChainClient>,
    spawner: Arc<dyn WorkerSpawner>,
    networks: NetworkRegistry,
    config: SupervisorConfig,
    session: RwLock<Session>,
    state: RwLock<SupervisorState>,
    runtime: Mutex<Runtime>,
    generation: AtomicU64,
    graph_flags: Arc<GraphFlags>,
    events: broadcast::Sender<SupervisorEvent>,
}

/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct TimeNodeSupervisor {
    inner: Arc<Inner>,
}

impl TimeNodeSupervisor {
    /// Build a supervisor and restore the persisted session.
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        encryption: EncryptionBox,
        chain: Arc<dyn ChainClient>,
        spawner: Arc<dyn WorkerSpawner>,
        networks: NetworkRegistry,
        config: SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        let session = Session {
            wallet_keystore: storage.load(keys::TIMENODE)?,
            attached_account: storage.load(keys::ATTACHED_DAY_ACCOUNT)?,
            claiming_enabled: storage.load_flag(keys::CLAIMING)?,
            economic_strategy: EconomicStrategy::load(storage.as_ref())?,
            ..Session::default()
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                storage,
                encryption,
                chain,
                spawner,
                networks,
                config,
                session: RwLock::new(session),
                state: RwLock::new(SupervisorState::Idle),
                runtime: Mutex::new(Runtime::default()),
                generation: AtomicU64::new(0),
                graph_flags: Arc::new(GraphFlags::default()),
                events,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the published session
    pub async fn session(&self) -> Session {
        let mut session = self.inner.session.read().await.clone();
        let flags = &self.inner.graph_flags;
        session.updating_bounties_graph_in_progress = flags.bounties.load(Ordering::SeqCst);
        session.updating_processed_txs_in_progress = flags.processed_txs.load(Ordering::SeqCst);
        session
    }

    pub async fn state(&self) -> SupervisorState {
        *self.inner.state.read().await
    }

    pub async fn node_tier(&self) -> NodeTier {
        self.inner.session.read().await.node_tier()
    }

    /// Generation of the live worker, 0 before the first spawn
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub async fn has_worker(&self) -> bool {
        self.inner.runtime.lock().await.worker.is_some()
    }

    /// Unlock with the keystore password and start the worker. Resumes
    /// scanning if it was active when the node last ran.
    pub async fn unlock(&self, password: &str) -> Result<(), SupervisorError> {
        let inner = &self.inner;
        let has_keystore = inner.storage.load(keys::TIMENODE)?.is_some();

        if !has_keystore || password.is_empty() {
            inner.notify(Notification::error(UNLOCK_FAILED));
            return Err(if has_keystore {
                SupervisorError::MissingPassword
            } else {
                SupervisorError::MissingKeystore
            });
        }

        if let Err(e) = self.start_client(password).await {
            inner.notify(Notification::error(e.to_string()));
            return Err(e);
        }

        if inner.storage.load_flag(keys::SCANNING)? {
            self.start_scanning().await?;
        }
        Ok(())
    }

    /// Connect to the chain, spawn a fresh worker and send it START.
    /// Returns once the worker reports STARTED.
    pub async fn start_client(&self, password: &str) -> Result<(), SupervisorError> {
        self.inner.set_state(SupervisorState::Starting).await;

        let result = self.launch(password).await;
        match &result {
            Ok(()) => self.inner.set_state(SupervisorState::Running).await,
            Err(e) => {
                error!(error = %e, "Failed to start TimeNode client");
                self.inner.set_state(SupervisorState::Idle).await;
            }
        }
        result
    }

    async fn launch(&self, password: &str) -> Result<(), SupervisorError> {
        let inner = &self.inner;

        let chain_id = inner.chain.init().await?;
        let custom = CustomProvider::load(inner.storage.as_ref())?;
        let network = inner
            .networks
            .resolve(custom.as_ref(), chain_id, inner.chain.endpoint());

        let keystore = inner
            .decrypted_keystore()?
            .ok_or(SupervisorError::MissingKeystore)?;
        let day_account = inner.decrypted_day_account()?;
        let claiming = inner.storage.load_flag(keys::CLAIMING)?;
        let strategy = EconomicStrategy::load(inner.storage.as_ref())?;

        {
            let mut session = inner.session.write().await;
            session.network = Some(network.clone());
            session.claiming_enabled = claiming;
            session.economic_strategy = strategy.clone();
        }

        let tuning = &inner.config.tuning;
        let options = WorkerOptions {
            network: network.clone(),
            custom_provider_url: custom.map(|c| c.endpoint),
            keystore: vec![keystore],
            keystore_password: password.to_string(),
            day_account_address: day_account,
            log_level: tuning.log_level,
            poll_interval_ms: tuning.poll_interval_ms,
            autostart: tuning.autostart,
            scan_spacing_blocks: tuning.scan_spacing_blocks,
            claiming,
            economic_strategy: strategy,
        };

        let channels = inner.spawner.spawn().await?;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = WorkerHandle::new(generation, channels.commands);
        let (started_tx, started_rx) = oneshot::channel();

        {
            let mut runtime = inner.runtime.lock().await;
            runtime.drop_worker();
            runtime.worker = Some(handle.clone());
            runtime.pending_start = Some(started_tx);
            runtime.pump = Some(spawn_event_pump(
                Arc::downgrade(inner),
                generation,
                channels.events,
            ));
        }

        info!(generation, network = %network.name, chain_id, "Worker spawned");
        handle.send(WorkerCommand::Start(Box::new(options))).await?;

        started_rx.await.map_err(|_| SupervisorError::WorkerLost)
    }

    /// Start scanning unless the node tier forbids it.
    pub async fn start_scanning(&self) -> Result<(), SupervisorError> {
        let inner = &self.inner;

        let tier = self.node_tier().await;
        if tier.is_disabled() {
            info!(%tier, "Scanning not allowed for this tier");
            return Ok(());
        }

        inner.session.write().await.scanning_active = true;
        inner.set_state(SupervisorState::Scanning).await;

        let timenode = self.my_address().ok().flatten().unwrap_or_default();
        let day_account = inner.decrypted_day_account().ok().flatten();
        let liveness = spawn_liveness(
            inner.events.clone(),
            inner.config.intervals.liveness(),
            timenode,
            day_account,
        );

        let worker = {
            let mut runtime = inner.runtime.lock().await;
            if let Some(previous) = runtime.liveness.replace(liveness) {
                previous.abort();
            }
            runtime.worker.clone()
        };

        match worker {
            Some(worker) => {
                if let Err(e) = worker.send(WorkerCommand::StartScanning).await {
                    warn!(error = %e, "Failed to send START_SCANNING");
                } else if let Err(e) = worker.send(WorkerCommand::UpdateStats).await {
                    warn!(error = %e, "Failed to request stats");
                }
            }
            None => warn!("Scanning requested with no worker running"),
        }

        inner.storage.set_flag(keys::SCANNING, true)?;
        info!(%tier, "Scanning started");
        Ok(())
    }

    /// Stop scanning. Safe to call when already stopped.
    pub async fn stop_scanning(&self) -> Result<(), SupervisorError> {
        let inner = &self.inner;
        inner.session.write().await.scanning_active = false;

        let worker = {
            let mut runtime = inner.runtime.lock().await;
            runtime.stop_liveness();
            runtime.worker.clone()
        };

        if let Some(worker) = worker {
            if let Err(e) = worker.send(WorkerCommand::StopScanning).await {
                warn!(error = %e, "Failed to send STOP_SCANNING");
            }
        }

        inner.storage.set_flag(keys::SCANNING, false)?;

        let mut state = inner.state.write().await;
        if *state == SupervisorState::Scanning {
            *state = SupervisorState::Running;
        }
        Ok(())
    }

    /// Replace the worker with a fresh one and start scanning on it.
    pub async fn restart(&self, password: &str) -> Result<(), SupervisorError> {
        self.stop_scanning().await?;
        self.inner.runtime.lock().await.drop_worker();
        info!("Restarting TimeNode worker");

        self.start_client(password).await?;
        self.start_scanning().await
    }

    /// Forget the wallet and stop the worker. Late replies from the old worker
    /// are ignored.
    pub async fn detach_wallet(&self) -> Result<(), SupervisorError> {
        let inner = &self.inner;

        for key in [
            keys::TIMENODE,
            keys::ATTACHED_DAY_ACCOUNT,
            keys::CLAIMING,
            keys::SCANNING,
        ] {
            inner.storage.remove(key)?;
        }

        {
            let mut session = inner.session.write().await;
            session.wallet_keystore = None;
            session.attached_account = None;
            session.claiming_enabled = false;
            session.balances = Balances::default();
        }

        self.stop_scanning().await?;
        inner.runtime.lock().await.drop_worker();
        inner.generation.fetch_add(1, Ordering::SeqCst);
        inner.set_state(SupervisorState::Stopped).await;

        info!("Wallet detached");
        inner.notify(Notification::success("Your wallet has been detached."));
        Ok(())
    }

    /// Encrypt and persist a keystore.
    pub async fn set_keystore(&self, keystore_json: &str) -> Result<(), SupervisorError> {
        let keystore = V3Keystore::parse(keystore_json)?;
        let sealed = self.inner.encryption.encrypt(keystore_json)?;

        self.inner.storage.save(keys::TIMENODE, &sealed)?;
        self.inner.session.write().await.wallet_keystore = Some(sealed);

        info!(address = ?keystore.address(), "Keystore stored");
        Ok(())
    }

    /// Address of the stored keystore
    pub fn my_address(&self) -> Result<Option<String>, SupervisorError> {
        match self.inner.decrypted_keystore()? {
            Some(json) => Ok(V3Keystore::parse(&json)?.address()),
            None => Ok(None),
        }
    }

    /// Attached DAY account, decrypted
    pub fn attached_day_address(&self) -> Result<Option<String>, SupervisorError> {
        self.inner.decrypted_day_account()
    }

    /// Check a password against the stored keystore, notifying the outcome.
    pub fn password_matches_keystore(&self, password: &str) -> bool {
        let inner = &self.inner;
        let result = inner.decrypted_keystore().and_then(|json| {
            let json = json.ok_or(SupervisorError::MissingKeystore)?;
            V3Keystore::parse(&json)?.verify_password(password)?;
            Ok(())
        });

        match result {
            Ok(()) => {
                inner.notify(Notification::success("Success."));
                true
            }
            Err(SupervisorError::Keystore(KeystoreError::WrongPassphrase)) => {
                inner.notify(Notification::error("Please enter a valid password."));
                false
            }
            Err(e) => {
                inner.notify(Notification::error(e.to_string()));
                false
            }
        }
    }

    /// Attach a DAY-holding account from a signed ownership proof.
    ///
    /// The balance is looked up on the current network. A balance too low for
    /// any tier reverts the session balances and leaves nothing persisted.
    pub async fn attach_day_account(&self, payload: &str) -> Result<NodeTier, SupervisorError> {
        let result = self.try_attach(payload).await;
        match &result {
            Ok(tier) => {
                info!(%tier, "DAY account attached");
                self.inner.notify(Notification::success("Success."));
            }
            Err(e) => {
                warn!(error = %e, "DAY account not attached");
                self.inner.notify(Notification::error(e.to_string()));
            }
        }
        result
    }

    async fn try_attach(&self, payload: &str) -> Result<NodeTier, SupervisorError> {
        let inner = &self.inner;

        let proof = OwnershipProof::parse(payload)?;
        let timenode = self.my_address()?.ok_or(SupervisorError::MissingKeystore)?;
        SignatureVerifier::verify(&proof, &timenode)?;

        let known = inner.session.read().await.network.clone();
        let network = match known {
            Some(network) => network,
            None => {
                let chain_id = inner.chain.init().await?;
                let custom = CustomProvider::load(inner.storage.as_ref())?;
                inner
                    .networks
                    .resolve(custom.as_ref(), chain_id, inner.chain.endpoint())
            }
        };
        if network.day_token_address.is_none() {
            return Err(SupervisorError::UnsupportedProvider);
        }

        let balance = inner.chain.day_balance(&network, &proof.address).await?;

        let tier = {
            let mut session = inner.session.write().await;
            let previous = session.balances.clone();
            session.balances.balance_day = Some(balance.balance);
            session.balances.is_time_mint = balance.is_time_mint();

            let tier = session.node_tier();
            if tier.is_disabled() {
                session.balances = previous;
                return Err(SupervisorError::InsufficientBalance(balance.balance));
            }
            tier
        };

        let sealed = inner.encryption.encrypt(&proof.address)?;
        inner.storage.save(keys::ATTACHED_DAY_ACCOUNT, &sealed)?;
        inner.session.write().await.attached_account = Some(sealed);

        Ok(tier)
    }

    /// Persist the claiming flag and every strategy parameter.
    pub async fn save_claiming_strategy(
        &self,
        claiming: bool,
        update: &StrategyUpdate,
    ) -> Result<(), SupervisorError> {
        let inner = &self.inner;
        inner.storage.set_flag(keys::CLAIMING, claiming)?;
        update.save(inner.storage.as_ref())?;

        let strategy = EconomicStrategy::load(inner.storage.as_ref())?;
        let mut session = inner.session.write().await;
        session.claiming_enabled = claiming;
        session.economic_strategy = strategy;

        info!(claiming, "Claiming strategy saved");
        Ok(())
    }

    pub fn economic_strategy(&self) -> Result<EconomicStrategy, SupervisorError> {
        Ok(EconomicStrategy::load(self.inner.storage.as_ref())?)
    }

    /// Probe an endpoint before switching to it.
    pub async fn test_custom_provider(&self, endpoint: &str) -> bool {
        self.inner.chain.test_provider(endpoint).await
    }

    /// Persist a custom provider and stop scanning. Takes effect on the next
    /// `restart`.
    pub async fn set_custom_provider(&self, id: u64, endpoint: &str) -> Result<(), SupervisorError> {
        CustomProvider {
            id,
            endpoint: endpoint.to_string(),
        }
        .save(self.inner.storage.as_ref())?;

        info!(id, endpoint, "Custom provider set");
        self.stop_scanning().await
    }

    pub fn custom_provider(&self) -> Result<Option<CustomProvider>, SupervisorError> {
        Ok(CustomProvider::load(self.inner.storage.as_ref())?)
    }

    /// Ask the worker for transactions it claimed but has not executed.
    /// Only one request may be outstanding.
    pub async fn get_claimed_not_executed_transactions(
        &self,
    ) -> Result<Vec<Value>, SupervisorError> {
        let inner = &self.inner;

        let (tx, rx) = oneshot::channel();
        let worker = {
            let mut runtime = inner.runtime.lock().await;
            let worker = runtime.worker.clone().ok_or(SupervisorError::NotRunning)?;
            if runtime
                .claimed
                .as_ref()
                .is_some_and(|pending| !pending.is_closed())
            {
                return Err(SupervisorError::RequestInFlight);
            }
            runtime.claimed = Some(tx);
            worker
        };

        if let Err(e) = worker
            .send(WorkerCommand::GetClaimedNotExecutedTransactions)
            .await
        {
            inner.runtime.lock().await.claimed.take();
            return Err(e.into());
        }

        rx.await.map_err(|_| SupervisorError::WorkerLost)
    }

    /// Reset worker counters and empty the log buffer.
    pub async fn clear_stats(&self) -> Result<(), SupervisorError> {
        let inner = &self.inner;
        let worker = inner.current_worker().await.ok_or(SupervisorError::NotRunning)?;
        worker.send(WorkerCommand::ClearStats).await?;
        inner.session.write().await.logs.clear();
        Ok(())
    }

    pub async fn set_log_view(&self, view: LogView) {
        self.inner.session.write().await.log_view = view;
    }
}

impl Inner {
    async fn set_state(&self, state: SupervisorState) {
        let mut current = self.state.write().await;
        if *current != state {
            debug!(from = ?*current, to = ?state, "Supervisor state");
            *current = state;
        }
    }

    async fn current_worker(&self) -> Option<WorkerHandle> {
        self.runtime.lock().await.worker.clone()
    }

    fn publish(&self, event: SupervisorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => info!(message = %notification.message, "Notification"),
            NotificationLevel::Error => warn!(message = %notification.message, "Notification"),
        }
        self.publish(SupervisorEvent::Notification(notification));
    }

    fn decrypted_keystore(&self) -> Result<Option<String>, SupervisorError> {
        match self.storage.load(keys::TIMENODE)? {
            Some(sealed) => Ok(Some(self.encryption.decrypt(&sealed)?)),
            None => Ok(None),
        }
    }

    fn decrypted_day_account(&self) -> Result<Option<String>, SupervisorError> {
        match self.storage.load(keys::ATTACHED_DAY_ACCOUNT)? {
            Some(sealed) => Ok(Some(self.encryption.decrypt(&sealed)?)),
            None => Ok(None),
        }
    }

    async fn handle_event(&self, generation: u64, event: WorkerEvent) {
        if generation != self.generation.load(Ordering::SeqCst) {
            debug!(generation, "Ignoring event from superseded worker");
            return;
        }

        match event {
            WorkerEvent::Started => {
                let mut runtime = self.runtime.lock().await;
                if let Some(worker) = runtime.worker.clone() {
                    let flags = self.graph_flags.clone();
                    runtime.polling.restart(
                        worker.sender(),
                        &self.config.intervals,
                        Some(Arc::new(move |kind| flags.mark(kind))),
                    );
                }
                if let Some(pending) = runtime.pending_start.take() {
                    let _ = pending.send(());
                }
                drop(runtime);

                info!(generation, "Worker started");
                self.publish(SupervisorEvent::Started { generation });
            }
            WorkerEvent::Log { value } => {
                match value.level {
                    LogLevel::Cache => return,
                    LogLevel::Error => error!(target: "timenode::worker", "{}", value.message),
                    LogLevel::Warn => warn!(target: "timenode::worker", "{}", value.message),
                    LogLevel::Debug => debug!(target: "timenode::worker", "{}", value.message),
                    LogLevel::Info | LogLevel::Other => {
                        info!(target: "timenode::worker", "{}", value.message)
                    }
                }
                self.session.write().await.logs.push(value);
            }
            WorkerEvent::UpdateStats(update) => {
                self.session.write().await.stats.apply(&update);
            }
            WorkerEvent::UpdateBalances(update) => {
                self.session.write().await.balances.apply(&update);
            }
            WorkerEvent::ClearStats => {
                self.notify(Notification::success("Cleared the stats."));
                if let Some(worker) = self.current_worker().await {
                    if let Err(e) = worker.send(WorkerCommand::UpdateStats).await {
                        warn!(error = %e, "Failed to request stats");
                    }
                }
            }
            WorkerEvent::GetNetworkInfo(info) => {
                let changed = {
                    let mut session = self.session.write().await;
                    if info.provider_block_number.is_some() {
                        session.provider_block_number = info.provider_block_number;
                    }
                    match (session.net_id, info.net_id) {
                        (previous, Some(net_id)) if previous != Some(net_id) => {
                            session.net_id = Some(net_id);
                            previous.map(|_| net_id)
                        }
                        _ => None,
                    }
                };
                if let Some(net_id) = changed {
                    warn!(net_id, "Provider switched networks");
                    self.publish(SupervisorEvent::NetworkChanged { net_id });
                }
            }
            WorkerEvent::ReceivedClaimedNotExecutedTransactions { transactions } => {
                let pending = self.runtime.lock().await.claimed.take();
                match pending {
                    Some(pending) => {
                        let _ = pending.send(transactions);
                    }
                    None => debug!("Claimed transactions arrived with no request pending"),
                }
            }
            WorkerEvent::BountiesGraphData { data } => {
                self.session.write().await.bounties_graph_data = Some(data);
                self.graph_flags.bounties.store(false, Ordering::SeqCst);
            }
            WorkerEvent::ProcessedTxs { data } => {
                self.session.write().await.processed_txs = Some(data);
                self.graph_flags.processed_txs.store(false, Ordering::SeqCst);
            }
        }
    }

    async fn worker_ended(&self, generation: u64) {
        if generation != self.generation.load(Ordering::SeqCst) {
            return;
        }

        warn!(generation, "Worker event stream ended");
        {
            let mut runtime = self.runtime.lock().await;
            // This task is the pump; let it run to completion
            runtime.pump.take();
            runtime.drop_worker();
            runtime.stop_liveness();
        }
        self.session.write().await.scanning_active = false;
        self.set_state(SupervisorState::Stopped).await;
    }
}

fn spawn_event_pump(
    inner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::Receiver<WorkerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            inner.handle_event(generation, event).await;
        }
        if let Some(inner) = inner.upgrade() {
            inner.worker_ended(generation).await;
        }
    })
}

fn spawn_liveness(
    events: broadcast::Sender<SupervisorEvent>,
    period: std::time::Duration,
    timenode: String,
    day_account: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            debug!(timenode = %timenode, "TimeNode active");
            let _ = events.send(SupervisorEvent::Liveness {
                timenode: timenode.clone(),
                day_account: day_account.clone(),
            });
        }
    })
}
