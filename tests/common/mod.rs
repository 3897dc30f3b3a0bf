//! Shared fakes for integration tests
//!
//! - `FakeWorkerSpawner`: in-process worker that records commands
//! - `FakeChain`: fixed chain id and DAY balance
//! - `FakeRegistry`: scripted scheduling registry
//! - keystore and ownership-proof fixtures

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use pbkdf2::pbkdf2_hmac;
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::mpsc;

use timenode::crypto::signature::{address_of, personal_message_hash};
use timenode::crypto::{keccak256, EncryptionBox};
use timenode::network::{ChainClient, ChainError, DayBalance, NetworkDescriptor, NetworkRegistry};
use timenode::storage::{keys, KeyValueStore, MemoryStore};
use timenode::supervisor::{SupervisorConfig, SupervisorEvent, TimeNodeSupervisor};
use timenode::transactions::{
    BlockTag, RegistryClient, RegistryError, RequestData, ScheduleParams, Scheduler, TemporalUnit,
    TransactionRequest, TxParams,
};
use timenode::worker::{BridgeError, WorkerChannels, WorkerCommand, WorkerEvent, WorkerSpawner};

pub const TIMENODE_ADDRESS: &str = "0x487a54e1d033db51c8ee8c03edac2a0f8a6892c6";
pub const PASSWORD: &str = "correct horse battery staple";

/// Let spawned tasks drain. Under a paused clock this only advances time once
/// every task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// =============================================================================
// Worker
// =============================================================================

#[derive(Default)]
struct WorkerState {
    spawns: AtomicUsize,
    silent_start: AtomicBool,
    hold_claimed: AtomicBool,
    claimed: Mutex<Vec<Value>>,
    commands: Mutex<Vec<WorkerCommand>>,
    senders: Mutex<Vec<Option<mpsc::Sender<WorkerEvent>>>>,
    tasks: Mutex<Vec<tokio::task::AbortHandle>>,
}

/// Worker that replies like the real one to START, CLEAR_STATS and the
/// claimed-transactions request.
#[derive(Clone, Default)]
pub struct FakeWorkerSpawner {
    state: Arc<WorkerState>,
}

impl FakeWorkerSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not answer START
    pub fn silent_start(&self) {
        self.state.silent_start.store(true, Ordering::SeqCst);
    }

    /// Do not answer claimed-transaction requests
    pub fn hold_claimed(&self) {
        self.state.hold_claimed.store(true, Ordering::SeqCst);
    }

    pub fn set_claimed(&self, transactions: Vec<Value>) {
        *self.state.claimed.lock().unwrap() = transactions;
    }

    pub fn spawns(&self) -> usize {
        self.state.spawns.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<WorkerCommand> {
        self.state.commands.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.commands().iter().filter(|c| c.name() == name).count()
    }

    pub fn clear(&self) {
        self.state.commands.lock().unwrap().clear();
    }

    /// Event from the most recently spawned worker
    pub async fn emit(&self, event: WorkerEvent) {
        let index = self.spawns();
        self.emit_from(index, event).await;
    }

    /// Event from the `index`-th spawned worker (1-based)
    pub async fn emit_from(&self, index: usize, event: WorkerEvent) {
        let sender = self.state.senders.lock().unwrap()[index - 1].clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    /// Kill the most recent worker, closing its event stream
    pub fn crash(&self) {
        let index = self.spawns();
        self.state.senders.lock().unwrap()[index - 1] = None;
        self.state.tasks.lock().unwrap()[index - 1].abort();
    }
}

#[async_trait]
impl WorkerSpawner for FakeWorkerSpawner {
    async fn spawn(&self) -> Result<WorkerChannels, BridgeError> {
        let (channels, mut command_rx, event_tx) = WorkerChannels::pair();
        self.state.spawns.fetch_add(1, Ordering::SeqCst);
        self.state.senders.lock().unwrap().push(Some(event_tx.clone()));

        let state = self.state.clone();
        let task = tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                let reply = match &command {
                    WorkerCommand::Start(_) if !state.silent_start.load(Ordering::SeqCst) => {
                        Some(WorkerEvent::Started)
                    }
                    WorkerCommand::ClearStats => Some(WorkerEvent::ClearStats),
                    WorkerCommand::GetClaimedNotExecutedTransactions
                        if !state.hold_claimed.load(Ordering::SeqCst) =>
                    {
                        Some(WorkerEvent::ReceivedClaimedNotExecutedTransactions {
                            transactions: state.claimed.lock().unwrap().clone(),
                        })
                    }
                    _ => None,
                };
                state.commands.lock().unwrap().push(command);

                if let Some(event) = reply {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        });
        self.state.tasks.lock().unwrap().push(task.abort_handle());

        Ok(channels)
    }
}

// =============================================================================
// Chain
// =============================================================================

pub struct FakeChain {
    chain_id: u64,
    balance: Mutex<DayBalance>,
    provider_ok: AtomicBool,
    pub balance_lookups: AtomicUsize,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            balance: Mutex::new(DayBalance {
                balance: 0,
                minting_power: 0,
            }),
            provider_ok: AtomicBool::new(true),
            balance_lookups: AtomicUsize::new(0),
        }
    }

    pub fn set_balance(&self, balance: u64, minting_power: u128) {
        *self.balance.lock().unwrap() = DayBalance {
            balance,
            minting_power,
        };
    }

    pub fn set_provider_ok(&self, ok: bool) {
        self.provider_ok.store(ok, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn init(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    fn endpoint(&self) -> &str {
        "http://fake-chain:8545"
    }

    async fn test_provider(&self, _endpoint: &str) -> bool {
        self.provider_ok.load(Ordering::SeqCst)
    }

    async fn day_balance(
        &self,
        network: &NetworkDescriptor,
        _address: &str,
    ) -> Result<DayBalance, ChainError> {
        if network.day_token_address.is_none() {
            return Err(ChainError::UnsupportedNetwork(network.id));
        }
        self.balance_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(*self.balance.lock().unwrap())
    }
}

// =============================================================================
// Keystore and ownership proofs
// =============================================================================

/// A pbkdf2 v3 keystore whose MAC matches `password`
pub fn keystore_json(address: &str, password: &str) -> String {
    let salt = [7u8; 16];
    let ciphertext = [0x5au8; 32];
    let rounds = 2;
    let mut derived = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut derived);

    let mut mac_input = derived[16..32].to_vec();
    mac_input.extend_from_slice(&ciphertext);

    serde_json::json!({
        "version": 3,
        "address": address.trim_start_matches("0x"),
        "crypto": {
            "ciphertext": hex::encode(ciphertext),
            "cipher": "aes-128-ctr",
            "kdf": "pbkdf2",
            "kdfparams": { "c": rounds, "dklen": 32, "prf": "hmac-sha256", "salt": hex::encode(salt) },
            "mac": hex::encode(keccak256(&mac_input))
        }
    })
    .to_string()
}

pub fn day_owner() -> SigningKey {
    SigningKey::from_slice(&[0x42; 32]).unwrap()
}

pub fn day_owner_address() -> String {
    address_of(day_owner().verifying_key())
}

/// MyEtherWallet-style proof that the DAY owner vouches for the TimeNode
pub fn ownership_proof(timenode: &str) -> String {
    let key = day_owner();
    let message = format!("I own DAY tokens for TimeNode {timenode}");
    let hash = personal_message_hash(message.as_bytes());
    let (signature, recovery_id) = key.sign_prehash_recoverable(&hash).unwrap();
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);

    serde_json::json!({
        "address": address_of(key.verifying_key()),
        "msg": message,
        "sig": format!("0x{}", hex::encode(bytes)),
        "version": "2"
    })
    .to_string()
}

// =============================================================================
// Supervisor harness
// =============================================================================

pub struct Harness {
    pub supervisor: TimeNodeSupervisor,
    pub storage: Arc<MemoryStore>,
    pub worker: FakeWorkerSpawner,
    pub chain: Arc<FakeChain>,
    pub events: tokio::sync::broadcast::Receiver<SupervisorEvent>,
}

pub fn encryption() -> EncryptionBox {
    EncryptionBox::new([9u8; 32])
}

impl Harness {
    /// Supervisor on mainnet with no wallet stored
    pub fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStore::new()))
    }

    pub fn with_storage(storage: Arc<MemoryStore>) -> Self {
        let worker = FakeWorkerSpawner::new();
        let chain = Arc::new(FakeChain::new(1));
        let supervisor = TimeNodeSupervisor::new(
            storage.clone(),
            encryption(),
            chain.clone(),
            Arc::new(worker.clone()),
            NetworkRegistry::default(),
            SupervisorConfig::default(),
        )
        .unwrap();
        let events = supervisor.subscribe();

        Self {
            supervisor,
            storage,
            worker,
            chain,
            events,
        }
    }

    /// Supervisor with a keystore already stored
    pub async fn with_wallet() -> Self {
        let harness = Self::new();
        harness
            .supervisor
            .set_keystore(&keystore_json(TIMENODE_ADDRESS, PASSWORD))
            .await
            .unwrap();
        harness
    }

    pub fn persisted(&self, key: &str) -> Option<String> {
        self.storage.load(key).unwrap()
    }

    pub fn scanning_flag(&self) -> bool {
        self.storage.load_flag(keys::SCANNING).unwrap()
    }

    /// Notification messages published so far
    pub fn notifications(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let SupervisorEvent::Notification(n) = event {
                messages.push(n.message);
            }
        }
        messages
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Clone)]
pub struct FakeRequest {
    pub address: String,
    /// `None` makes `fill_data` fail
    pub data: Option<RequestData>,
    pub window_closed: bool,
    pub frozen: bool,
}

impl FakeRequest {
    fn with(address: &str, called: bool, successful: bool, cancelled: bool, closed: bool) -> Self {
        Self {
            address: address.to_string(),
            data: Some(RequestData {
                temporal_unit: TemporalUnit::Block,
                window_start: 6_000_000,
                window_size: 255,
                was_called: called,
                was_successful: successful,
                is_cancelled: cancelled,
            }),
            window_closed: closed,
            frozen: false,
        }
    }

    pub fn pending(address: &str) -> Self {
        Self::with(address, false, false, false, false)
    }

    pub fn executed(address: &str) -> Self {
        Self::with(address, true, true, false, true)
    }

    pub fn failed(address: &str) -> Self {
        Self::with(address, true, false, false, true)
    }

    pub fn cancelled(address: &str) -> Self {
        Self::with(address, false, false, true, false)
    }

    pub fn missed(address: &str) -> Self {
        Self::with(address, false, false, false, true)
    }

    pub fn malformed(address: &str) -> Self {
        Self {
            data: None,
            ..Self::pending(address)
        }
    }
}

struct FakeHandle {
    request: FakeRequest,
    cancelled: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TransactionRequest for FakeHandle {
    fn address(&self) -> &str {
        &self.request.address
    }

    async fn fill_data(&self) -> Result<RequestData, RegistryError> {
        self.request
            .data
            .clone()
            .ok_or_else(|| RegistryError::Malformed(self.request.address.clone()))
    }

    async fn after_execution_window(&self) -> Result<bool, RegistryError> {
        Ok(self.request.window_closed)
    }

    async fn in_freeze_period(&self) -> Result<bool, RegistryError> {
        Ok(self.request.frozen)
    }

    async fn cancel(&self, _params: &TxParams) -> Result<String, RegistryError> {
        self.cancelled
            .lock()
            .unwrap()
            .push(self.request.address.clone());
        Ok(format!("0xcancel{}", self.request.address))
    }
}

#[derive(Default)]
pub struct FakeScheduler {
    pub senders: Mutex<Vec<TxParams>>,
    pub calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl Scheduler for FakeScheduler {
    async fn init_sender(&self, params: TxParams) -> Result<(), RegistryError> {
        self.senders.lock().unwrap().push(params);
        Ok(())
    }

    async fn block_schedule(&self, _params: &ScheduleParams) -> Result<String, RegistryError> {
        self.calls.lock().unwrap().push("block");
        Ok("0xblock".to_string())
    }

    async fn timestamp_schedule(&self, _params: &ScheduleParams) -> Result<String, RegistryError> {
        self.calls.lock().unwrap().push("timestamp");
        Ok("0xtimestamp".to_string())
    }
}

pub struct FakeRegistry {
    requests: Mutex<Vec<FakeRequest>>,
    failing: AtomicBool,
    latest_block: u64,
    pub ranges: Mutex<Vec<(u64, BlockTag)>>,
    pub cancelled: Arc<Mutex<Vec<String>>>,
    pub scheduler: Arc<FakeScheduler>,
}

impl FakeRegistry {
    pub fn new(requests: Vec<FakeRequest>) -> Self {
        Self {
            requests: Mutex::new(requests),
            failing: AtomicBool::new(false),
            latest_block: 6_100_000,
            ranges: Mutex::new(Vec::new()),
            cancelled: Arc::new(Mutex::new(Vec::new())),
            scheduler: Arc::new(FakeScheduler::default()),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_requests(&self, requests: Vec<FakeRequest>) {
        *self.requests.lock().unwrap() = requests;
    }

    pub fn latest(&self) -> u64 {
        self.latest_block
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn get_requests(
        &self,
        start_block: u64,
        end_block: BlockTag,
    ) -> Result<Vec<String>, RegistryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistryError::Network("connection refused".to_string()));
        }
        self.ranges.lock().unwrap().push((start_block, end_block));
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.address.clone())
            .collect())
    }

    fn transaction_request(&self, address: &str) -> Arc<dyn TransactionRequest> {
        let request = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.address == address)
            .cloned()
            .unwrap_or_else(|| FakeRequest::malformed(address));

        Arc::new(FakeHandle {
            request,
            cancelled: self.cancelled.clone(),
        })
    }

    async fn latest_block(&self) -> Result<u64, RegistryError> {
        Ok(self.latest_block)
    }

    fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.scheduler.clone()
    }
}
