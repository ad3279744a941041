#![allow(dead_code)]

use alloy::primitives::{Address, B256, Bytes, U256};
use oxidity_keeper::common::constants::WEI_PER_GWEI;
use oxidity_keeper::data::store::RequestStore;
use oxidity_keeper::domain::error::AppError;
use oxidity_keeper::domain::request::{RemoteRequest, TrackedRequest};
use oxidity_keeper::keeper::features::FeatureVector;
use oxidity_keeper::keeper::{
    CostPredictor, DispatchConfig, Dispatcher, Keeper, KeeperOptions, RetryPolicy,
};
use oxidity_keeper::network::chain::{ChainClient, ExecuteCall, SubmittedEvent};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const NOW: u64 = 1_700_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptScript {
    Success,
    Revert,
    Never,
}

/// Scripted in-memory chain. Every trait call bumps `calls`.
pub struct FakeChain {
    pub head: Mutex<u64>,
    pub events: Mutex<Vec<SubmittedEvent>>,
    pub remote: Mutex<HashMap<B256, RemoteRequest>>,
    /// `None` makes the fee read fail.
    pub base_fee_wei: Mutex<Option<u128>>,
    pub estimate_fails: Mutex<bool>,
    pub logs_fail_from: Mutex<Option<u64>>,
    pub receipt: Mutex<ReceiptScript>,
    pub broadcasts: Mutex<Vec<ExecuteCall>>,
    pub nonce: Mutex<u64>,
    pub nonce_resets: AtomicUsize,
    pub calls: AtomicUsize,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            head: Mutex::new(100),
            events: Mutex::new(Vec::new()),
            remote: Mutex::new(HashMap::new()),
            base_fee_wei: Mutex::new(Some(40 * WEI_PER_GWEI)),
            estimate_fails: Mutex::new(false),
            logs_fail_from: Mutex::new(None),
            receipt: Mutex::new(ReceiptScript::Success),
            broadcasts: Mutex::new(Vec::new()),
            nonce: Mutex::new(0),
            nonce_resets: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeChain {
    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_base_fee_gwei(&self, gwei: u128) {
        *self.base_fee_wei.lock().unwrap() = Some(gwei * WEI_PER_GWEI);
    }

    pub fn set_receipt(&self, script: ReceiptScript) {
        *self.receipt.lock().unwrap() = script;
    }

    pub fn put_remote(&self, id: B256, remote: RemoteRequest) {
        self.remote.lock().unwrap().insert(id, remote);
    }

    pub fn submit(&self, id: B256, block: u64, remote: RemoteRequest) {
        self.events.lock().unwrap().push(SubmittedEvent {
            id,
            submitter: remote.submitter,
            target: remote.target,
            block_number: block,
        });
        self.put_remote(id, remote);
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.lock().unwrap().len()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl ChainClient for FakeChain {
    async fn head_block(&self) -> Result<u64, AppError> {
        self.touch();
        Ok(*self.head.lock().unwrap())
    }

    async fn submitted_events(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<SubmittedEvent>, AppError> {
        self.touch();
        if let Some(fail_from) = *self.logs_fail_from.lock().unwrap()
            && to >= fail_from
        {
            return Err(AppError::Connection("eth_getLogs unavailable".into()));
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.block_number >= from && e.block_number <= to)
            .cloned()
            .collect())
    }

    async fn request_state(&self, id: B256) -> Result<RemoteRequest, AppError> {
        self.touch();
        self.remote
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::Connection("call reverted".into()))
    }

    async fn base_fee_per_gas(&self) -> Result<u128, AppError> {
        self.touch();
        self.base_fee_wei
            .lock()
            .unwrap()
            .ok_or_else(|| AppError::Connection("no block".into()))
    }

    async fn estimate_execute_gas(&self, id: B256) -> Result<u64, AppError> {
        self.touch();
        if *self.estimate_fails.lock().unwrap() {
            return Err(AppError::Transaction {
                hash: format!("{id:#x}"),
                reason: "execution reverted".into(),
            });
        }
        Ok(80_000)
    }

    async fn next_nonce(&self) -> Result<u64, AppError> {
        self.touch();
        Ok(*self.nonce.lock().unwrap())
    }

    async fn broadcast_execute(&self, call: &ExecuteCall) -> Result<B256, AppError> {
        self.touch();
        self.broadcasts.lock().unwrap().push(*call);
        *self.nonce.lock().unwrap() = call.nonce + 1;
        if *self.receipt.lock().unwrap() == ReceiptScript::Success
            && let Some(remote) = self.remote.lock().unwrap().get_mut(&call.id)
        {
            remote.executed = true;
        }
        Ok(B256::with_last_byte((call.nonce + 1) as u8))
    }

    async fn receipt_status(&self, _hash: B256) -> Result<Option<bool>, AppError> {
        self.touch();
        Ok(match *self.receipt.lock().unwrap() {
            ReceiptScript::Success => Some(true),
            ReceiptScript::Revert => Some(false),
            ReceiptScript::Never => None,
        })
    }

    fn reset_nonce(&self) {
        self.nonce_resets.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns a fixed prediction, or fails when `None`.
pub struct FixedPredictor(pub Option<f64>);

impl CostPredictor for FixedPredictor {
    fn predict(&self, _features: &FeatureVector) -> Result<f64, AppError> {
        self.0
            .ok_or_else(|| AppError::Prediction("model offline".into()))
    }
}

pub fn id(n: u8) -> B256 {
    B256::from([n; 32])
}

pub fn remote(max_gwei: u128, deadline: u64) -> RemoteRequest {
    RemoteRequest {
        submitter: Address::from([0x11; 20]),
        target: Address::from([0x22; 20]),
        data: Bytes::from(vec![0xca, 0xfe]),
        max_cost: U256::from(max_gwei * WEI_PER_GWEI),
        deadline: U256::from(deadline),
        executed: false,
    }
}

pub fn tracked(n: u8, max_gwei: u128, deadline: u64) -> TrackedRequest {
    remote(max_gwei, deadline).into_tracked(id(n)).unwrap()
}

pub fn fast_dispatcher() -> Dispatcher {
    dispatcher_with_timeout(Duration::from_millis(30))
}

pub fn dispatcher_with_timeout(receipt_timeout: Duration) -> Dispatcher {
    Dispatcher::new(DispatchConfig {
        receipt_poll: Duration::from_millis(5),
        receipt_timeout,
        ..DispatchConfig::default()
    })
}

pub fn options(retry: RetryPolicy) -> KeeperOptions {
    KeeperOptions {
        start_block: Some(90),
        max_log_range: 10,
        retry,
        ..KeeperOptions::default()
    }
}

/// Store pre-seeded with `requests`, cursor past the fake head, already flushed.
pub fn seeded_store(path: &Path, requests: Vec<TrackedRequest>) -> RequestStore {
    let mut store = RequestStore::empty(path);
    for req in requests {
        store.upsert(req);
    }
    store.set_cursor(101);
    store.save().unwrap();
    store
}

pub fn keeper(
    chain: FakeChain,
    store: RequestStore,
    predicted: Option<f64>,
    retry: RetryPolicy,
) -> Keeper<FakeChain, FixedPredictor> {
    keeper_with_dispatcher(chain, store, predicted, retry, fast_dispatcher())
}

pub fn keeper_with_dispatcher(
    chain: FakeChain,
    store: RequestStore,
    predicted: Option<f64>,
    retry: RetryPolicy,
    dispatcher: Dispatcher,
) -> Keeper<FakeChain, FixedPredictor> {
    Keeper::new(
        chain,
        store,
        FixedPredictor(predicted),
        dispatcher,
        options(retry),
    )
}
