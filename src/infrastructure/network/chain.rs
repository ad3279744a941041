// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::request::RemoteRequest;
use alloy::primitives::{Address, B256};

/// A decoded `TransactionSubmitted` log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedEvent {
    pub id: B256,
    pub submitter: Address,
    pub target: Address,
    pub block_number: u64,
}

/// Fully priced `executeTransaction(id)` call, ready to sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecuteCall {
    pub id: B256,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub nonce: u64,
}

/// Everything the keeper needs from the chain and the `TransactionManager` contract.
///
/// Calls are awaited one at a time from a single task, so implementations
/// need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    async fn head_block(&self) -> Result<u64, AppError>;

    /// `TransactionSubmitted` logs in `[from, to]`, in chain order.
    async fn submitted_events(&self, from: u64, to: u64)
    -> Result<Vec<SubmittedEvent>, AppError>;

    /// `transactionRequests(id)`.
    async fn request_state(&self, id: B256) -> Result<RemoteRequest, AppError>;

    async fn base_fee_per_gas(&self) -> Result<u128, AppError>;

    async fn estimate_execute_gas(&self, id: B256) -> Result<u64, AppError>;

    async fn next_nonce(&self) -> Result<u64, AppError>;

    /// Sign and broadcast; returns the transaction hash.
    async fn broadcast_execute(&self, call: &ExecuteCall) -> Result<B256, AppError>;

    /// `None` while the transaction is not yet mined.
    async fn receipt_status(&self, hash: B256) -> Result<Option<bool>, AppError>;

    /// Forget any locally tracked nonce.
    fn reset_nonce(&self);
}
