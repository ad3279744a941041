// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::{
    DEFAULT_GAS_LIMIT_MULTIPLIER_BPS, DEFAULT_PRIORITY_FEE_GWEI, DEFAULT_RECEIPT_POLL_MS,
    DEFAULT_RECEIPT_TIMEOUT_MS, MIN_GAS_LIMIT_MULTIPLIER_BPS, gwei_to_wei,
};
use crate::domain::request::{TrackedRequest, short_id};
use crate::network::chain::{ChainClient, ExecuteCall};
use crate::network::gas::GasFees;
use alloy::primitives::B256;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchStage {
    Estimate,
    Fees,
    Nonce,
    Broadcast,
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DispatchStage::Estimate => "estimate",
            DispatchStage::Fees => "fees",
            DispatchStage::Nonce => "nonce",
            DispatchStage::Broadcast => "broadcast",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    ConfirmedSuccess { tx_hash: B256 },
    /// Mined with status 0; handled, never retried.
    ConfirmedFailure { tx_hash: B256 },
    /// No receipt before the timeout or shutdown.
    TimedOut { tx_hash: B256 },
    SubmissionError { stage: DispatchStage, reason: String },
}

impl DispatchOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::ConfirmedSuccess { .. } | DispatchOutcome::ConfirmedFailure { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            DispatchOutcome::ConfirmedSuccess { tx_hash } => format!("confirmed {tx_hash:#x}"),
            DispatchOutcome::ConfirmedFailure { tx_hash } => format!("reverted {tx_hash:#x}"),
            DispatchOutcome::TimedOut { tx_hash } => format!("receipt timeout for {tx_hash:#x}"),
            DispatchOutcome::SubmissionError { stage, reason } => format!("{stage}: {reason}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub gas_limit_multiplier_bps: u64,
    pub priority_fee_wei: u128,
    pub receipt_poll: Duration,
    pub receipt_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            gas_limit_multiplier_bps: DEFAULT_GAS_LIMIT_MULTIPLIER_BPS,
            priority_fee_wei: gwei_to_wei(DEFAULT_PRIORITY_FEE_GWEI),
            receipt_poll: Duration::from_millis(DEFAULT_RECEIPT_POLL_MS),
            receipt_timeout: Duration::from_millis(DEFAULT_RECEIPT_TIMEOUT_MS),
        }
    }
}

/// Estimate, price, sign, broadcast and confirm one `executeTransaction`.
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// `ceil(raw * bps / 10_000)`, never below the raw estimate.
    pub fn padded_gas_limit(raw: u64, multiplier_bps: u64) -> u64 {
        let bps = u128::from(multiplier_bps.max(MIN_GAS_LIMIT_MULTIPLIER_BPS));
        let padded = (u128::from(raw) * bps).div_ceil(10_000);
        u64::try_from(padded).unwrap_or(u64::MAX)
    }

    pub async fn execute<C: ChainClient>(
        &self,
        chain: &C,
        req: &TrackedRequest,
        shutdown: &CancellationToken,
    ) -> DispatchOutcome {
        let id = short_id(&req.id);

        let raw_gas = match chain.estimate_execute_gas(req.id).await {
            Ok(gas) => gas,
            Err(e) => return submission_error(DispatchStage::Estimate, e),
        };
        let gas_limit = Self::padded_gas_limit(raw_gas, self.config.gas_limit_multiplier_bps);

        let fees = match chain.base_fee_per_gas().await {
            Ok(base) => GasFees::from_base_fee(base, self.config.priority_fee_wei),
            Err(e) => return submission_error(DispatchStage::Fees, e),
        };
        let nonce = match chain.next_nonce().await {
            Ok(n) => n,
            Err(e) => return submission_error(DispatchStage::Nonce, e),
        };

        let call = ExecuteCall {
            id: req.id,
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            nonce,
        };
        let tx_hash = match chain.broadcast_execute(&call).await {
            Ok(hash) => hash,
            Err(e) => {
                chain.reset_nonce();
                return submission_error(DispatchStage::Broadcast, e);
            }
        };
        tracing::info!(
            target: "dispatch",
            id = %id,
            tx = %format!("{tx_hash:#x}"),
            gas_limit,
            max_fee = %fees.max_fee_per_gas,
            nonce,
            "Execution broadcast"
        );

        match self.await_receipt(chain, tx_hash, shutdown).await {
            Some(true) => DispatchOutcome::ConfirmedSuccess { tx_hash },
            Some(false) => DispatchOutcome::ConfirmedFailure { tx_hash },
            None => {
                chain.reset_nonce();
                DispatchOutcome::TimedOut { tx_hash }
            }
        }
    }

    async fn await_receipt<C: ChainClient>(
        &self,
        chain: &C,
        tx_hash: B256,
        shutdown: &CancellationToken,
    ) -> Option<bool> {
        let deadline = Instant::now() + self.config.receipt_timeout;
        loop {
            match chain.receipt_status(tx_hash).await {
                Ok(Some(status)) => return Some(status),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(target: "dispatch", tx = %tx_hash, error = %e, "Receipt poll failed");
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "dispatch", tx = %tx_hash, "Shutdown requested; abandoning receipt wait");
                    return None;
                }
                _ = sleep(self.config.receipt_poll) => {}
            }
        }
    }
}

fn submission_error(stage: DispatchStage, e: impl fmt::Display) -> DispatchOutcome {
    DispatchOutcome::SubmissionError {
        stage,
        reason: e.to_string(),
    }
}
