// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::wei_to_gwei;
use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Dispatching,
    Resolved,
    /// Retry budget exhausted; kept only until the remote side resolves it.
    Abandoned,
    Removed,
}

impl RequestStatus {
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        match (self, next) {
            (Removed, _) => false,
            (_, Removed) => true,
            (Pending, Dispatching) => true,
            (Dispatching, Pending | Resolved | Abandoned) => true,
            _ => false,
        }
    }

    pub fn is_dispatchable(self) -> bool {
        matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Dispatching => "dispatching",
            RequestStatus::Resolved => "resolved",
            RequestStatus::Abandoned => "abandoned",
            RequestStatus::Removed => "removed",
        };
        f.write_str(label)
    }
}

/// A registered pending call awaiting a scheduler-chosen submission time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedRequest {
    pub id: B256,
    pub submitter: Address,
    pub target: Address,
    pub payload: Bytes,
    /// Ceiling on acceptable base fee, wei per gas.
    pub max_cost: u128,
    /// Absolute UNIX seconds.
    pub deadline: u64,
    pub status: RequestStatus,
    pub attempts: u32,
    pub next_attempt_at: u64,
    pub last_error: Option<String>,
}

impl TrackedRequest {
    pub fn new(
        id: B256,
        submitter: Address,
        target: Address,
        payload: Bytes,
        max_cost: u128,
        deadline: u64,
    ) -> Result<Self, AppError> {
        if max_cost == 0 {
            return Err(AppError::Validation {
                field: "max_cost".into(),
                message: format!("request {} has a zero fee ceiling", short_id(&id)),
            });
        }
        Ok(Self {
            id,
            submitter,
            target,
            payload,
            max_cost,
            deadline,
            status: RequestStatus::Pending,
            attempts: 0,
            next_attempt_at: 0,
            last_error: None,
        })
    }

    pub fn max_cost_gwei(&self) -> f64 {
        wei_to_gwei(self.max_cost)
    }

    /// Seconds left until the deadline; negative once it has passed.
    pub fn seconds_to_deadline(&self, now: u64) -> i128 {
        self.deadline as i128 - now as i128
    }

    pub fn is_backing_off(&self, now: u64) -> bool {
        self.next_attempt_at > now
    }

    pub fn transition(&mut self, next: RequestStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::Validation {
                field: "status".into(),
                message: format!(
                    "illegal transition {} -> {} for {}",
                    self.status,
                    next,
                    short_id(&self.id)
                ),
            });
        }
        self.status = next;
        Ok(())
    }
}

/// One consistent read of live and predicted unit cost, shared by a whole tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostSnapshot {
    pub current_unit_cost: f64,
    pub predicted_unit_cost: f64,
    pub observed_at: u64,
}

/// Authoritative view of a request as returned by `transactionRequests(id)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRequest {
    pub submitter: Address,
    pub target: Address,
    pub data: Bytes,
    pub max_cost: U256,
    pub deadline: U256,
    pub executed: bool,
}

impl RemoteRequest {
    /// Executed by anyone, cancelled, or never existed (zero submitter).
    pub fn is_resolved(&self) -> bool {
        self.executed || self.submitter == Address::ZERO
    }

    pub fn into_tracked(self, id: B256) -> Result<TrackedRequest, AppError> {
        let max_cost = u128::try_from(self.max_cost).unwrap_or(u128::MAX);
        let deadline = u64::try_from(self.deadline).unwrap_or(u64::MAX);
        TrackedRequest::new(id, self.submitter, self.target, self.data, max_cost, deadline)
    }
}

/// `0x1234abcd…` form used in log lines.
pub fn short_id(id: &B256) -> String {
    let full = format!("{id:#x}");
    full.chars().take(10).collect()
}
