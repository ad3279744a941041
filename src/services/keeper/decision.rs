// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::{FAVORABLE_MARGIN, URGENCY_WINDOW_SECS};
use crate::domain::request::{CostSnapshot, TrackedRequest};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteReason {
    /// Under the ceiling and inside the urgency window (or past the deadline).
    Urgent,
    /// Under the ceiling and no worse than the predicted cost plus margin.
    Favorable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitReason {
    AboveCeiling,
    Unfavorable,
    SignalUnavailable,
    BackingOff,
    Abandoned,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Execute(ExecuteReason),
    Wait(WaitReason),
}

impl Verdict {
    pub fn is_execute(&self) -> bool {
        matches!(self, Verdict::Execute(_))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Execute(ExecuteReason::Urgent) => "execute:urgent",
            Verdict::Execute(ExecuteReason::Favorable) => "execute:favorable",
            Verdict::Wait(WaitReason::AboveCeiling) => "wait:above_ceiling",
            Verdict::Wait(WaitReason::Unfavorable) => "wait:unfavorable",
            Verdict::Wait(WaitReason::SignalUnavailable) => "wait:signal_unavailable",
            Verdict::Wait(WaitReason::BackingOff) => "wait:backing_off",
            Verdict::Wait(WaitReason::Abandoned) => "wait:abandoned",
        };
        f.write_str(label)
    }
}

/// Deadline-aware execute/wait policy. Pure: same inputs, same verdict.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecisionPolicy {
    pub urgency_window_secs: i64,
    pub favorable_margin: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            urgency_window_secs: URGENCY_WINDOW_SECS,
            favorable_margin: FAVORABLE_MARGIN,
        }
    }
}

impl DecisionPolicy {
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn decide(&self, req: &TrackedRequest, snapshot: &CostSnapshot, now: u64) -> Verdict {
        // The ceiling is absolute; nothing overrides it.
        if !(snapshot.current_unit_cost < req.max_cost_gwei()) {
            return Verdict::Wait(WaitReason::AboveCeiling);
        }
        if req.seconds_to_deadline(now) < i128::from(self.urgency_window_secs) {
            return Verdict::Execute(ExecuteReason::Urgent);
        }
        if snapshot.current_unit_cost < snapshot.predicted_unit_cost * self.favorable_margin {
            Verdict::Execute(ExecuteReason::Favorable)
        } else {
            Verdict::Wait(WaitReason::Unfavorable)
        }
    }

    /// `decide` for a tick whose snapshot may be missing.
    pub fn decide_tick(
        &self,
        req: &TrackedRequest,
        snapshot: Option<&CostSnapshot>,
        now: u64,
    ) -> Verdict {
        match snapshot {
            Some(snapshot) => self.decide(req, snapshot, now),
            None => Verdict::Wait(WaitReason::SignalUnavailable),
        }
    }
}
