// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::constants::{ROLLING_WINDOW_HOURS, SECS_PER_HOUR};
use crate::common::time_utils::calendar_fields;
use std::collections::VecDeque;

pub const FEATURE_COUNT: usize = 6;

/// Model input, in this fixed order: current cost (gwei), hour of day,
/// day of week (Monday = 0), month, 24h rolling average (gwei), 1h lag (gwei).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn build(current_gwei: f64, now: u64, window: &FeeWindow) -> Self {
        let cal = calendar_fields(now);
        Self([
            current_gwei,
            f64::from(cal.hour),
            f64::from(cal.weekday),
            f64::from(cal.month),
            window.rolling_average(now).unwrap_or(current_gwei),
            window.lagged(now).unwrap_or(current_gwei),
        ])
    }

    pub fn current(&self) -> f64 {
        self.0[0]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// In-memory history of observed unit costs.
///
/// Samples older than the rolling window plus one hour of lag are pruned on
/// every `record`.
#[derive(Clone, Debug, Default)]
pub struct FeeWindow {
    samples: VecDeque<(u64, f64)>,
}

impl FeeWindow {
    pub fn new() -> Self {
        Self::default()
    }

    fn window_secs() -> u64 {
        ROLLING_WINDOW_HOURS as u64 * SECS_PER_HOUR
    }

    pub fn record(&mut self, at: u64, cost_gwei: f64) {
        if !cost_gwei.is_finite() {
            return;
        }
        if let Some(&(last, _)) = self.samples.back()
            && at < last
        {
            return;
        }
        self.samples.push_back((at, cost_gwei));

        let horizon = at.saturating_sub(Self::window_secs() + SECS_PER_HOUR);
        while let Some(&(ts, _)) = self.samples.front() {
            if ts >= horizon {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Mean over the last 24 hours. `None` until an hour of history exists.
    pub fn rolling_average(&self, now: u64) -> Option<f64> {
        let (oldest, _) = *self.samples.front()?;
        if now.saturating_sub(oldest) < SECS_PER_HOUR {
            return None;
        }
        let since = now.saturating_sub(Self::window_secs());
        let (sum, n) = self
            .samples
            .iter()
            .filter(|(ts, _)| *ts >= since && *ts <= now)
            .fold((0.0, 0usize), |(sum, n), (_, v)| (sum + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Newest sample at least one hour old, if it is under two hours old.
    pub fn lagged(&self, now: u64) -> Option<f64> {
        let cutoff = now.checked_sub(SECS_PER_HOUR)?;
        let floor = cutoff.saturating_sub(SECS_PER_HOUR);
        self.samples
            .iter()
            .rev()
            .find(|(ts, _)| *ts <= cutoff)
            .filter(|(ts, _)| *ts > floor)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
