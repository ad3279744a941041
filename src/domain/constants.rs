// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

// =============================================================================
// DECISION POLICY
// =============================================================================

/// Requests closer than this to their deadline execute whenever under the ceiling.
pub const URGENCY_WINDOW_SECS: i64 = 900;

/// Current cost must sit below `predicted * FAVORABLE_MARGIN` to count as a good time.
pub const FAVORABLE_MARGIN: f64 = 1.05;

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const DEFAULT_PRIORITY_FEE_GWEI: u64 = 2;

/// 1.2x headroom on top of `eth_estimateGas`.
pub const DEFAULT_GAS_LIMIT_MULTIPLIER_BPS: u64 = 12_000;
pub const MIN_GAS_LIMIT_MULTIPLIER_BPS: u64 = 10_000;

// =============================================================================
// LOOP & RECEIPT TUNING
// =============================================================================

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_RECEIPT_POLL_MS: u64 = 1_000;
pub const DEFAULT_RECEIPT_TIMEOUT_MS: u64 = 120_000;
pub const MIN_RECEIPT_POLL_MS: u64 = 100;
pub const MIN_RECEIPT_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_MAX_LOG_RANGE: u64 = 2_000;

// =============================================================================
// RETRY BUDGET
// =============================================================================

pub const DEFAULT_MAX_DISPATCH_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BACKOFF_BASE_SECS: u64 = 30;
pub const DEFAULT_RETRY_BACKOFF_MAX_SECS: u64 = 900;

// =============================================================================
// FEATURE WINDOW
// =============================================================================

pub const SECS_PER_HOUR: u64 = 3_600;
/// Hours of history behind the rolling-average feature.
pub const ROLLING_WINDOW_HOURS: usize = 24;

// =============================================================================
// FILES
// =============================================================================

pub const DEFAULT_STATE_FILE: &str = "tracked_transactions.json";
pub const DEFAULT_MODEL_FILE: &str = "gas_predictor.json";

pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / WEI_PER_GWEI as f64
}

pub fn gwei_to_wei(gwei: u64) -> u128 {
    (gwei as u128).saturating_mul(WEI_PER_GWEI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gwei_conversions_line_up() {
        assert_eq!(gwei_to_wei(2), 2_000_000_000);
        assert!((wei_to_gwei(47_250_000_000) - 47.25).abs() < 1e-9);
    }
}
