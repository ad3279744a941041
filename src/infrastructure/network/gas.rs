// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::network::provider::HttpProvider;
use alloy::providers::Provider;
use alloy::rpc::types::BlockNumberOrTag;
use std::time::Duration;

/// EIP-1559 fee envelope for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub base_fee_per_gas: u128,
}

impl GasFees {
    /// Latest base fee plus a fixed tip; the tip doubles as the priority fee.
    pub fn from_base_fee(base_fee_per_gas: u128, tip: u128) -> Self {
        Self {
            max_fee_per_gas: base_fee_per_gas.saturating_add(tip),
            max_priority_fee_per_gas: tip,
            base_fee_per_gas,
        }
    }
}

/// Reads the latest block's base fee. A failed read is always an error.
#[derive(Clone)]
pub struct GasOracle {
    provider: HttpProvider,
}

impl GasOracle {
    pub fn new(provider: HttpProvider) -> Self {
        Self { provider }
    }

    pub async fn latest_base_fee(&self) -> Result<u128, AppError> {
        let provider = self.provider.clone();
        let block = retry_async(
            "eth_getBlockByNumber",
            move |_| {
                let provider = provider.clone();
                async move { provider.get_block_by_number(BlockNumberOrTag::Latest).await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Latest block fetch failed: {}", e)))?;

        block
            .and_then(|b| b.header.base_fee_per_gas)
            .map(u128::from)
            .ok_or_else(|| AppError::Connection("Latest block has no base fee".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tip_is_added_on_top_of_base_fee() {
        let fees = GasFees::from_base_fee(30_000_000_000, 2_000_000_000);
        assert_eq!(fees.max_fee_per_gas, 32_000_000_000);
        assert_eq!(fees.max_priority_fee_per_gas, 2_000_000_000);
        assert_eq!(fees.base_fee_per_gas, 30_000_000_000);
    }

    #[tokio::test]
    async fn unreachable_node_is_an_error() {
        let provider = HttpProvider::new_http(url::Url::parse("http://127.0.0.1:1").unwrap());
        let oracle = GasOracle::new(provider);
        assert!(matches!(
            oracle.latest_base_fee().await,
            Err(AppError::Connection(_))
        ));
    }

    #[test]
    fn fee_math_saturates() {
        let fees = GasFees::from_base_fee(u128::MAX, 5);
        assert_eq!(fees.max_fee_per_gas, u128::MAX);
    }
}
