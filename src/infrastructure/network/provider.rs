// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use alloy::network::Ethereum;
use alloy::primitives::Address;
use alloy::providers::{Provider, RootProvider};
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &str) -> Result<HttpProvider, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        Ok(RootProvider::new_http(url))
    }

    /// Reachability check run once at startup; any failure is fatal.
    pub async fn detect_chain_id(provider: &HttpProvider) -> Result<u64, AppError> {
        provider
            .get_chain_id()
            .await
            .map_err(|e| AppError::Connection(format!("chain_id detect failed: {e}")))
    }

    pub async fn ensure_contract(provider: &HttpProvider, address: Address) -> Result<(), AppError> {
        let code = provider
            .get_code_at(address)
            .await
            .map_err(|e| AppError::Connection(format!("eth_getCode failed: {e}")))?;
        if code.is_empty() {
            return Err(AppError::Config(format!(
                "no contract deployed at {:#x}",
                address
            )));
        }
        Ok(())
    }
}
