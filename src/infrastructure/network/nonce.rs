// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::network::provider::HttpProvider;
use alloy::primitives::Address;
use alloy::providers::Provider;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Nonce source for the single executor identity.
#[derive(Clone)]
pub struct NonceManager {
    provider: HttpProvider,
    address: Address,
    next: Arc<Mutex<Option<u64>>>,
}

impl NonceManager {
    pub fn new(provider: HttpProvider, address: Address) -> Self {
        Self {
            provider,
            address,
            next: Arc::new(Mutex::new(None)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<u64>> {
        self.next.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cached next nonce, or the pending transaction count when nothing is cached.
    pub async fn next_nonce(&self) -> Result<u64, AppError> {
        if let Some(cached) = *self.slot() {
            return Ok(cached);
        }
        let on_chain = self.fetch_pending().await?;
        *self.slot() = Some(on_chain);
        Ok(on_chain)
    }

    /// Record a broadcast so the next dispatch does not reuse `nonce`.
    pub fn mark_used(&self, nonce: u64) {
        *self.slot() = Some(nonce.saturating_add(1));
    }

    /// Drop the cache; the next call re-reads the pending count.
    pub fn invalidate(&self) {
        *self.slot() = None;
        tracing::debug!(target: "nonce", "Nonce cache invalidated");
    }

    async fn fetch_pending(&self) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        let address = self.address;
        retry_async(
            "eth_getTransactionCount",
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn manager() -> NonceManager {
        let provider = HttpProvider::new_http(Url::parse("http://127.0.0.1:1").unwrap());
        NonceManager::new(provider, Address::from([1u8; 20]))
    }

    #[tokio::test]
    async fn cached_nonce_advances_without_rpc() {
        let nonces = manager();
        nonces.mark_used(41);
        assert_eq!(nonces.next_nonce().await.unwrap(), 42);
        nonces.mark_used(42);
        assert_eq!(nonces.next_nonce().await.unwrap(), 43);
    }

    #[tokio::test]
    async fn invalidated_cache_hits_rpc() {
        let nonces = manager();
        nonces.mark_used(7);
        nonces.invalidate();
        // Nothing listens on port 1, so the re-read fails.
        assert!(matches!(
            nonces.next_nonce().await,
            Err(AppError::Connection(_))
        ));
    }
}
