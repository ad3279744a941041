// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::data::store::RequestStore;
use crate::domain::request::short_id;
use crate::network::chain::ChainClient;
use alloy::primitives::B256;
use tokio_util::sync::CancellationToken;

/// Re-reads contract state for every tracked id and reports which ones are done.
#[derive(Default)]
pub struct Reconciler;

impl Reconciler {
    pub fn new() -> Self {
        Self
    }

    /// Ids executed remotely (by anyone) or cancelled. Read failures keep the id.
    pub async fn reconcile<C: ChainClient>(
        &self,
        chain: &C,
        store: &RequestStore,
        shutdown: &CancellationToken,
    ) -> Vec<B256> {
        let mut resolved = Vec::new();
        for id in store.ids() {
            if shutdown.is_cancelled() {
                break;
            }
            match chain.request_state(id).await {
                Ok(remote) if remote.is_resolved() => {
                    tracing::info!(
                        target: "reconcile",
                        id = %short_id(&id),
                        executed = remote.executed,
                        "Resolved on-chain; dropping"
                    );
                    resolved.push(id);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(target: "reconcile", id = %short_id(&id), error = %e, "State read failed; keeping");
                }
            }
        }
        resolved
    }
}
