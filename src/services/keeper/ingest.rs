// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::domain::request::{TrackedRequest, short_id};
use crate::network::chain::ChainClient;

/// Requests discovered by one poll plus the block the next poll starts from.
#[derive(Debug, Default)]
pub struct IngestBatch {
    pub requests: Vec<TrackedRequest>,
    pub next_block: u64,
}

/// Discovers `TransactionSubmitted` requests in bounded block ranges.
pub struct Ingestor {
    max_log_range: u64,
}

impl Ingestor {
    pub fn new(max_log_range: u64) -> Self {
        Self {
            max_log_range: max_log_range.max(1),
        }
    }

    /// Persisted cursor, else the configured start block, else the current head.
    pub async fn initial_cursor<C: ChainClient>(
        &self,
        chain: &C,
        persisted: Option<u64>,
        start_block: Option<u64>,
    ) -> Result<u64, AppError> {
        if let Some(cursor) = persisted.or(start_block) {
            return Ok(cursor);
        }
        let head = chain.head_block().await?;
        tracing::info!(target: "ingest", head, "No ingest cursor; starting at chain head");
        Ok(head)
    }

    pub async fn poll_new<C: ChainClient>(&self, chain: &C, from_block: u64) -> IngestBatch {
        let mut batch = IngestBatch {
            requests: Vec::new(),
            next_block: from_block,
        };

        let head = match chain.head_block().await {
            Ok(head) => head,
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, "Head read failed; skipping ingest");
                return batch;
            }
        };
        if from_block > head {
            return batch;
        }

        let mut start = from_block;
        while start <= head {
            let end = start.saturating_add(self.max_log_range - 1).min(head);
            match self.scan_range(chain, start, end, &mut batch.requests).await {
                Ok(()) => batch.next_block = end.saturating_add(1),
                Err(e) => {
                    tracing::warn!(
                        target: "ingest",
                        from = start,
                        to = end,
                        error = %e,
                        "Ingest stopped; range will be re-read next tick"
                    );
                    break;
                }
            }
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }

        if !batch.requests.is_empty() {
            tracing::info!(
                target: "ingest",
                found = batch.requests.len(),
                next_block = batch.next_block,
                "New requests discovered"
            );
        }
        batch
    }

    async fn scan_range<C: ChainClient>(
        &self,
        chain: &C,
        from: u64,
        to: u64,
        out: &mut Vec<TrackedRequest>,
    ) -> Result<(), AppError> {
        let events = chain.submitted_events(from, to).await?;
        for event in events {
            let remote = chain.request_state(event.id).await?;
            if remote.is_resolved() {
                tracing::debug!(target: "ingest", id = %short_id(&event.id), "Already resolved on-chain; skipping");
                continue;
            }
            match remote.into_tracked(event.id) {
                Ok(req) => {
                    tracing::debug!(
                        target: "ingest",
                        id = %short_id(&req.id),
                        block = event.block_number,
                        max_cost_gwei = req.max_cost_gwei(),
                        deadline = req.deadline,
                        "Observed submission"
                    );
                    out.push(req);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", id = %short_id(&event.id), error = %e, "Rejected submission");
                }
            }
        }
        Ok(())
    }
}
