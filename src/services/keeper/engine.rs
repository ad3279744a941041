// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::constants::{
    DEFAULT_MAX_DISPATCH_ATTEMPTS, DEFAULT_MAX_LOG_RANGE, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_RETRY_BACKOFF_BASE_SECS, DEFAULT_RETRY_BACKOFF_MAX_SECS,
};
use crate::common::error::AppError;
use crate::common::retry::backoff_delay;
use crate::common::time_utils::current_unix;
use crate::data::store::RequestStore;
use crate::domain::request::{RequestStatus, short_id};
use crate::network::chain::ChainClient;
use crate::services::keeper::decision::{DecisionPolicy, Verdict, WaitReason};
use crate::services::keeper::dispatch::{DispatchOutcome, Dispatcher};
use crate::services::keeper::ingest::Ingestor;
use crate::services::keeper::predictor::CostPredictor;
use crate::services::keeper::reconcile::Reconciler;
use crate::services::keeper::snapshot::SnapshotSource;
use alloy::primitives::B256;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_DISPATCH_ATTEMPTS,
            backoff_base: Duration::from_secs(DEFAULT_RETRY_BACKOFF_BASE_SECS),
            backoff_max: Duration::from_secs(DEFAULT_RETRY_BACKOFF_MAX_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempts: u32) -> Duration {
        backoff_delay(self.backoff_base, self.backoff_max, attempts)
    }
}

/// Counters for one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ingested: usize,
    pub tracked: usize,
    pub signal_available: bool,
    pub dispatched: usize,
    pub confirmed: usize,
    pub reverted: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub waiting: usize,
    pub backing_off: usize,
    pub removed: usize,
    pub saved: bool,
    pub interrupted: bool,
}

pub struct KeeperOptions {
    pub poll_interval: Duration,
    pub start_block: Option<u64>,
    pub max_log_range: u64,
    pub retry: RetryPolicy,
    pub policy: DecisionPolicy,
}

impl Default for KeeperOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            start_block: None,
            max_log_range: DEFAULT_MAX_LOG_RANGE,
            retry: RetryPolicy::default(),
            policy: DecisionPolicy::default(),
        }
    }
}

/// Polling loop: ingest, decide, dispatch, reconcile, persist, sleep.
pub struct Keeper<C, P> {
    chain: C,
    store: RequestStore,
    snapshots: SnapshotSource<P>,
    ingestor: Ingestor,
    dispatcher: Dispatcher,
    reconciler: Reconciler,
    policy: DecisionPolicy,
    retry: RetryPolicy,
    poll_interval: Duration,
    start_block: Option<u64>,
    shutdown: CancellationToken,
}

impl<C: ChainClient, P: CostPredictor> Keeper<C, P> {
    pub fn new(
        chain: C,
        store: RequestStore,
        predictor: P,
        dispatcher: Dispatcher,
        options: KeeperOptions,
    ) -> Self {
        Self {
            chain,
            store,
            snapshots: SnapshotSource::new(predictor),
            ingestor: Ingestor::new(options.max_log_range),
            dispatcher,
            reconciler: Reconciler::new(),
            policy: options.policy,
            retry: options.retry,
            poll_interval: options.poll_interval,
            start_block: options.start_block,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &RequestStore {
        &self.store
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    /// Token observed inside a tick (between requests and during receipt waits).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), AppError> {
        self.shutdown = shutdown;
        tracing::info!(
            target: "keeper",
            tracked = self.store.len(),
            poll_secs = self.poll_interval.as_secs(),
            "Keeper started"
        );

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            let report = self.tick(current_unix()).await;
            tracing::info!(
                target: "keeper",
                tracked = report.tracked,
                ingested = report.ingested,
                dispatched = report.dispatched,
                confirmed = report.confirmed,
                reverted = report.reverted,
                failed = report.failed,
                abandoned = report.abandoned,
                removed = report.removed,
                signal = report.signal_available,
                saved = report.saved,
                "Tick complete"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.poll_interval) => {}
            }
        }

        if let Err(e) = self.store.flush_if_dirty() {
            tracing::error!(target: "store", error = %e, "Final state flush failed");
        }
        tracing::info!(target: "keeper", tracked = self.store.len(), "Keeper stopped");
        Ok(())
    }

    pub async fn tick(&mut self, now: u64) -> TickReport {
        let mut report = TickReport::default();

        self.ingest(&mut report).await;

        let snapshot = match self.snapshots.capture(&self.chain, now).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(target: "decision", error = %e, "Cost signal unavailable; holding all requests");
                None
            }
        };
        report.signal_available = snapshot.is_some();

        for id in self.store.ids_by_deadline() {
            if self.shutdown.is_cancelled() {
                report.interrupted = true;
                break;
            }
            let Some(req) = self.store.get(&id).cloned() else {
                continue;
            };

            // Only Abandoned survives a tick in a non-dispatchable state.
            let verdict = if !req.status.is_dispatchable() {
                Verdict::Wait(WaitReason::Abandoned)
            } else if req.is_backing_off(now) {
                Verdict::Wait(WaitReason::BackingOff)
            } else {
                self.policy.decide_tick(&req, snapshot.as_ref(), now)
            };
            tracing::debug!(
                target: "decision",
                id = %short_id(&id),
                verdict = %verdict,
                max_cost_gwei = req.max_cost_gwei(),
                secs_to_deadline = %req.seconds_to_deadline(now),
                "Evaluated"
            );

            match verdict {
                Verdict::Wait(WaitReason::BackingOff) => report.backing_off += 1,
                Verdict::Wait(_) => report.waiting += 1,
                Verdict::Execute(_) => self.dispatch(id, now, &mut report).await,
            }
        }

        if !report.interrupted {
            let resolved = self
                .reconciler
                .reconcile(&self.chain, &self.store, &self.shutdown)
                .await;
            for id in resolved {
                if self.store.remove(&id).is_some() {
                    report.removed += 1;
                }
            }
        }

        report.tracked = self.store.len();
        report.saved = match self.store.flush_if_dirty() {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(target: "store", error = %e, "State flush failed; retrying next tick");
                false
            }
        };
        report
    }

    async fn ingest(&mut self, report: &mut TickReport) {
        let from = match self
            .ingestor
            .initial_cursor(&self.chain, self.store.cursor(), self.start_block)
            .await
        {
            Ok(from) => from,
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, "Cannot resolve ingest cursor");
                return;
            }
        };

        let batch = self.ingestor.poll_new(&self.chain, from).await;
        for req in batch.requests {
            let id = req.id;
            if self.store.insert_new(req) {
                report.ingested += 1;
                tracing::info!(target: "ingest", id = %short_id(&id), "Tracking new request");
            }
        }
        self.store.set_cursor(batch.next_block);
    }

    async fn dispatch(&mut self, id: B256, now: u64, report: &mut TickReport) {
        if let Err(e) = self.store.set_status(&id, RequestStatus::Dispatching) {
            tracing::warn!(target: "dispatch", id = %short_id(&id), error = %e, "Cannot dispatch");
            return;
        }
        let Some(req) = self.store.get(&id).cloned() else {
            return;
        };
        report.dispatched += 1;

        let started = Instant::now();
        let outcome = self
            .dispatcher
            .execute(&self.chain, &req, &self.shutdown)
            .await;
        // Backoff counts from when the dispatch finished, not from tick start.
        let finished_at = now.saturating_add(started.elapsed().as_secs());
        if let Err(e) = self.apply_outcome(id, &outcome, finished_at, report) {
            tracing::error!(target: "dispatch", id = %short_id(&id), error = %e, "Failed to record dispatch outcome");
        }
    }

    fn apply_outcome(
        &mut self,
        id: B256,
        outcome: &DispatchOutcome,
        now: u64,
        report: &mut TickReport,
    ) -> Result<(), AppError> {
        if outcome.is_confirmed() {
            if matches!(outcome, DispatchOutcome::ConfirmedSuccess { .. }) {
                report.confirmed += 1;
                tracing::info!(target: "dispatch", id = %short_id(&id), outcome = %outcome.describe(), "Executed");
            } else {
                report.reverted += 1;
                tracing::warn!(target: "dispatch", id = %short_id(&id), outcome = %outcome.describe(), "Execution reverted; not retrying");
            }
            self.store.set_status(&id, RequestStatus::Resolved)?;
            self.store.remove(&id);
            report.removed += 1;
            return Ok(());
        }

        let retry = self.retry;
        let Some(req) = self.store.get_mut(&id) else {
            return Ok(());
        };
        req.attempts = req.attempts.saturating_add(1);
        req.last_error = Some(outcome.describe());
        if req.attempts >= retry.max_attempts {
            req.transition(RequestStatus::Abandoned)?;
            report.abandoned += 1;
            tracing::error!(
                target: "dispatch",
                id = %short_id(&id),
                attempts = req.attempts,
                error = %outcome.describe(),
                "Retry budget exhausted; request abandoned"
            );
        } else {
            req.transition(RequestStatus::Pending)?;
            let delay = retry.backoff(req.attempts);
            req.next_attempt_at = now.saturating_add(delay.as_secs());
            report.failed += 1;
            tracing::warn!(
                target: "dispatch",
                id = %short_id(&id),
                attempts = req.attempts,
                retry_in_secs = delay.as_secs(),
                error = %outcome.describe(),
                "Dispatch failed; will retry"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_doubles_then_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff(1), Duration::from_secs(30));
        assert_eq!(retry.backoff(2), Duration::from_secs(60));
        assert_eq!(retry.backoff(5), Duration::from_secs(480));
        assert_eq!(retry.backoff(6), Duration::from_secs(900));
        assert_eq!(retry.backoff(40), Duration::from_secs(900));
    }
}
