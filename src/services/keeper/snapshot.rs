// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::constants::wei_to_gwei;
use crate::common::error::AppError;
use crate::domain::request::CostSnapshot;
use crate::network::chain::ChainClient;
use crate::services::keeper::features::{FeatureVector, FeeWindow};
use crate::services::keeper::predictor::CostPredictor;

/// Produces the single `CostSnapshot` every request in a tick is judged against.
pub struct SnapshotSource<P> {
    predictor: P,
    window: FeeWindow,
}

impl<P: CostPredictor> SnapshotSource<P> {
    pub fn new(predictor: P) -> Self {
        Self {
            predictor,
            window: FeeWindow::new(),
        }
    }

    pub async fn capture<C: ChainClient>(
        &mut self,
        chain: &C,
        now: u64,
    ) -> Result<CostSnapshot, AppError> {
        let base_fee = chain.base_fee_per_gas().await?;
        let current = wei_to_gwei(base_fee);
        self.window.record(now, current);

        let features = FeatureVector::build(current, now, &self.window);
        let predicted = self.predictor.predict(&features)?;

        tracing::debug!(
            target: "decision",
            current_gwei = current,
            predicted_gwei = predicted,
            features = ?features.as_slice(),
            "Cost snapshot"
        );
        Ok(CostSnapshot {
            current_unit_cost: current,
            predicted_unit_cost: predicted,
            observed_at: now,
        })
    }

    pub fn window(&self) -> &FeeWindow {
        &self.window
    }
}
