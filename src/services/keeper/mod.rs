// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod decision;
pub mod dispatch;
pub mod engine;
pub mod features;
pub mod ingest;
pub mod predictor;
pub mod reconcile;
pub mod snapshot;

pub use decision::{DecisionPolicy, ExecuteReason, Verdict, WaitReason};
pub use dispatch::{DispatchConfig, DispatchOutcome, DispatchStage, Dispatcher};
pub use engine::{Keeper, KeeperOptions, RetryPolicy, TickReport};
pub use predictor::{CostPredictor, LinearCostModel};
