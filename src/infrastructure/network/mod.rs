// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod chain;
pub mod client;
pub use chain::{ChainClient, ExecuteCall, SubmittedEvent};
pub use client::AlloyChainClient;

pub mod gas;
pub mod nonce;
pub mod provider;
