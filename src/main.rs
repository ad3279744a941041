// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::signers::local::PrivateKeySigner;
use clap::Parser;
use oxidity_keeper::app::config::KeeperSettings;
use oxidity_keeper::app::logging::setup_logging;
use oxidity_keeper::data::store::RequestStore;
use oxidity_keeper::domain::error::AppError;
use oxidity_keeper::keeper::{
    DecisionPolicy, DispatchConfig, Dispatcher, Keeper, KeeperOptions, LinearCostModel,
    RetryPolicy,
};
use oxidity_keeper::network::client::AlloyChainClient;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "oxidity keeper")]
struct Cli {
    /// Path to config file (default: config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let settings = KeeperSettings::load_with_path(cli.config.as_deref())?;
    setup_logging(if settings.debug { "debug" } else { "info" }, cli.log_json);

    let signer = PrivateKeySigner::from_str(&settings.executor_private_key()?)
        .map_err(|e| AppError::Config(format!("Invalid executor key: {}", e)))?;
    let contract = settings.contract_address()?;
    let rpc_url = settings.rpc_url()?;

    let model_path = settings.model_path()?;
    let model = LinearCostModel::load(&model_path)?;
    tracing::info!(target: "config", model = %model_path.display(), "Loaded cost model");

    let store = RequestStore::load(settings.state_path())?;

    let chain = AlloyChainClient::connect(&rpc_url, contract, signer, settings.chain_id).await?;

    let dispatcher = Dispatcher::new(DispatchConfig {
        gas_limit_multiplier_bps: settings.gas_limit_multiplier_bps_value(),
        priority_fee_wei: settings.priority_fee_wei(),
        receipt_poll: Duration::from_millis(settings.receipt_poll_ms_value()),
        receipt_timeout: Duration::from_millis(settings.receipt_timeout_ms_value()),
    });
    let options = KeeperOptions {
        poll_interval: settings.poll_interval(),
        start_block: settings.start_block,
        max_log_range: settings.max_log_range_value(),
        retry: RetryPolicy {
            max_attempts: settings.max_dispatch_attempts_value(),
            backoff_base: settings.retry_backoff_base(),
            backoff_max: settings.retry_backoff_max(),
        },
        policy: DecisionPolicy::default(),
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown_on_signal = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!(target: "shutdown", "Signal received; requesting graceful shutdown");
            shutdown_on_signal.cancel();
        });
    }

    let mut keeper = Keeper::new(chain, store, model, dispatcher, options);
    keeper.run(shutdown).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(target: "shutdown", error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(target: "shutdown", error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
