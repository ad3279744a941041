// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::data_path::{resolve_data_path, resolve_required_data_path};
use crate::domain::constants;
use crate::domain::error::AppError;
use alloy::primitives::Address;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct KeeperSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    pub data_dir: Option<String>,

    // Identity & endpoints (required, validated in `load_with_path`)
    pub rpc_url: Option<String>,
    pub executor_private_key: Option<String>,
    pub contract_address: Option<String>,
    pub chain_id: Option<u64>,

    // Persistence & model
    pub state_path: Option<String>,
    pub model_path: Option<String>,

    // Loop
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    pub start_block: Option<u64>,
    #[serde(default = "default_max_log_range")]
    pub max_log_range: u64,

    // Dispatch
    #[serde(default = "default_gas_limit_multiplier_bps")]
    pub gas_limit_multiplier_bps: u64,
    #[serde(default = "default_priority_fee_gwei")]
    pub priority_fee_gwei: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,

    // Retry budget
    #[serde(default = "default_max_dispatch_attempts")]
    pub max_dispatch_attempts: u32,
    #[serde(default = "default_retry_backoff_base_secs")]
    pub retry_backoff_base_secs: u64,
    #[serde(default = "default_retry_backoff_max_secs")]
    pub retry_backoff_max_secs: u64,
}

// Defaults
fn default_false() -> bool {
    false
}
fn default_poll_interval_secs() -> u64 {
    constants::DEFAULT_POLL_INTERVAL_SECS
}
fn default_max_log_range() -> u64 {
    constants::DEFAULT_MAX_LOG_RANGE
}
fn default_gas_limit_multiplier_bps() -> u64 {
    constants::DEFAULT_GAS_LIMIT_MULTIPLIER_BPS
}
fn default_priority_fee_gwei() -> u64 {
    constants::DEFAULT_PRIORITY_FEE_GWEI
}
fn default_receipt_poll_ms() -> u64 {
    constants::DEFAULT_RECEIPT_POLL_MS
}
fn default_receipt_timeout_ms() -> u64 {
    constants::DEFAULT_RECEIPT_TIMEOUT_MS
}
fn default_max_dispatch_attempts() -> u32 {
    constants::DEFAULT_MAX_DISPATCH_ATTEMPTS
}
fn default_retry_backoff_base_secs() -> u64 {
    constants::DEFAULT_RETRY_BACKOFF_BASE_SECS
}
fn default_retry_backoff_max_secs() -> u64 {
    constants::DEFAULT_RETRY_BACKOFF_MAX_SECS
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn configured(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl KeeperSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = path {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // Deterministic precedence: env/.env > selected file.
        builder = builder.add_source(Environment::default());

        let settings: KeeperSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    /// Required values must be present before the loop may start.
    pub fn validate(&self) -> Result<(), AppError> {
        self.rpc_url()?;
        self.executor_private_key()?;
        self.contract_address()?;
        if self.retry_backoff_max_secs < self.retry_backoff_base_secs {
            return Err(AppError::Config(format!(
                "retry_backoff_max_secs ({}) must be >= retry_backoff_base_secs ({})",
                self.retry_backoff_max_secs, self.retry_backoff_base_secs
            )));
        }
        Ok(())
    }

    /// RPC endpoint, falling back to `RPC_URL` then `SEPOLIA_RPC_URL`.
    pub fn rpc_url(&self) -> Result<String, AppError> {
        let raw = configured(self.rpc_url.as_ref())
            .or_else(|| env_non_empty("RPC_URL"))
            .or_else(|| env_non_empty("SEPOLIA_RPC_URL"))
            .ok_or_else(|| AppError::Config("RPC_URL is missing".into()))?;
        Url::parse(&raw).map_err(|e| AppError::Config(format!("Invalid RPC URL: {e}")))?;
        Ok(raw)
    }

    pub fn executor_private_key(&self) -> Result<String, AppError> {
        configured(self.executor_private_key.as_ref())
            .or_else(|| env_non_empty("EXECUTOR_PRIVATE_KEY"))
            .ok_or_else(|| AppError::Config("EXECUTOR_PRIVATE_KEY is missing".into()))
    }

    pub fn contract_address(&self) -> Result<Address, AppError> {
        let raw = configured(self.contract_address.as_ref())
            .or_else(|| env_non_empty("CONTRACT_ADDRESS"))
            .ok_or_else(|| AppError::Config("CONTRACT_ADDRESS is missing".into()))?;
        let address = Address::from_str(&raw).map_err(|_| AppError::InvalidAddress(raw.clone()))?;
        if address == Address::ZERO {
            return Err(AppError::InvalidAddress(raw));
        }
        Ok(address)
    }

    fn data_dir_value(&self) -> Option<String> {
        env_non_empty("DATA_DIR").or_else(|| configured(self.data_dir.as_ref()))
    }

    pub fn state_path(&self) -> PathBuf {
        let raw = configured(self.state_path.as_ref())
            .unwrap_or_else(|| constants::DEFAULT_STATE_FILE.to_string());
        resolve_data_path(&raw, self.data_dir_value().as_deref())
    }

    pub fn model_path(&self) -> Result<PathBuf, AppError> {
        let raw = configured(self.model_path.as_ref())
            .unwrap_or_else(|| constants::DEFAULT_MODEL_FILE.to_string());
        resolve_required_data_path(&raw, self.data_dir_value().as_deref())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn max_log_range_value(&self) -> u64 {
        self.max_log_range.max(1)
    }

    pub fn gas_limit_multiplier_bps_value(&self) -> u64 {
        self.gas_limit_multiplier_bps
            .max(constants::MIN_GAS_LIMIT_MULTIPLIER_BPS)
    }

    pub fn priority_fee_wei(&self) -> u128 {
        constants::gwei_to_wei(self.priority_fee_gwei)
    }

    pub fn receipt_poll_ms_value(&self) -> u64 {
        self.receipt_poll_ms.max(constants::MIN_RECEIPT_POLL_MS)
    }

    pub fn receipt_timeout_ms_value(&self) -> u64 {
        self.receipt_timeout_ms
            .max(constants::MIN_RECEIPT_TIMEOUT_MS)
            .max(self.receipt_poll_ms_value())
    }

    pub fn max_dispatch_attempts_value(&self) -> u32 {
        self.max_dispatch_attempts.max(1)
    }

    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_base_secs)
    }

    pub fn retry_backoff_max(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_max_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn base_settings() -> KeeperSettings {
        KeeperSettings {
            debug: default_false(),
            data_dir: None,
            rpc_url: Some("http://127.0.0.1:8545".into()),
            executor_private_key: Some("0x01".into()),
            contract_address: Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".into()),
            chain_id: None,
            state_path: None,
            model_path: None,
            poll_interval_secs: default_poll_interval_secs(),
            start_block: None,
            max_log_range: default_max_log_range(),
            gas_limit_multiplier_bps: default_gas_limit_multiplier_bps(),
            priority_fee_gwei: default_priority_fee_gwei(),
            receipt_poll_ms: default_receipt_poll_ms(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
            max_dispatch_attempts: default_max_dispatch_attempts(),
            retry_backoff_base_secs: default_retry_backoff_base_secs(),
            retry_backoff_max_secs: default_retry_backoff_max_secs(),
        }
    }

    #[test]
    fn base_settings_validate() {
        let _guard = env_lock_guard();
        assert!(base_settings().validate().is_ok());
    }

    #[test]
    fn missing_contract_address_is_fatal() {
        let _guard = env_lock_guard();
        let previous = std::env::var("CONTRACT_ADDRESS").ok();
        unsafe { std::env::remove_var("CONTRACT_ADDRESS") };

        let mut settings = base_settings();
        settings.contract_address = None;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, AppError::Config(ref m) if m.contains("CONTRACT_ADDRESS")));

        if let Some(v) = previous {
            unsafe { std::env::set_var("CONTRACT_ADDRESS", v) };
        }
    }

    #[test]
    fn rpc_url_falls_back_to_sepolia_env() {
        let _guard = env_lock_guard();
        let previous_rpc = std::env::var("RPC_URL").ok();
        let previous_sepolia = std::env::var("SEPOLIA_RPC_URL").ok();
        unsafe {
            std::env::remove_var("RPC_URL");
            std::env::set_var("SEPOLIA_RPC_URL", "https://sepolia.example.org");
        }

        let mut settings = base_settings();
        settings.rpc_url = None;
        assert_eq!(settings.rpc_url().unwrap(), "https://sepolia.example.org");

        unsafe {
            std::env::remove_var("SEPOLIA_RPC_URL");
            if let Some(v) = previous_rpc {
                std::env::set_var("RPC_URL", v);
            }
            if let Some(v) = previous_sepolia {
                std::env::set_var("SEPOLIA_RPC_URL", v);
            }
        }
    }

    #[test]
    fn invalid_rpc_url_is_rejected() {
        let mut settings = base_settings();
        settings.rpc_url = Some("not a url".into());
        assert!(matches!(settings.rpc_url(), Err(AppError::Config(_))));
    }

    #[test]
    fn zero_contract_address_is_rejected() {
        let mut settings = base_settings();
        settings.contract_address = Some(format!("{:#x}", Address::ZERO));
        assert!(matches!(
            settings.contract_address(),
            Err(AppError::InvalidAddress(_))
        ));
    }

    #[test]
    fn tuning_values_have_safe_floor() {
        let mut settings = base_settings();
        settings.receipt_poll_ms = 0;
        settings.receipt_timeout_ms = 1;
        settings.gas_limit_multiplier_bps = 5_000;
        settings.max_dispatch_attempts = 0;
        settings.max_log_range = 0;
        settings.poll_interval_secs = 0;
        assert_eq!(settings.receipt_poll_ms_value(), 100);
        assert_eq!(settings.receipt_timeout_ms_value(), 1_000);
        assert_eq!(settings.gas_limit_multiplier_bps_value(), 10_000);
        assert_eq!(settings.max_dispatch_attempts_value(), 1);
        assert_eq!(settings.max_log_range_value(), 1);
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn backoff_bounds_must_be_ordered() {
        let _guard = env_lock_guard();
        let mut settings = base_settings();
        settings.retry_backoff_base_secs = 60;
        settings.retry_backoff_max_secs = 10;
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn state_path_resolves_under_data_dir() {
        let _guard = env_lock_guard();
        let previous = std::env::var("DATA_DIR").ok();
        unsafe { std::env::remove_var("DATA_DIR") };

        let mut settings = base_settings();
        settings.data_dir = Some("/srv/keeper".into());
        assert_eq!(
            settings.state_path(),
            PathBuf::from("/srv/keeper/tracked_transactions.json")
        );

        if let Some(v) = previous {
            unsafe { std::env::set_var("DATA_DIR", v) };
        }
    }
}
