//! CLI configuration
//!
//! Read from `.env` (if present) and the process environment. See
//! [`Config::from_lookup`] for the variables and their defaults.

use alloy::primitives::Address;
use eyre::{eyre, Result, WrapErr};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::allowance::ApprovalPolicy;
use crate::backend::HttpBackendConfig;
use crate::orchestrator::OrchestratorSettings;
use crate::redact::Redacted;

/// Bridge deposit contract used when `BRIDGE_ADDRESS` is unset
pub const DEFAULT_BRIDGE_ADDRESS: &str = "0x8e326D9F79a9D944C920fC7aE899Dd181ecB0491";

#[derive(Debug, Clone)]
pub struct Config {
    /// Relay backend base URL
    pub backend_url: String,
    /// Key of the local wallet; only commands that sign need it
    pub wallet_private_key: Option<Redacted<String>>,
    /// chain id -> RPC URL
    pub rpc_urls: HashMap<u64, String>,

    pub bridge_address: Address,
    /// Beneficiary passed to `deposit`
    pub relay_address: Address,

    pub catalog_path: PathBuf,
    pub credential_path: PathBuf,

    pub confirmation_timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub backend_timeout_ms: u64,
    pub backend_retry_attempts: u32,
    pub backend_retry_delay_ms: u64,
    pub connectivity_probe_interval_ms: u64,
    pub approval_policy: ApprovalPolicy,
}

impl Config {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend_url = get("BACKEND_URL").ok_or_else(|| eyre!("BACKEND_URL required"))?;

        let rpc_urls = match get("CHAIN_RPC_URLS") {
            Some(raw) => parse_rpc_urls(&raw)?,
            None => HashMap::new(),
        };

        let bridge_address = parse_address(
            "BRIDGE_ADDRESS",
            &get("BRIDGE_ADDRESS").unwrap_or_else(|| DEFAULT_BRIDGE_ADDRESS.to_string()),
        )?;
        let relay_address = match get("RELAY_ADDRESS") {
            Some(raw) => parse_address("RELAY_ADDRESS", &raw)?,
            None => bridge_address,
        };

        Ok(Self {
            backend_url,
            wallet_private_key: get("WALLET_PRIVATE_KEY").map(Redacted),
            rpc_urls,

            bridge_address,
            relay_address,

            catalog_path: get("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("catalog.json")),
            credential_path: get("CREDENTIAL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".bridgebloc/authorization.json")),

            confirmation_timeout_ms: parse_or(&get, "CONFIRMATION_TIMEOUT_MS", 600_000)?,
            receipt_poll_interval_ms: parse_or(&get, "RECEIPT_POLL_INTERVAL_MS", 2_000)?,
            backend_timeout_ms: parse_or(&get, "BACKEND_TIMEOUT_MS", 30_000)?,
            backend_retry_attempts: parse_or(&get, "BACKEND_RETRY_ATTEMPTS", 3)?,
            backend_retry_delay_ms: parse_or(&get, "BACKEND_RETRY_DELAY_MS", 1_000)?,
            connectivity_probe_interval_ms: parse_or(
                &get,
                "CONNECTIVITY_PROBE_INTERVAL_MS",
                5_000,
            )?,
            approval_policy: match get("APPROVAL_AMOUNT") {
                Some(raw) => raw.parse().map_err(|e: String| eyre!("APPROVAL_AMOUNT: {}", e))?,
                None => ApprovalPolicy::default(),
            },
        })
    }

    pub fn backend_config(&self) -> HttpBackendConfig {
        let mut config = HttpBackendConfig::new(&self.backend_url);
        config.timeout_ms = self.backend_timeout_ms;
        config.retry_attempts = self.backend_retry_attempts;
        config.retry_delay_ms = self.backend_retry_delay_ms;
        config
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            bridge_address: self.bridge_address,
            relay_address: self.relay_address,
            confirmation_timeout_ms: self.confirmation_timeout_ms,
            approval_policy: self.approval_policy,
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn connectivity_probe_interval(&self) -> Duration {
        Duration::from_millis(self.connectivity_probe_interval_ms)
    }
}

/// Parse comma-separated `chain_id=url` pairs
pub fn parse_rpc_urls(raw: &str) -> Result<HashMap<u64, String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (chain_id, url) = pair
                .split_once('=')
                .ok_or_else(|| eyre!("Expected chain_id=url, got {:?}", pair))?;
            let chain_id = chain_id
                .trim()
                .parse::<u64>()
                .wrap_err_with(|| format!("Invalid chain id in {:?}", pair))?;
            let url = url.trim();
            if url.is_empty() {
                return Err(eyre!("Missing RPC URL for chain {}", chain_id));
            }
            Ok((chain_id, url.to_string()))
        })
        .collect()
}

fn parse_address(key: &str, raw: &str) -> Result<Address> {
    Address::from_str(raw.trim()).wrap_err_with(|| format!("Invalid {}", key))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| eyre!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup(&[("BACKEND_URL", "http://localhost:8000")])).unwrap();

        assert_eq!(config.backend_url, "http://localhost:8000");
        assert!(config.wallet_private_key.is_none());
        assert!(config.rpc_urls.is_empty());
        assert_eq!(
            config.bridge_address,
            DEFAULT_BRIDGE_ADDRESS.parse::<Address>().unwrap()
        );
        assert_eq!(config.relay_address, config.bridge_address);
        assert_eq!(config.catalog_path, PathBuf::from("catalog.json"));
        assert_eq!(config.confirmation_timeout_ms, 600_000);
        assert_eq!(config.receipt_poll_interval_ms, 2_000);
        assert_eq!(config.backend_retry_attempts, 3);
        assert_eq!(config.approval_policy, ApprovalPolicy::Exact);
    }

    #[test]
    fn test_backend_url_required() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("BACKEND_URL", "  ")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BACKEND_URL", "https://api.example.com/"),
            ("WALLET_PRIVATE_KEY", "0xabc"),
            ("CHAIN_RPC_URLS", "1=https://eth.example.com, 42161=https://arb.example.com"),
            ("RELAY_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("CONFIRMATION_TIMEOUT_MS", "1000"),
            ("BACKEND_RETRY_ATTEMPTS", "5"),
            ("APPROVAL_AMOUNT", "unlimited"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_urls.len(), 2);
        assert_eq!(config.rpc_urls[&42161u64], "https://arb.example.com");
        assert_eq!(config.relay_address, Address::repeat_byte(0x11));
        assert_eq!(config.approval_policy, ApprovalPolicy::Unlimited);

        let backend = config.backend_config();
        assert_eq!(backend.base_url, "https://api.example.com");
        assert_eq!(backend.retry_attempts, 5);

        let settings = config.orchestrator_settings();
        assert_eq!(settings.confirmation_timeout_ms, 1000);
        assert_eq!(settings.relay_address, Address::repeat_byte(0x11));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = Config::from_lookup(lookup(&[
            ("BACKEND_URL", "http://localhost:8000"),
            ("WALLET_PRIVATE_KEY", "0xdeadbeefcafe"),
        ]))
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("deadbeefcafe"));
        assert_eq!(config.wallet_private_key.unwrap().expose(), "0xdeadbeefcafe");
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("CONFIRMATION_TIMEOUT_MS", "soon"),
            ("BRIDGE_ADDRESS", "0x1234"),
            ("APPROVAL_AMOUNT", "half"),
            ("CHAIN_RPC_URLS", "mainnet=https://eth.example.com"),
        ] {
            let result = Config::from_lookup(lookup(&[
                ("BACKEND_URL", "http://localhost:8000"),
                (key, value),
            ]));
            assert!(result.is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn test_parse_rpc_urls() {
        let urls = parse_rpc_urls("1=http://a, ,8453=http://b,").unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[&1u64], "http://a");
        assert_eq!(urls[&8453u64], "http://b");

        assert!(parse_rpc_urls("1").is_err());
        assert!(parse_rpc_urls("1=").is_err());
        assert!(parse_rpc_urls("").unwrap().is_empty());
    }

    #[test]
    #[serial]
    fn test_load_from_process_env() {
        env::set_var("BACKEND_URL", "http://env-backend:8000");
        env::set_var("BACKEND_TIMEOUT_MS", "1234");

        let config = Config::load().unwrap();

        env::remove_var("BACKEND_URL");
        env::remove_var("BACKEND_TIMEOUT_MS");

        assert_eq!(config.backend_url, "http://env-backend:8000");
        assert_eq!(config.backend_timeout_ms, 1234);
    }
}
