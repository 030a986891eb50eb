//! Configuration module for the ledger SDK
//!
//! This module handles configuration loading from TOML files and
//! environment variables, and provides structured configuration types.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Hard upper bound on addresses per `getMultipleAccounts` call
pub const MAX_ACCOUNTS_PER_REQUEST: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for environment variable {name}: {value:?}")]
    InvalidEnvVar { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main SDK configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// RPC endpoint configuration
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Batched read configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Commitment level: processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Rate limit (requests per second), 0 disables throttling
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Addresses per batched read call
    #[serde(default = "default_max_accounts_per_request")]
    pub max_accounts_per_request: usize,

    /// Chunk reads in flight at once
    #[serde(default = "default_max_parallel_requests")]
    pub max_parallel_requests: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_rpc_url() -> String { "http://127.0.0.1:8899".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_rate_limit() -> u32 { 0 }
fn default_max_accounts_per_request() -> usize { MAX_ACCOUNTS_PER_REQUEST }
fn default_max_parallel_requests() -> usize { 4 }
fn default_log_level() -> String { "info".to_string() }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
            timeout_ms: default_timeout_ms(),
            rate_limit_rps: default_rate_limit(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_accounts_per_request: default_max_accounts_per_request(),
            max_parallel_requests: default_max_parallel_requests(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Parse a commitment level name
pub fn parse_commitment(value: &str) -> Result<CommitmentConfig, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(ConfigError::Validation(format!(
            "unknown commitment level {:?}",
            other
        ))),
    }
}

impl RpcConfig {
    pub fn commitment_config(&self) -> Result<CommitmentConfig, ConfigError> {
        parse_commitment(&self.commitment)
    }

    /// Rate limit as an option, `None` when throttling is disabled
    pub fn rate_limit(&self) -> Option<u32> {
        (self.rate_limit_rps > 0).then_some(self.rate_limit_rps)
    }
}

impl SdkConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SdkConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `LEDGER_*` environment variables
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("LEDGER_RPC_URL") {
            self.rpc.url = url;
        }
        if let Some(commitment) = lookup("LEDGER_COMMITMENT") {
            self.rpc.commitment = commitment;
        }
        if let Some(rps) = lookup("LEDGER_RATE_LIMIT_RPS") {
            self.rpc.rate_limit_rps = parse_env("LEDGER_RATE_LIMIT_RPS", rps)?;
        }
        if let Some(chunk) = lookup("LEDGER_MAX_ACCOUNTS_PER_REQUEST") {
            self.query.max_accounts_per_request =
                parse_env("LEDGER_MAX_ACCOUNTS_PER_REQUEST", chunk)?;
        }
        if let Some(level) = lookup("LEDGER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LEDGER_LOG_JSON") {
            self.logging.json = parse_env("LEDGER_LOG_JSON", json)?;
        }
        Ok(())
    }

    /// Check the configuration before anything is wired from it
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rpc.url.starts_with("http://") || self.rpc.url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "rpc.url must be an http(s) URL, got {:?}",
                self.rpc.url
            )));
        }
        self.rpc.commitment_config()?;

        let chunk = self.query.max_accounts_per_request;
        if chunk == 0 || chunk > MAX_ACCOUNTS_PER_REQUEST {
            return Err(ConfigError::Validation(format!(
                "query.max_accounts_per_request must be within 1..={}, got {}",
                MAX_ACCOUNTS_PER_REQUEST, chunk
            )));
        }
        if self.query.max_parallel_requests == 0 {
            return Err(ConfigError::Validation(
                "query.max_parallel_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvVar { name, value })
}
