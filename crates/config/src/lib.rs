use std::env;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming a configuration file
pub const CONFIG_FILE_ENV: &str = "TREASURY_CONFIG_FILE";

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Treasury configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryConfig {
    /// Minimum share balance needed to open a proposal
    #[serde(default = "default_min_shares_to_propose")]
    pub min_shares_to_propose: u64,
    /// How long after creation a proposal accepts votes, in seconds
    #[serde(default = "default_voting_period_secs")]
    pub voting_period_secs: u64,
    /// Account on the value ledger that holds deposited funds
    #[serde(default = "default_custody_account")]
    pub custody_account: String,
    /// Number of journal events kept in memory
    #[serde(default = "default_event_retention")]
    pub event_retention: usize,
    /// Log filter used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_min_shares_to_propose() -> u64 {
    100
}

fn default_voting_period_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_custody_account() -> String {
    "treasury".to_string()
}

fn default_event_retention() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            min_shares_to_propose: default_min_shares_to_propose(),
            voting_period_secs: default_voting_period_secs(),
            custody_account: default_custody_account(),
            event_retention: default_event_retention(),
            log_level: default_log_level(),
        }
    }
}

impl TreasuryConfig {
    /// Load configuration.
    ///
    /// Reads `path` when given, otherwise the file named by
    /// `TREASURY_CONFIG_FILE` if it exists, otherwise starts from defaults.
    /// Environment overrides are applied on top and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match env::var(CONFIG_FILE_ENV) {
                Ok(file) if Path::new(&file).exists() => Self::from_file(Path::new(&file))?,
                _ => Self::default(),
            },
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: TreasuryConfig = serde_yaml::from_str(&contents)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `TREASURY_*` environment variable overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("TREASURY_MIN_SHARES_TO_PROPOSE") {
            self.min_shares_to_propose = parse_var("TREASURY_MIN_SHARES_TO_PROPOSE", &value)?;
        }
        if let Some(value) = lookup("TREASURY_VOTING_PERIOD_SECS") {
            self.voting_period_secs = parse_var("TREASURY_VOTING_PERIOD_SECS", &value)?;
        }
        if let Some(value) = lookup("TREASURY_CUSTODY_ACCOUNT") {
            self.custody_account = value;
        }
        if let Some(value) = lookup("TREASURY_EVENT_RETENTION") {
            self.event_retention = parse_var("TREASURY_EVENT_RETENTION", &value)?;
        }
        if let Some(value) = lookup("TREASURY_LOG_LEVEL") {
            self.log_level = value;
        }
        Ok(())
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.voting_period_secs == 0 {
            return Err(ConfigError::Invalid("voting_period_secs must be greater than 0".to_string()));
        }
        if self.custody_account.trim().is_empty() {
            return Err(ConfigError::Invalid("custody_account cannot be empty".to_string()));
        }
        if self.event_retention == 0 {
            return Err(ConfigError::Invalid("event_retention must be greater than 0".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
