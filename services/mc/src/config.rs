use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Robot `host[:port]`. Only commands that talk to the robot need it.
    pub address: Option<String>,
    pub log_level: Level,
    pub skills_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let address = std::env::var("MISTY_ADDRESS")
            .ok()
            .filter(|address| !address.trim().is_empty());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "WARN".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let skills_path = std::env::var("SKILLS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./skills"));

        Ok(Self {
            address,
            log_level,
            skills_path,
        })
    }

    /// Applies a `--address` flag on top of the environment.
    pub fn with_address(mut self, address: Option<String>) -> Self {
        if address.is_some() {
            self.address = address;
        }
        self
    }

    pub fn require_address(&self) -> Result<&str, ConfigError> {
        self.address.as_deref().ok_or_else(|| {
            ConfigError::MissingVar(
                "MISTY_ADDRESS must be set (or pass --address)".to_string(),
            )
        })
    }
}
