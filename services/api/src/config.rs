//! Service configuration loaded from the environment.
//!
//! Realtime signing credentials are deliberately *not* validated here:
//! their absence only becomes an error when a credential for the affected
//! domain is requested, so the service can start (and the other domain can
//! work) with a partial deployment.

use duet_access::AccessConfig;
use duet_core::AgentDomain;
use std::net::SocketAddr;
use std::time::Duration;
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
    pub bind_address: SocketAddr,
    pub restaurant_backend: String,
    pub shopping_backend: String,
    /// Fixed inter-cycle delay for both poll loops.
    pub poll_interval: Duration,
    /// Finite timeout for every backend request, so a stalled backend
    /// cannot wedge a loop.
    pub http_timeout: Duration,
    pub log_level: Level,
    pub access: AccessConfig,
}

fn duration_ms_var(name: &str, default_ms: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_millis(default_ms)),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let restaurant_backend = std::env::var("RESTAURANT_AGENT_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        let shopping_backend = std::env::var("SHOPPING_AGENT_URL")
            .unwrap_or_else(|_| "http://localhost:8001".to_string());

        // The original presentation layer hard-coded a one-second cadence;
        // both knobs are configurable here but keep those defaults.
        let poll_interval = duration_ms_var("POLL_INTERVAL_MS", 1_000)?;
        let http_timeout = duration_ms_var("HTTP_TIMEOUT_MS", 5_000)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            restaurant_backend,
            shopping_backend,
            poll_interval,
            http_timeout,
            log_level,
            access: AccessConfig::from_env(),
        })
    }

    /// Base URL of the text-channel backend for `domain`.
    pub fn backend_url(&self, domain: AgentDomain) -> &str {
        match domain {
            AgentDomain::Restaurant => &self.restaurant_backend,
            AgentDomain::Shopping => &self.shopping_backend,
        }
    }
}
