//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! rally-point matchmaking service, including environment variable loading,
//! TOML file loading and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceSettings,
    #[serde(default)]
    pub matchmaking: MatchmakingSettings,
    #[serde(default)]
    pub provisioner: ProvisionerSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the HTTP API (health and metrics ride on the same listener)
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
///
/// These are the named constants of the lifecycle engine; nothing in the
/// engine hardcodes a time value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingSettings {
    /// Session time-to-live in seconds; a session dies when this elapses
    /// without a ping
    pub session_ttl_seconds: u64,
    /// Interval between matchmaking scans in seconds
    pub pairing_interval_seconds: u64,
    /// Minimum remaining TTL a session needs to be committed into a match,
    /// so a pair is never handed off with one side about to expire
    pub eligibility_margin_seconds: u64,
    /// Interval between expiry sweeps in seconds
    pub expiry_sweep_interval_seconds: u64,
}

/// Settings for the built-in static provisioner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerSettings {
    /// Address handed to matched clients
    pub server_address: String,
    /// Simulated server spin-up delay in milliseconds
    pub allocation_delay_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "rally-point".to_string(),
            log_level: "info".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 300,        // 5 minutes
            pairing_interval_seconds: 10,    // matchmaking scan cadence
            eligibility_margin_seconds: 50,  // near-expiry safety margin
            expiry_sweep_interval_seconds: 1,
        }
    }
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:7777".to_string(),
            allocation_delay_ms: 0,
        }
    }
}

impl MatchmakingSettings {
    /// Get the session TTL as a Duration
    pub fn session_ttl(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_secs(self.session_ttl_seconds)
    }

    /// Get the pairing scan interval as a Duration
    pub fn pairing_interval(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_secs(self.pairing_interval_seconds)
    }

    /// Get the pairing eligibility margin as a Duration
    pub fn eligibility_margin(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_secs(self.eligibility_margin_seconds)
    }

    /// Get the expiry sweep interval as a Duration
    pub fn expiry_sweep_interval(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_secs(self.expiry_sweep_interval_seconds)
    }
}

impl ProvisionerSettings {
    /// Get the allocation delay as a Duration
    pub fn allocation_delay(&self) -> tokio::time::Duration {
        tokio::time::Duration::from_millis(self.allocation_delay_ms)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            config.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matchmaking settings
        if let Ok(ttl) = env::var("SESSION_TTL_SECONDS") {
            config.matchmaking.session_ttl_seconds = ttl
                .parse()
                .map_err(|_| anyhow!("Invalid SESSION_TTL_SECONDS value: {}", ttl))?;
        }
        if let Ok(interval) = env::var("PAIRING_INTERVAL_SECONDS") {
            config.matchmaking.pairing_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid PAIRING_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(margin) = env::var("ELIGIBILITY_MARGIN_SECONDS") {
            config.matchmaking.eligibility_margin_seconds = margin
                .parse()
                .map_err(|_| anyhow!("Invalid ELIGIBILITY_MARGIN_SECONDS value: {}", margin))?;
        }
        if let Ok(sweep) = env::var("EXPIRY_SWEEP_INTERVAL_SECONDS") {
            config.matchmaking.expiry_sweep_interval_seconds = sweep
                .parse()
                .map_err(|_| anyhow!("Invalid EXPIRY_SWEEP_INTERVAL_SECONDS value: {}", sweep))?;
        }

        // Provisioner settings
        if let Ok(address) = env::var("GAME_SERVER_ADDRESS") {
            config.provisioner.server_address = address;
        }
        if let Ok(delay) = env::var("ALLOCATION_DELAY_MS") {
            config.provisioner.allocation_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid ALLOCATION_DELAY_MS value: {}", delay))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.session_ttl_seconds == 0 {
        return Err(anyhow!("Session TTL must be greater than 0"));
    }
    if config.matchmaking.pairing_interval_seconds == 0 {
        return Err(anyhow!("Pairing interval must be greater than 0"));
    }
    if config.matchmaking.expiry_sweep_interval_seconds == 0 {
        return Err(anyhow!("Expiry sweep interval must be greater than 0"));
    }
    if config.matchmaking.eligibility_margin_seconds >= config.matchmaking.session_ttl_seconds {
        return Err(anyhow!(
            "Eligibility margin ({}s) must be below the session TTL ({}s)",
            config.matchmaking.eligibility_margin_seconds,
            config.matchmaking.session_ttl_seconds
        ));
    }

    // Validate provisioner settings
    if config.provisioner.server_address.is_empty() {
        return Err(anyhow!("Game server address cannot be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.matchmaking.session_ttl_seconds, 300);
        assert_eq!(config.matchmaking.pairing_interval_seconds, 10);
        assert_eq!(config.matchmaking.eligibility_margin_seconds, 50);
    }

    #[test]
    fn test_margin_must_be_below_ttl() {
        let mut config = AppConfig::default();
        config.matchmaking.session_ttl_seconds = 40;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let mut config = AppConfig::default();
        config.matchmaking.pairing_interval_seconds = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.expiry_sweep_interval_seconds = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duration_accessors() {
        let settings = MatchmakingSettings::default();
        assert_eq!(settings.session_ttl().as_secs(), 300);
        assert_eq!(settings.pairing_interval().as_secs(), 10);
        assert_eq!(settings.eligibility_margin().as_secs(), 50);
        assert_eq!(settings.expiry_sweep_interval().as_secs(), 1);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let rendered = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(
            parsed.matchmaking.session_ttl_seconds,
            config.matchmaking.session_ttl_seconds
        );
        assert_eq!(parsed.service.http_port, config.service.http_port);
    }
}
