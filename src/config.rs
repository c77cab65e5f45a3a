//! Host configuration
//!
//! Loaded from JSON; every field is optional and falls back to its default.
//!
//! ```json
//! {
//!   "console_capacity": 8192,
//!   "throttle": { "quantum_us": 16667, "initial_speed": 200 },
//!   "stop_timeout_ms": 200
//! }
//! ```

use crate::console::DEFAULT_CONSOLE_CAPACITY;
use crate::throttle::ThrottleConfig;
use crate::{EmuHostError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default bounded wait for a voluntary stop, in milliseconds
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 200;

/// Default bounded wait after forced termination, in milliseconds
pub const DEFAULT_TERMINATE_TIMEOUT_MS: u64 = 200;

/// Configuration for an emulation host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Console ring size in bytes
    pub console_capacity: usize,
    /// Throttle settings
    pub throttle: ThrottleConfig,
    /// How long a stop request waits for the loop to exit on its own
    pub stop_timeout_ms: u64,
    /// How long a stop request waits after forcing termination
    pub terminate_timeout_ms: u64,
}

impl HostConfig {
    /// Small console and short stop timeouts, for tests and tools
    pub fn low_latency() -> Self {
        HostConfig {
            console_capacity: 1024,
            throttle: ThrottleConfig::default(),
            stop_timeout_ms: 50,
            terminate_timeout_ms: 50,
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: HostConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.console_capacity == 0 {
            return Err(EmuHostError::config(
                "console capacity must be greater than 0",
            ));
        }
        if self.throttle.quantum_us == 0 {
            return Err(EmuHostError::config("throttle quantum must be greater than 0"));
        }
        if self.throttle.pause_poll_ms == 0 {
            return Err(EmuHostError::config(
                "pause poll interval must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Voluntary stop timeout as a duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Forced termination timeout as a duration
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            console_capacity: DEFAULT_CONSOLE_CAPACITY,
            throttle: ThrottleConfig::default(),
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            terminate_timeout_ms: DEFAULT_TERMINATE_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.console_capacity, 4096);
        assert_eq!(config.stop_timeout(), Duration::from_millis(200));
        assert_eq!(config.terminate_timeout(), Duration::from_millis(200));
        assert!(config.throttle.throttle_enabled);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = HostConfig::from_json_str(
            r#"{ "console_capacity": 64, "throttle": { "initial_speed": 250 } }"#,
        )
        .unwrap();
        assert_eq!(config.console_capacity, 64);
        assert_eq!(config.throttle.initial_speed, 250);
        assert_eq!(config.throttle.quantum_us, 16_667);
        assert_eq!(config.stop_timeout_ms, 200);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = HostConfig::from_json_str(r#"{ "console_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, EmuHostError::Config(_)));

        let err = HostConfig::from_json_str(r#"{ "throttle": { "quantum_us": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("quantum"));

        let err = HostConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, EmuHostError::Json(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "stop_timeout_ms": 25 }}"#).unwrap();
        let config = HostConfig::from_path(file.path()).unwrap();
        assert_eq!(config.stop_timeout(), Duration::from_millis(25));

        let missing = HostConfig::from_path("/nonexistent/emu-host.json").unwrap_err();
        assert!(matches!(missing, EmuHostError::Io(_)));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = HostConfig::low_latency();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(HostConfig::from_json_str(&json).unwrap(), config);
    }
}
