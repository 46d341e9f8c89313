//! Configuration management for the presence relay
//!
//! Settings come from built-in defaults, an optional `config.toml`, and
//! `RELAY_*` environment overrides, in that order of precedence.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_DATAGRAM_PORT: u16 = 41234;
const DEFAULT_MAX_FRAME_LENGTH: usize = 4096;
const DEFAULT_DATAGRAM_BUFFER_SIZE: usize = 1024;
const DEFAULT_MAX_USERNAME_LENGTH: usize = 64;
const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 2000;

/// Complete relay configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    // ═══ NETWORK (Environment Override Supported) ═══
    /// IP address both channels bind to
    pub bind_address: String,

    /// Port of the unreliable (status) channel
    pub datagram_port: u16,

    /// Port of the reliable (chat) channel; `datagram_port + 1` when unset
    #[serde(default)]
    pub stream_port: Option<u16>,

    // ═══ LIMITS ═══
    /// Longest accepted frame on the reliable channel, terminator excluded
    pub max_frame_length: usize,

    /// Receive buffer for a single datagram
    pub datagram_buffer_size: usize,

    /// Longest accepted username in bytes
    pub max_username_length: usize,

    /// Upper bound on a single delivery to a stream peer
    pub delivery_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            datagram_port: DEFAULT_DATAGRAM_PORT,
            stream_port: None,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            datagram_buffer_size: DEFAULT_DATAGRAM_BUFFER_SIZE,
            max_username_length: DEFAULT_MAX_USERNAME_LENGTH,
            delivery_timeout_ms: DEFAULT_DELIVERY_TIMEOUT_MS,
        }
    }
}

impl RelayConfig {
    /// Load configuration from config.toml with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_paths = [
            "presence-relay/config", // Container layout: /app/presence-relay/config.toml
            "config",                // Local development: ./config.toml
        ];

        let mut builder = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("datagram_port", i64::from(DEFAULT_DATAGRAM_PORT))?
            .set_default("max_frame_length", DEFAULT_MAX_FRAME_LENGTH as i64)?
            .set_default("datagram_buffer_size", DEFAULT_DATAGRAM_BUFFER_SIZE as i64)?
            .set_default("max_username_length", DEFAULT_MAX_USERNAME_LENGTH as i64)?
            .set_default("delivery_timeout_ms", DEFAULT_DELIVERY_TIMEOUT_MS as i64)?;

        if let Some(path) = config_paths
            .iter()
            .find(|path| Path::new(&format!("{path}.toml")).exists())
        {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("RELAY").try_parsing(true))
            .build()?;

        let config: RelayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.datagram_port == 0 {
            return Err(config::ConfigError::Message(
                "Datagram port cannot be 0".into(),
            ));
        }

        if self.stream_port == Some(0) {
            return Err(config::ConfigError::Message(
                "Stream port cannot be 0".into(),
            ));
        }

        let stream_port = self.stream_port()?;

        if stream_port == self.datagram_port {
            return Err(config::ConfigError::Message(
                "datagram_port and stream_port must differ".into(),
            ));
        }

        if self.max_frame_length == 0 {
            return Err(config::ConfigError::Message(
                "max_frame_length must be greater than 0".into(),
            ));
        }

        if self.datagram_buffer_size == 0 || self.datagram_buffer_size > self.max_frame_length {
            return Err(config::ConfigError::Message(
                "datagram_buffer_size must be between 1 and max_frame_length".into(),
            ));
        }

        if self.max_username_length == 0 {
            return Err(config::ConfigError::Message(
                "max_username_length must be greater than 0".into(),
            ));
        }

        if self.delivery_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "delivery_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Port of the reliable channel, explicit or derived from the datagram port
    pub fn stream_port(&self) -> Result<u16, config::ConfigError> {
        match self.stream_port {
            Some(port) => Ok(port),
            None => self.datagram_port.checked_add(1).ok_or_else(|| {
                config::ConfigError::Message(
                    "Cannot derive stream port: datagram_port + 1 overflows".into(),
                )
            }),
        }
    }

    /// Bind address and datagram port as a socket string
    pub fn datagram_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.datagram_port)
    }

    /// Bind address and stream port as a socket string
    pub fn stream_socket(&self) -> Result<String, config::ConfigError> {
        Ok(format!("{}:{}", self.bind_address, self.stream_port()?))
    }

    /// Get delivery timeout as Duration
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.datagram_socket(), "0.0.0.0:41234");
        assert_eq!(config.stream_socket().unwrap(), "0.0.0.0:41235");
    }

    #[test]
    fn explicit_stream_port_wins() {
        let config = RelayConfig {
            stream_port: Some(6000),
            ..RelayConfig::default()
        };
        assert_eq!(config.stream_port().unwrap(), 6000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_same_port_for_both_channels() {
        let config = RelayConfig {
            datagram_port: 5000,
            stream_port: Some(5000),
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_overflowing_derived_port() {
        let config = RelayConfig {
            datagram_port: u16::MAX,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(config.stream_port().is_err());
        assert!(config.stream_socket().is_err());
    }

    #[test]
    fn rejects_zero_limits() {
        let config = RelayConfig {
            delivery_timeout_ms: 0,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            datagram_buffer_size: 8192,
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
