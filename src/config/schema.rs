//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default limits, matching the constants the bridge historically shipped with.
pub const DEFAULT_MAX_SIGNAL_LEN: usize = 262;
pub const DEFAULT_TOTAL_SIGNALS: usize = 10;
pub const DEFAULT_MAX_MINORS: usize = 4;
pub const DEFAULT_MAJOR: u32 = 200;
pub const DEFAULT_EMULATED_PREFIX: &str = "ttyEmulatedPort";
pub const DEFAULT_EXOGENOUS_PREFIX: &str = "ttyExogenous";
pub const DEFAULT_DELIMITER: u8 = b'\n';

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bridge limits and device naming
    pub bridge: BridgeConfig,
    /// Per-handle defaults applied by the CLI and stdio harness
    pub defaults: DefaultsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Limits and naming of the bridge itself.
///
/// This is the value handed to `Registry::init`; it is validated once there
/// and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum number of bytes in one signal
    pub max_signal_len: usize,
    /// Maximum number of signals buffered per endpoint
    pub total_signal_capacity: usize,
    /// Number of device pairs
    pub max_minors: usize,
    /// Major number of the emulated side; opaque to the bridge
    pub major: u32,
    /// Name prefix of the emulated-port devices
    pub emulated_prefix: String,
    /// Name prefix of the exogenous devices
    pub exogenous_prefix: String,
    /// Line delimiter terminating each signal
    #[serde(with = "delimiter_serde")]
    pub delimiter: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_signal_len: DEFAULT_MAX_SIGNAL_LEN,
            total_signal_capacity: DEFAULT_TOTAL_SIGNALS,
            max_minors: DEFAULT_MAX_MINORS,
            major: DEFAULT_MAJOR,
            emulated_prefix: DEFAULT_EMULATED_PREFIX.to_string(),
            exogenous_prefix: DEFAULT_EXOGENOUS_PREFIX.to_string(),
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl BridgeConfig {
    /// Check every invariant the bridge relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_signal_len == 0 {
            return Err(ConfigError::validation(
                "bridge.max_signal_len",
                "must be greater than zero",
            ));
        }
        if self.total_signal_capacity == 0 {
            return Err(ConfigError::validation(
                "bridge.total_signal_capacity",
                "must be greater than zero",
            ));
        }
        if self.max_minors == 0 {
            return Err(ConfigError::validation(
                "bridge.max_minors",
                "must be greater than zero",
            ));
        }
        if self.emulated_prefix.is_empty() || self.exogenous_prefix.is_empty() {
            return Err(ConfigError::validation(
                "bridge.emulated_prefix",
                "device name prefixes must not be empty",
            ));
        }
        // Saved as a one-character TOML string, which only round-trips for ASCII.
        if !self.delimiter.is_ascii() {
            return Err(ConfigError::validation(
                "bridge.delimiter",
                format!("must be an ASCII byte, got 0x{:02x}", self.delimiter),
            ));
        }
        // One prefix being a prefix of the other makes names like `ttyA10` ambiguous.
        if self.emulated_prefix.starts_with(&self.exogenous_prefix)
            || self.exogenous_prefix.starts_with(&self.emulated_prefix)
        {
            return Err(ConfigError::validation(
                "bridge.exogenous_prefix",
                format!(
                    "prefixes '{}' and '{}' overlap",
                    self.emulated_prefix, self.exogenous_prefix
                ),
            ));
        }
        Ok(())
    }

    /// Major number of the exogenous side, one above the emulated side.
    pub fn exogenous_major(&self) -> u32 {
        self.major.saturating_add(1)
    }
}

/// Defaults applied to handles opened by the CLI and the stdio harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Read timeout in milliseconds; `None` blocks indefinitely
    pub read_timeout_ms: Option<u64>,
    /// Write timeout in milliseconds; `None` blocks indefinitely
    pub write_timeout_ms: Option<u64>,
    /// Baud rate reported to callers (not enforced)
    pub baud_rate: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: Some(3000),
            write_timeout_ms: Some(100),
            baud_rate: 9600,
        }
    }
}

impl DefaultsConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

/// The delimiter is stored as a one-character string (`"\n"`) in TOML.
mod delimiter_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&(*value as char).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(de::Error::custom(format!(
                "delimiter must be exactly one byte, got {s:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bridge.max_signal_len, 262);
        assert_eq!(config.bridge.total_signal_capacity, 10);
        assert_eq!(config.bridge.max_minors, 4);
        assert_eq!(config.bridge.delimiter, b'\n');
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.bridge.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let mut bridge = BridgeConfig::default();
        bridge.max_minors = 0;
        assert!(matches!(
            bridge.validate(),
            Err(ConfigError::Invalid { ref key, .. }) if key == "bridge.max_minors"
        ));

        let mut bridge = BridgeConfig::default();
        bridge.total_signal_capacity = 0;
        assert!(bridge.validate().is_err());

        let mut bridge = BridgeConfig::default();
        bridge.max_signal_len = 0;
        assert!(bridge.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_ascii_delimiter() {
        let bridge = BridgeConfig {
            delimiter: 0xA7,
            ..Default::default()
        };
        assert!(matches!(
            bridge.validate(),
            Err(ConfigError::Invalid { ref key, .. }) if key == "bridge.delimiter"
        ));

        let bridge = BridgeConfig {
            delimiter: b'\r',
            ..Default::default()
        };
        assert!(bridge.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_overlapping_prefixes() {
        let bridge = BridgeConfig {
            emulated_prefix: "ttyA".into(),
            exogenous_prefix: "ttyAB".into(),
            ..Default::default()
        };
        assert!(bridge.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[bridge]"));
        assert!(toml_str.contains("[logging]"));
        assert!(toml_str.contains("delimiter = \"\\n\""));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [bridge]
            max_signal_len = 64
            delimiter = "\r"

            [defaults]
            read_timeout_ms = 250
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bridge.max_signal_len, 64);
        assert_eq!(config.bridge.delimiter, b'\r');
        assert_eq!(config.defaults.read_timeout(), Some(Duration::from_millis(250)));
        // Defaults should still work
        assert_eq!(config.bridge.emulated_prefix, "ttyEmulatedPort");
    }

    #[test]
    fn test_multibyte_delimiter_rejected() {
        let toml_str = r#"
            [bridge]
            delimiter = "\r\n"
        "#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }
}
