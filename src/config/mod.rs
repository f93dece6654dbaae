//! Configuration module for serial_bridge.
//!
//! This module provides TOML-based configuration with environment variable
//! overrides, plus a loader for the C header the bridge limits were
//! historically compiled from.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_BRIDGE_CONFIG` environment variable (explicit path)
//! 2. `./serial_bridge.toml` (current directory)
//! 3. The platform config directory (e.g. `~/.config/serial_bridge/serial_bridge.toml`)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is: `SERIAL_BRIDGE_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SERIAL_BRIDGE_BRIDGE_TOTAL_SIGNALS=32`
//! - `SERIAL_BRIDGE_DEFAULTS_READ_TIMEOUT_MS=500`
//! - `SERIAL_BRIDGE_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_bridge::config::ConfigLoader;
//!
//! let mut loader = ConfigLoader::load()?;
//! loader.merge_header("include/virtualbot.h")?;
//! println!("Signals per endpoint: {}", loader.config().bridge.total_signal_capacity);
//! # Ok::<(), serial_bridge::config::ConfigError>(())
//! ```

mod error;
pub mod header;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    BridgeConfig, Config, DefaultsConfig, LogFormat, LoggingConfig, DEFAULT_DELIMITER,
    DEFAULT_EMULATED_PREFIX, DEFAULT_EXOGENOUS_PREFIX, DEFAULT_MAJOR, DEFAULT_MAX_MINORS,
    DEFAULT_MAX_SIGNAL_LEN, DEFAULT_TOTAL_SIGNALS,
};
