//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::header;
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_BRIDGE";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial_bridge.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_BRIDGE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_BRIDGE_CONFIG` environment variable (explicit path)
    /// 2. `./serial_bridge.toml` (current directory)
    /// 3. The platform config directory (`~/.config/serial_bridge/` on Linux)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Merge the `#define` constants of a C header into the bridge section.
    ///
    /// Header values take precedence over the file, environment overrides
    /// still win over both.
    pub fn merge_header(&mut self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        let constants = header::parse_defines(&content)?;
        header::apply_to_bridge(&constants, &mut self.config.bridge)?;
        apply_env_overrides(&mut self.config)
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// A bridge section the registry would reject is refused before anything
    /// is written, so a saved file always loads back.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        self.config.bridge.validate()?;
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "serial_bridge")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    Ok(toml::from_str(&content)?)
}

/// Save configuration to a file.
fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::write(parent, e))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write(path, e))
}

/// Parse `SERIAL_BRIDGE_<suffix>` if it is set.
fn env_value<T: FromStr>(suffix: &str, what: &str) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, suffix);
    match std::env::var(&var) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}"))),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_BRIDGE_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_BRIDGE_BRIDGE_MAX_MINORS=8`
/// - `SERIAL_BRIDGE_DEFAULTS_READ_TIMEOUT_MS=500`
/// - `SERIAL_BRIDGE_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Bridge overrides
    if let Some(val) = env_value("BRIDGE_MAX_SIGNAL_LEN", "signal length")? {
        config.bridge.max_signal_len = val;
    }
    if let Some(val) = env_value("BRIDGE_TOTAL_SIGNALS", "signal capacity")? {
        config.bridge.total_signal_capacity = val;
    }
    if let Some(val) = env_value("BRIDGE_MAX_MINORS", "minor count")? {
        config.bridge.max_minors = val;
    }
    if let Some(val) = env_value("BRIDGE_MAJOR", "major number")? {
        config.bridge.major = val;
    }
    if let Some(val) = env_value::<String>("BRIDGE_EMULATED_PREFIX", "prefix")? {
        config.bridge.emulated_prefix = val;
    }
    if let Some(val) = env_value::<String>("BRIDGE_EXOGENOUS_PREFIX", "prefix")? {
        config.bridge.exogenous_prefix = val;
    }

    // Defaults overrides
    if let Some(val) = env_value("DEFAULTS_READ_TIMEOUT_MS", "timeout")? {
        config.defaults.read_timeout_ms = Some(val);
    }
    if let Some(val) = env_value("DEFAULTS_WRITE_TIMEOUT_MS", "timeout")? {
        config.defaults.write_timeout_ms = Some(val);
    }
    if let Some(val) = env_value("DEFAULTS_BAUD_RATE", "baud rate")? {
        config.defaults.baud_rate = val;
    }

    // Logging overrides
    if let Some(val) = env_value::<String>("LOGGING_LEVEL", "log level")? {
        config.logging.level = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().bridge.max_minors, 4);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("SERIAL_BRIDGE_BRIDGE_MAX_MINORS", "9");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().bridge.max_minors, 9);

        env::remove_var("SERIAL_BRIDGE_BRIDGE_MAX_MINORS");
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_is_reported() {
        env::set_var("SERIAL_BRIDGE_DEFAULTS_READ_TIMEOUT_MS", "soon");

        let mut config = Config::default();
        let result = apply_env_overrides(&mut config);
        assert!(matches!(result, Err(ConfigError::EnvOverride { .. })));

        env::remove_var("SERIAL_BRIDGE_DEFAULTS_READ_TIMEOUT_MS");
    }
}
