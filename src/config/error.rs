//! Errors raised while assembling a bridge configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("No bridge configuration at {0}")]
    NotFound(PathBuf),

    /// Reading or writing a config or header file failed
    #[error("Cannot {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed bridge configuration: {0}")]
    Malformed(#[from] toml::de::Error),

    #[error("Cannot encode bridge configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A limit or name the registry cannot work with
    #[error("Bridge setting '{key}': {message}")]
    Invalid { key: String, message: String },

    /// A `SERIAL_BRIDGE_*` variable holds an unusable value
    #[error("Override {var}: {message}")]
    EnvOverride { var: String, message: String },

    /// A `#define` in a constants header could not be interpreted
    #[error("Header constant '{name}' (line {line}): {message}")]
    Header {
        name: String,
        line: usize,
        message: String,
    },
}

impl ConfigError {
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn env_parse(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EnvOverride {
            var: var.into(),
            message: message.into(),
        }
    }

    pub fn header(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action: "read",
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action: "write",
            path: path.into(),
            source,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
