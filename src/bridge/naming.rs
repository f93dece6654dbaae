//! Device naming: `<prefix><minor>` for each side of a pair.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which end of a device pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The port the application under test opens.
    Emulated,
    /// The port the external harness opens.
    Exogenous,
}

impl Side {
    pub fn peer(self) -> Self {
        match self {
            Self::Emulated => Self::Exogenous,
            Self::Exogenous => Self::Emulated,
        }
    }

    pub fn prefix(self, config: &BridgeConfig) -> &str {
        match self {
            Self::Emulated => &config.emulated_prefix,
            Self::Exogenous => &config.exogenous_prefix,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emulated => f.pad("emulated"),
            Self::Exogenous => f.pad("exogenous"),
        }
    }
}

/// A resolved device name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceName {
    pub side: Side,
    pub minor: usize,
}

impl DeviceName {
    pub fn new(side: Side, minor: usize) -> Self {
        Self { side, minor }
    }

    /// Resolve `ttyEmulatedPort0`, `/dev/ttyExogenous3` and the like.
    ///
    /// Only the shape of the name is checked here; whether the minor exists
    /// is up to the registry.
    pub fn parse(name: &str, config: &BridgeConfig) -> BridgeResult<Self> {
        let bare = name.trim();
        let bare = bare.strip_prefix("/dev/").unwrap_or(bare);

        for side in [Side::Emulated, Side::Exogenous] {
            let Some(digits) = bare.strip_prefix(side.prefix(config)) else {
                continue;
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                break;
            }
            let minor = digits
                .parse()
                .map_err(|_| BridgeError::no_such_device(name))?;
            return Ok(Self { side, minor });
        }

        Err(BridgeError::no_such_device(name))
    }

    /// Render with the configured prefix.
    pub fn render(&self, config: &BridgeConfig) -> String {
        format!("{}{}", self.side.prefix(config), self.minor)
    }
}
