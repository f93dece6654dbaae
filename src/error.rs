//! Bridge error types.
//!
//! Every operation on the bridge returns one of these variants to the caller.
//! Nothing is retried internally; whether to reattempt after `BufferFull` or
//! `Timeout` is up to the caller (see [`BridgeError::is_retryable`]).

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the registry, endpoints and handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The configuration handed to `Registry::init` violates an invariant.
    #[error("Invalid bridge configuration: {0}")]
    ConfigInvalid(String),

    /// The requested minor number or device name is not served by the registry.
    #[error("No such device: {0}")]
    NoSuchDevice(String),

    /// The payload exceeds `max_signal_len`.
    #[error("Signal of {len} bytes exceeds the maximum of {max} bytes")]
    SignalTooLong { len: usize, max: usize },

    /// The peer's buffer is full and the write was non-blocking.
    #[error("Peer buffer is full ({capacity} signals queued)")]
    BufferFull { capacity: usize },

    /// A bounded wait expired.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A non-blocking read found no queued signal.
    #[error("No signal available")]
    WouldBlock,

    /// The handle used for the operation has already been closed.
    #[error("Handle is closed")]
    HandleClosed,

    /// The endpoint (or its peer) was fully closed while the operation was pending.
    #[error("Port {0} was closed while the operation was pending")]
    PortClosed(String),

    /// The registry was torn down.
    #[error("Bridge driver has been shut down")]
    DriverShutdown,

    /// The device pair hit a broken internal invariant and was aborted.
    #[error("Device pair {minor} aborted after an internal fault")]
    PairFaulted { minor: usize },
}

impl BridgeError {
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid(message.into())
    }

    pub fn no_such_device(device: impl std::fmt::Display) -> Self {
        Self::NoSuchDevice(device.to_string())
    }

    /// Transient conditions a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BufferFull { .. } | Self::Timeout(_) | Self::WouldBlock
        )
    }

    /// Stable tag used in machine-readable responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigInvalid(_) => "ConfigInvalid",
            Self::NoSuchDevice(_) => "NoSuchDevice",
            Self::SignalTooLong { .. } => "SignalTooLong",
            Self::BufferFull { .. } => "BufferFull",
            Self::Timeout(_) => "Timeout",
            Self::WouldBlock => "WouldBlock",
            Self::HandleClosed => "HandleClosed",
            Self::PortClosed(_) => "PortClosed",
            Self::DriverShutdown => "DriverShutdown",
            Self::PairFaulted { .. } => "PairFaulted",
        }
    }
}

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
