//! Serial Bridge Library
//!
//! Paired virtual serial ports. Each minor number links an emulated port, which
//! the application under test opens as if it were a serial device, with an
//! exogenous port driven by a test harness. Line-terminated signals written on
//! one side are delivered, in order and byte for byte, on the other.
//!
//! # Modules
//!
//! - `bridge`: registry, device pairs, endpoints and handles
//! - `config`: Configuration management with TOML and C header support
//! - `error`: Bridge error taxonomy
//! - `port`: Line settings, the `VirtualPort` trait and the async adapter
//! - `service`: Handle table and DTOs for front ends
//! - `stdio`: JSON line command interface

pub mod bridge;
pub mod config;
pub mod error;
pub mod port;
pub mod service;
pub mod stdio;

// Re-export commonly used types for convenience
pub use bridge::{DeviceName, EndpointStatus, PortHandle, Registry, Side, Signal};
pub use error::{BridgeError, BridgeResult};
pub use port::{
    AsyncPortHandle, AsyncVirtualPort, DataBits, FlowControl, LineSettings, Parity, StopBits,
    VirtualPort,
};
pub use service::{
    BridgeService, CloseResult, ListResult, OpenRequest, OpenResult, ReadResult, ServiceError,
    ServiceResult, StatusResult, WriteResult,
};

// Re-export config types
pub use config::{BridgeConfig, Config, ConfigError, ConfigLoader, ConfigResult};
