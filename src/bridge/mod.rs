//! The paired virtual serial-port bridge.
//!
//! A [`Registry`] holds a fixed number of [`DevicePair`]s. Each pair links an
//! emulated port (opened by the application under test) with an exogenous
//! port (opened by the harness driving it), like a null-modem cable:
//!
//! ```text
//!   ttyEmulatedPortN                         ttyExogenousN
//!   write ──────────> [ exogenous ring ] ──> read
//!   read  <────────── [ emulated ring  ] <── write
//! ```
//!
//! Traffic moves as whole [`Signal`]s. Each ring is bounded; a writer facing a
//! full ring blocks (or fails with `BufferFull` when non-blocking), a reader
//! facing an empty one blocks until a signal arrives, its timeout expires or
//! the port is closed.
//!
//! # Example
//!
//! ```rust
//! use serial_bridge::bridge::Registry;
//! use serial_bridge::config::BridgeConfig;
//! use std::time::Duration;
//!
//! let registry = Registry::init(BridgeConfig::default())?;
//! let app = registry.open("ttyEmulatedPort0")?;
//! let harness = registry.open("ttyExogenous0")?;
//!
//! harness.write(b"MOVE 10\n")?;
//! let signal = app.read(Some(Duration::from_secs(1)))?;
//! assert_eq!(signal, b"MOVE 10\n");
//! # Ok::<(), serial_bridge::BridgeError>(())
//! ```

mod endpoint;
mod handle;
mod naming;
mod pair;
mod registry;
mod ring;
mod signal;

pub use endpoint::{Endpoint, EndpointStats, EndpointStatus};
pub use handle::{HandleTimeouts, PortHandle};
pub use naming::{DeviceName, Side};
pub use pair::DevicePair;
pub use registry::{EndpointRef, Registry};
pub use ring::RingBuffer;
pub use signal::{split_signals, Signal};
