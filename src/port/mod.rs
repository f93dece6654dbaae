//! Port-facing surface of the bridge.
//!
//! Line settings accepted at open time, the `VirtualPort` trait that lets a
//! bridge handle stand in for a serial device, and its async adapter.

pub mod async_port;
pub mod traits;

pub use async_port::{AsyncPortHandle, AsyncVirtualPort};
pub use traits::*;
