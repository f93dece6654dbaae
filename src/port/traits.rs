//! Line settings and the `VirtualPort` seam.
//!
//! Callers of a real serial port pass baud rate, framing and flow control at
//! open time. The bridge accepts the same parameters so such callers work
//! unchanged, but it is not rate-limited and never enforces them.

use crate::bridge::{PortHandle, Signal};
use crate::error::BridgeResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Serial line parameters recorded on a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl LineSettings {
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Default::default()
        }
    }
}

/// Renders the usual `9600 8N1` shorthand.
impl fmt::Display for LineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = match self.data_bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        };
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        write!(f, "{} {}{}{}", self.baud_rate, bits, parity, stop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

/// Signal-oriented port I/O.
///
/// Code written against this trait can be handed a bridge endpoint in place of
/// a real device.
pub trait VirtualPort: Send + fmt::Debug {
    /// Send one signal. Returns the number of bytes queued.
    fn write_bytes(&mut self, data: &[u8]) -> BridgeResult<usize>;

    /// Receive the next signal, honouring the port's read timeout.
    fn read_signal(&mut self) -> BridgeResult<Signal>;

    /// Name of the device this port is attached to.
    fn name(&self) -> &str;

    /// Set the read timeout; `None` blocks indefinitely.
    fn set_timeout(&mut self, timeout: Option<Duration>) -> BridgeResult<()>;

    /// Bytes waiting to be read, if known.
    fn bytes_to_read(&self) -> Option<usize> {
        None
    }
}

impl VirtualPort for PortHandle {
    fn write_bytes(&mut self, data: &[u8]) -> BridgeResult<usize> {
        self.write(data)
    }

    fn read_signal(&mut self) -> BridgeResult<Signal> {
        let timeout = self.timeouts().read;
        self.read(timeout)
    }

    fn name(&self) -> &str {
        PortHandle::name(self)
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> BridgeResult<()> {
        self.set_read_timeout(timeout);
        Ok(())
    }

    fn bytes_to_read(&self) -> Option<usize> {
        PortHandle::bytes_to_read(self).ok()
    }
}
