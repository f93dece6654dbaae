//! Open handles on an endpoint.

use super::naming::Side;
use super::pair::DevicePair;
use super::signal::{split_signals, Signal};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::port::LineSettings;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeouts used by [`PortHandle::write`] and the `VirtualPort` impl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleTimeouts {
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

#[derive(Debug)]
struct HandleInner {
    id: u64,
    name: String,
    side: Side,
    pair: Arc<DevicePair>,
    config: Arc<BridgeConfig>,
    settings: LineSettings,
    timeouts: Mutex<HandleTimeouts>,
    closed: AtomicBool,
}

impl HandleInner {
    fn close(&self) -> BridgeResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(BridgeError::HandleClosed);
        }
        let fully_closed = self.pair.endpoint(self.side).release();
        self.pair.peer(self.side).peer_released(fully_closed);
        debug!(
            handle = self.id,
            device = %self.name,
            fully_closed,
            "Closed port"
        );
        Ok(())
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            let _ = self.close();
        }
    }
}

/// An open reference to one endpoint.
///
/// Clones share the same reference: closing any clone closes the handle for
/// all of them, which is how another thread cancels a pending read. Dropping
/// the last clone of an unclosed handle closes it.
#[derive(Debug, Clone)]
pub struct PortHandle {
    inner: Arc<HandleInner>,
}

impl PortHandle {
    pub(crate) fn new(
        id: u64,
        pair: Arc<DevicePair>,
        side: Side,
        config: Arc<BridgeConfig>,
        settings: LineSettings,
    ) -> Self {
        let name = pair.endpoint(side).name().to_string();
        Self {
            inner: Arc::new(HandleInner {
                id,
                name,
                side,
                pair,
                config,
                settings,
                timeouts: Mutex::new(HandleTimeouts::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Device name, e.g. `ttyEmulatedPort0`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn side(&self) -> Side {
        self.inner.side
    }

    pub fn minor(&self) -> usize {
        self.inner.pair.minor()
    }

    /// Line settings recorded at open; the bridge does not enforce them.
    pub fn settings(&self) -> &LineSettings {
        &self.inner.settings
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn timeouts(&self) -> HandleTimeouts {
        *self.inner.timeouts.lock()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        self.inner.timeouts.lock().read = timeout;
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) {
        self.inner.timeouts.lock().write = timeout;
    }

    /// Send `bytes` as one signal to the peer, using the handle's write timeout.
    pub fn write(&self, bytes: &[u8]) -> BridgeResult<usize> {
        let timeout = self.timeouts().write;
        self.write_timeout(bytes, timeout)
    }

    /// Send `bytes` as one signal to the peer.
    ///
    /// A full peer ring blocks up to `timeout`; `Some(Duration::ZERO)` fails
    /// immediately with `BufferFull`. The peer does not need to be open.
    pub fn write_timeout(&self, bytes: &[u8], timeout: Option<Duration>) -> BridgeResult<usize> {
        let inner = &self.inner;
        let signal = Signal::from(bytes);
        let len = signal.len();
        self.guard(
            inner
                .pair
                .peer(inner.side)
                .enqueue(signal, timeout, &inner.closed),
        )?;
        debug!(handle = inner.id, device = %inner.name, len, "Wrote signal");
        Ok(len)
    }

    /// Split `bytes` at the delimiter and send each line as its own signal.
    ///
    /// The lines are queued as one unit under the handle's write timeout:
    /// on any error nothing has been sent, so the caller may simply retry.
    /// A batch with more lines than the peer ring holds fails with
    /// `BufferFull`. Returns the number of signals sent.
    pub fn write_lines(&self, bytes: &[u8]) -> BridgeResult<usize> {
        let inner = &self.inner;
        let lines: Vec<Signal> = split_signals(bytes, inner.config.delimiter)
            .into_iter()
            .map(Signal::from)
            .collect();
        let count = lines.len();
        let timeout = self.timeouts().write;
        self.guard(
            inner
                .pair
                .peer(inner.side)
                .enqueue_batch(lines, timeout, &inner.closed),
        )?;
        debug!(handle = inner.id, device = %inner.name, count, "Wrote lines");
        Ok(count)
    }

    /// Receive the next signal written by the peer.
    ///
    /// `None` blocks until a signal arrives or the port is closed,
    /// `Some(Duration::ZERO)` polls and returns `WouldBlock` when empty.
    pub fn read(&self, timeout: Option<Duration>) -> BridgeResult<Signal> {
        let inner = &self.inner;
        let signal = self.guard(
            inner
                .pair
                .endpoint(inner.side)
                .dequeue(timeout, &inner.closed),
        )?;
        debug!(handle = inner.id, device = %inner.name, len = signal.len(), "Read signal");
        Ok(signal)
    }

    /// Close this handle; a second close fails with `HandleClosed`.
    pub fn close(&self) -> BridgeResult<()> {
        self.inner.close()
    }

    /// Free signal slots in the peer's ring.
    pub fn write_room(&self) -> BridgeResult<usize> {
        self.check_open()?;
        Ok(self.inner.pair.peer(self.inner.side).room())
    }

    /// Signals waiting to be read on this handle's endpoint.
    pub fn signals_to_read(&self) -> BridgeResult<usize> {
        self.check_open()?;
        Ok(self.inner.pair.endpoint(self.inner.side).queued_signals())
    }

    /// Bytes waiting to be read on this handle's endpoint.
    pub fn bytes_to_read(&self) -> BridgeResult<usize> {
        self.check_open()?;
        Ok(self.inner.pair.endpoint(self.inner.side).queued_bytes())
    }

    fn check_open(&self) -> BridgeResult<()> {
        if self.is_closed() {
            return Err(BridgeError::HandleClosed);
        }
        if self.inner.pair.is_faulted() {
            return Err(BridgeError::PairFaulted {
                minor: self.minor(),
            });
        }
        Ok(())
    }

    /// Make sure a fault seen on one side also wakes the other side's waiters.
    fn guard<T>(&self, result: BridgeResult<T>) -> BridgeResult<T> {
        if let Err(BridgeError::PairFaulted { .. }) = &result {
            self.inner.pair.wake_all();
        }
        if let Err(e @ BridgeError::PortClosed(_)) = &result {
            warn!(handle = self.inner.id, device = %self.inner.name, "{}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::bridge::Registry;
    use crate::config::BridgeConfig;
    use crate::error::BridgeError;
    use std::time::Duration;

    fn registry() -> Registry {
        Registry::init(BridgeConfig {
            max_minors: 1,
            total_signal_capacity: 4,
            max_signal_len: 8,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_double_close() {
        let registry = registry();
        let handle = registry.open("ttyEmulatedPort0").unwrap();
        let clone = handle.clone();

        handle.close().unwrap();
        assert!(clone.is_closed());
        assert_eq!(clone.close(), Err(BridgeError::HandleClosed));
        assert_eq!(clone.write(b"x\n"), Err(BridgeError::HandleClosed));
        assert_eq!(clone.read(None), Err(BridgeError::HandleClosed));
    }

    #[test]
    fn test_write_lines_splits_on_delimiter() {
        let registry = registry();
        let emu = registry.open("ttyEmulatedPort0").unwrap();
        let exo = registry.open("ttyExogenous0").unwrap();

        assert_eq!(emu.write_lines(b"a\nbb\ntail").unwrap(), 3);
        assert_eq!(exo.signals_to_read().unwrap(), 3);
        assert_eq!(exo.bytes_to_read().unwrap(), 9);
        assert_eq!(exo.read(None).unwrap(), b"a\n");
        assert_eq!(exo.read(None).unwrap(), b"bb\n");
        assert_eq!(exo.read(None).unwrap(), b"tail");
    }

    #[test]
    fn test_write_lines_rejects_batch_with_oversize_line() {
        let registry = registry();
        let emu = registry.open("ttyEmulatedPort0").unwrap();
        let exo = registry.open("ttyExogenous0").unwrap();

        let err = emu.write_lines(b"ok\nmuch too long\n").unwrap_err();
        assert_eq!(err, BridgeError::SignalTooLong { len: 14, max: 8 });
        assert_eq!(exo.signals_to_read().unwrap(), 0);
    }

    #[test]
    fn test_write_lines_is_all_or_nothing() {
        let registry = Registry::init(BridgeConfig {
            max_minors: 1,
            total_signal_capacity: 2,
            ..Default::default()
        })
        .unwrap();
        let emu = registry.open("ttyEmulatedPort0").unwrap();
        let exo = registry.open("ttyExogenous0").unwrap();
        emu.set_write_timeout(Some(Duration::ZERO));
        emu.write(b"first\n").unwrap();

        assert_eq!(
            emu.write_lines(b"a\nb\n"),
            Err(BridgeError::BufferFull { capacity: 2 })
        );
        assert_eq!(exo.signals_to_read().unwrap(), 1);

        assert_eq!(exo.read(None).unwrap(), b"first\n");
        assert_eq!(emu.write_lines(b"a\nb\n").unwrap(), 2);
        assert_eq!(exo.read(None).unwrap(), b"a\n");
        assert_eq!(exo.read(None).unwrap(), b"b\n");
    }

    #[test]
    fn test_write_lines_larger_than_ring_rejected() {
        let registry = Registry::init(BridgeConfig {
            max_minors: 1,
            total_signal_capacity: 1,
            ..Default::default()
        })
        .unwrap();
        let emu = registry.open("ttyEmulatedPort0").unwrap();
        let exo = registry.open("ttyExogenous0").unwrap();

        assert_eq!(
            emu.write_lines(b"a\nb\n"),
            Err(BridgeError::BufferFull { capacity: 1 })
        );
        assert_eq!(exo.signals_to_read().unwrap(), 0);
        assert_eq!(emu.write_lines(b"").unwrap(), 0);
    }

    #[test]
    fn test_write_room_tracks_peer_ring() {
        let registry = registry();
        let emu = registry.open("ttyEmulatedPort0").unwrap();

        assert_eq!(emu.write_room().unwrap(), 4);
        emu.write(b"1\n").unwrap();
        emu.write(b"2\n").unwrap();
        assert_eq!(emu.write_room().unwrap(), 2);
    }

    #[test]
    fn test_handle_write_timeout_applies() {
        let registry = Registry::init(BridgeConfig {
            max_minors: 1,
            total_signal_capacity: 1,
            ..Default::default()
        })
        .unwrap();
        let emu = registry.open("ttyEmulatedPort0").unwrap();
        emu.set_write_timeout(Some(Duration::from_millis(20)));

        emu.write(b"1\n").unwrap();
        assert_eq!(
            emu.write(b"2\n"),
            Err(BridgeError::Timeout(Duration::from_millis(20)))
        );
    }
}
