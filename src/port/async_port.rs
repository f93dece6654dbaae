//! Async adapter for bridge handles.
//!
//! Reads and full-ring writes block on a condition variable, so every call is
//! moved onto tokio's blocking pool with `spawn_blocking` and the runtime's
//! worker threads never wait on a bridge lock.

use super::traits::LineSettings;
use crate::bridge::{PortHandle, Signal};
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::task::JoinError;

/// Async counterpart of [`VirtualPort`](super::traits::VirtualPort).
#[async_trait]
pub trait AsyncVirtualPort: Send + Sync {
    /// Send one signal. Returns the number of bytes queued.
    async fn write_bytes(&self, data: &[u8]) -> BridgeResult<usize>;

    /// Receive the next signal, waiting at most `timeout`.
    async fn read_signal(&self, timeout: Option<Duration>) -> BridgeResult<Signal>;

    /// Name of the device this port is attached to.
    fn name(&self) -> &str;

    /// Line settings recorded at open.
    fn settings(&self) -> &LineSettings;

    /// Bytes waiting to be read.
    async fn bytes_available(&self) -> BridgeResult<usize>;
}

/// A [`PortHandle`] usable from async code.
///
/// Clones share the underlying handle, so one task may `close` while another
/// is parked in `read`; the pending read then returns promptly.
#[derive(Debug, Clone)]
pub struct AsyncPortHandle {
    inner: PortHandle,
}

impl AsyncPortHandle {
    pub fn new(handle: PortHandle) -> Self {
        Self { inner: handle }
    }

    pub fn handle(&self) -> &PortHandle {
        &self.inner
    }

    pub fn into_inner(self) -> PortHandle {
        self.inner
    }

    pub async fn write(&self, data: &[u8]) -> BridgeResult<usize> {
        self.write_bytes(data).await
    }

    pub async fn write_lines(&self, data: &[u8]) -> BridgeResult<usize> {
        let data = data.to_vec();
        let handle = self.inner.clone();
        tokio::task::spawn_blocking(move || handle.write_lines(&data))
            .await
            .map_err(join_error)?
    }

    pub async fn read(&self, timeout: Option<Duration>) -> BridgeResult<Signal> {
        self.read_signal(timeout).await
    }

    /// Closing never blocks, so it runs inline.
    pub fn close(&self) -> BridgeResult<()> {
        self.inner.close()
    }
}

impl From<PortHandle> for AsyncPortHandle {
    fn from(handle: PortHandle) -> Self {
        Self::new(handle)
    }
}

#[async_trait]
impl AsyncVirtualPort for AsyncPortHandle {
    async fn write_bytes(&self, data: &[u8]) -> BridgeResult<usize> {
        let data = data.to_vec();
        let handle = self.inner.clone();

        tokio::task::spawn_blocking(move || handle.write(&data))
            .await
            .map_err(join_error)?
    }

    async fn read_signal(&self, timeout: Option<Duration>) -> BridgeResult<Signal> {
        // A poll never waits, no need for the blocking pool.
        if timeout == Some(Duration::ZERO) {
            return self.inner.read(timeout);
        }
        let handle = self.inner.clone();

        tokio::task::spawn_blocking(move || handle.read(timeout))
            .await
            .map_err(join_error)?
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn settings(&self) -> &LineSettings {
        self.inner.settings()
    }

    async fn bytes_available(&self) -> BridgeResult<usize> {
        PortHandle::bytes_to_read(&self.inner)
    }
}

/// A panicking blocking task re-panics here; a cancelled one means the
/// runtime is going away.
fn join_error(e: JoinError) -> BridgeError {
    if e.is_panic() {
        std::panic::resume_unwind(e.into_panic());
    }
    BridgeError::DriverShutdown
}
