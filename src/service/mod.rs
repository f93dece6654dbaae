//! Service layer over the bridge.
//!
//! Front ends (the stdio command loop, the `exchange` subcommand) refer to
//! open ports by numeric handle id rather than holding `PortHandle`s
//! themselves. `BridgeService` keeps that table, applies the configured
//! default timeouts and turns results into serializable DTOs.
//!
//! ```text
//! stdio    ─┐
//! exchange ─┴──> BridgeService ──> Registry ──> DevicePair[minor]
//! ```

use crate::bridge::{EndpointStatus, PortHandle, Registry, Side};
use crate::config::DefaultsConfig;
use crate::error::BridgeError;
use crate::port::LineSettings;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

// ========== Error Types ==========

/// Service-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The bridge rejected the operation
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// No open handle with this id
    #[error("Unknown handle: {0}")]
    UnknownHandle(u64),

    /// Malformed request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ServiceError {
    /// Stable tag used in machine-readable responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bridge(e) => e.kind(),
            Self::UnknownHandle(_) => "UnknownHandle",
            Self::InvalidRequest(_) => "InvalidRequest",
        }
    }
}

/// Convenient Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// ========== Request/Response DTOs ==========

/// Parameters for opening a device.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenRequest {
    pub device: String,
    #[serde(default)]
    pub settings: Option<LineSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResult {
    pub handle: u64,
    pub device: String,
    pub side: Side,
    pub minor: usize,
    pub settings: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub bytes_written: usize,
    pub signals_written: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub data: String,
    pub bytes_read: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResult {
    pub handle: u64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResult {
    pub open_handles: usize,
    pub endpoints: Vec<EndpointStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult {
    pub devices: Vec<String>,
}

// ========== Service Implementation ==========

/// Handle table and DTO conversion on top of a shared [`Registry`].
#[derive(Debug, Clone)]
pub struct BridgeService {
    registry: Arc<Registry>,
    handles: Arc<Mutex<BTreeMap<u64, PortHandle>>>,
    defaults: DefaultsConfig,
}

impl BridgeService {
    pub fn new(registry: Arc<Registry>, defaults: DefaultsConfig) -> Self {
        Self {
            registry,
            handles: Arc::new(Mutex::new(BTreeMap::new())),
            defaults,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Open a device by name. Without explicit settings the configured
    /// default baud rate is recorded.
    pub fn open(&self, request: OpenRequest) -> ServiceResult<OpenResult> {
        let settings = request
            .settings
            .unwrap_or_else(|| LineSettings::with_baud_rate(self.defaults.baud_rate));
        let handle = self.registry.open_with(&request.device, settings)?;
        handle.set_read_timeout(self.defaults.read_timeout());
        handle.set_write_timeout(self.defaults.write_timeout());

        let result = OpenResult {
            handle: handle.id(),
            device: handle.name().to_string(),
            side: handle.side(),
            minor: handle.minor(),
            settings: settings.to_string(),
        };
        self.handles.lock().insert(handle.id(), handle);
        Ok(result)
    }

    /// Look up an open handle, e.g. to use it directly from another thread.
    pub fn handle(&self, id: u64) -> ServiceResult<PortHandle> {
        self.handles
            .lock()
            .get(&id)
            .cloned()
            .ok_or(ServiceError::UnknownHandle(id))
    }

    /// Write text through a handle.
    ///
    /// The delimiter is appended when missing, then every line becomes its
    /// own signal. The lines go out together or not at all, so a failed
    /// write can be retried without duplicating signals.
    pub fn write(&self, id: u64, data: &str) -> ServiceResult<WriteResult> {
        let handle = self.handle(id)?;
        let delimiter = self.registry.config().delimiter;

        let mut bytes = data.as_bytes().to_vec();
        if bytes.last() != Some(&delimiter) {
            bytes.push(delimiter);
        }
        let signals_written = handle.write_lines(&bytes)?;

        Ok(WriteResult {
            bytes_written: bytes.len(),
            signals_written,
        })
    }

    /// Read one signal. `timeout_ms` overrides the handle's read timeout;
    /// `Some(0)` polls.
    pub fn read(&self, id: u64, timeout_ms: Option<u64>) -> ServiceResult<ReadResult> {
        let handle = self.handle(id)?;
        let timeout = match timeout_ms {
            Some(ms) => Some(Duration::from_millis(ms)),
            None => handle.timeouts().read,
        };
        let signal = handle.read(timeout)?;

        Ok(ReadResult {
            bytes_read: signal.len(),
            data: signal.to_text(),
        })
    }

    pub fn close(&self, id: u64) -> ServiceResult<CloseResult> {
        let handle = self
            .handles
            .lock()
            .remove(&id)
            .ok_or(ServiceError::UnknownHandle(id))?;
        handle.close()?;
        debug!(handle = id, "Handle removed from service");

        Ok(CloseResult {
            handle: id,
            message: "closed".to_string(),
        })
    }

    /// Close every handle the service still holds.
    pub fn close_all(&self) -> usize {
        let handles = std::mem::take(&mut *self.handles.lock());
        let count = handles.len();
        for handle in handles.into_values() {
            let _ = handle.close();
        }
        count
    }

    pub fn status(&self) -> StatusResult {
        StatusResult {
            open_handles: self.handles.lock().len(),
            endpoints: self.registry.status(),
        }
    }

    pub fn list(&self) -> ListResult {
        ListResult {
            devices: self.registry.device_names(),
        }
    }
}
