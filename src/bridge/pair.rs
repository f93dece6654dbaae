//! Two cross-linked endpoints sharing a minor number.

use super::endpoint::{Endpoint, EndpointStatus};
use super::naming::{DeviceName, Side};
use crate::config::BridgeConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

/// A virtual null-modem link.
///
/// Writes through a handle on one side land in the other side's ring. The
/// `faulted` flag is shared by both endpoints, so aborting a pair never
/// touches any other minor.
#[derive(Debug)]
pub struct DevicePair {
    minor: usize,
    emulated: Endpoint,
    exogenous: Endpoint,
    faulted: Arc<AtomicBool>,
}

impl DevicePair {
    pub(crate) fn new(minor: usize, config: &BridgeConfig) -> Self {
        let faulted = Arc::new(AtomicBool::new(false));
        let make = |side| {
            Endpoint::new(
                DeviceName::new(side, minor).render(config),
                minor,
                side,
                config.total_signal_capacity,
                config.max_signal_len,
                Arc::clone(&faulted),
            )
        };
        let emulated = make(Side::Emulated);
        let exogenous = make(Side::Exogenous);

        Self {
            minor,
            emulated,
            exogenous,
            faulted,
        }
    }

    pub fn minor(&self) -> usize {
        self.minor
    }

    pub fn endpoint(&self, side: Side) -> &Endpoint {
        match side {
            Side::Emulated => &self.emulated,
            Side::Exogenous => &self.exogenous,
        }
    }

    /// The endpoint a write on `side` delivers to.
    pub fn peer(&self, side: Side) -> &Endpoint {
        self.endpoint(side.peer())
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Abort this pair: every pending and future operation on it fails.
    pub(crate) fn abort(&self, reason: &str) {
        if !self.faulted.swap(true, Ordering::AcqRel) {
            error!(minor = self.minor, "Device pair aborted: {}", reason);
        }
        self.wake_all();
    }

    /// Re-deliver wakeups on both sides, e.g. after one side detected a fault.
    pub(crate) fn wake_all(&self) {
        self.emulated.wake_all();
        self.exogenous.wake_all();
    }

    pub(crate) fn shutdown(&self) {
        self.emulated.shutdown();
        self.exogenous.shutdown();
    }

    pub fn status(&self) -> [EndpointStatus; 2] {
        [self.emulated.status(), self.exogenous.status()]
    }
}
