//! The fixed table of device pairs, indexed by minor number.

use super::endpoint::EndpointStatus;
use super::handle::PortHandle;
use super::naming::{DeviceName, Side};
use super::pair::DevicePair;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::port::LineSettings;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Every device pair of one bridge instance.
///
/// Membership is fixed at [`Registry::init`]; pairs are never added or
/// removed afterwards. Dropping the registry tears it down.
#[derive(Debug)]
pub struct Registry {
    config: Arc<BridgeConfig>,
    pairs: Vec<Arc<DevicePair>>,
    next_handle_id: AtomicU64,
    torn_down: AtomicBool,
}

/// A resolved endpoint, borrowed from its registry.
#[derive(Debug, Clone, Copy)]
pub struct EndpointRef<'r> {
    registry: &'r Registry,
    pair: &'r Arc<DevicePair>,
    side: Side,
}

impl<'r> EndpointRef<'r> {
    pub fn minor(&self) -> usize {
        self.pair.minor()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn name(&self) -> &'r str {
        self.pair.endpoint(self.side).name()
    }

    /// Open a new handle with default line settings.
    pub fn open(&self) -> BridgeResult<PortHandle> {
        self.open_with(LineSettings::default())
    }

    /// Open a new handle; `settings` are recorded, not enforced.
    pub fn open_with(&self, settings: LineSettings) -> BridgeResult<PortHandle> {
        let open_count = self.pair.endpoint(self.side).open()?;
        let id = self.registry.next_handle_id.fetch_add(1, Ordering::Relaxed);
        let handle = PortHandle::new(
            id,
            Arc::clone(self.pair),
            self.side,
            Arc::clone(&self.registry.config),
            settings,
        );
        debug!(
            handle = id,
            device = self.name(),
            open_count,
            %settings,
            "Opened port"
        );
        Ok(handle)
    }

    pub fn open_count(&self) -> usize {
        self.pair.endpoint(self.side).open_count()
    }

    pub fn status(&self) -> EndpointStatus {
        self.pair.endpoint(self.side).status()
    }
}

impl Registry {
    /// Validate `config` and allocate `max_minors` pairs of empty endpoints.
    pub fn init(config: BridgeConfig) -> BridgeResult<Self> {
        config
            .validate()
            .map_err(|e| BridgeError::config_invalid(e.to_string()))?;

        let pairs = (0..config.max_minors)
            .map(|minor| Arc::new(DevicePair::new(minor, &config)))
            .collect();

        info!(
            minors = config.max_minors,
            capacity = config.total_signal_capacity,
            max_signal_len = config.max_signal_len,
            major = config.major,
            "Bridge initialized: {}N <-> {}N",
            config.emulated_prefix,
            config.exogenous_prefix
        );

        Ok(Self {
            config: Arc::new(config),
            pairs,
            next_handle_id: AtomicU64::new(1),
            torn_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn max_minors(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    pub fn pair(&self, minor: usize) -> BridgeResult<&Arc<DevicePair>> {
        self.pairs.get(minor).ok_or_else(|| {
            BridgeError::no_such_device(DeviceName::new(Side::Emulated, minor).render(&self.config))
        })
    }

    /// Resolve one side of a pair.
    pub fn lookup(&self, minor: usize, side: Side) -> BridgeResult<EndpointRef<'_>> {
        let pair = self.pairs.get(minor).ok_or_else(|| {
            BridgeError::no_such_device(DeviceName::new(side, minor).render(&self.config))
        })?;
        Ok(EndpointRef {
            registry: self,
            pair,
            side,
        })
    }

    /// Resolve a device name such as `ttyExogenous0` or `/dev/ttyEmulatedPort1`.
    pub fn resolve(&self, name: &str) -> BridgeResult<EndpointRef<'_>> {
        let device = DeviceName::parse(name, &self.config)?;
        if device.minor >= self.pairs.len() {
            return Err(BridgeError::no_such_device(name));
        }
        self.lookup(device.minor, device.side)
    }

    pub fn open(&self, name: &str) -> BridgeResult<PortHandle> {
        self.resolve(name)?.open()
    }

    pub fn open_with(&self, name: &str, settings: LineSettings) -> BridgeResult<PortHandle> {
        self.resolve(name)?.open_with(settings)
    }

    /// Device names, emulated side first for each minor.
    pub fn device_names(&self) -> Vec<String> {
        self.pairs
            .iter()
            .flat_map(|pair| {
                [Side::Emulated, Side::Exogenous]
                    .into_iter()
                    .map(move |side| pair.endpoint(side).name().to_string())
            })
            .collect()
    }

    pub fn status(&self) -> Vec<EndpointStatus> {
        self.pairs.iter().flat_map(|pair| pair.status()).collect()
    }

    /// Abort one pair. Its pending and future operations fail with
    /// `PairFaulted`; all other pairs keep working.
    pub fn abort_pair(&self, minor: usize, reason: &str) -> BridgeResult<()> {
        self.pair(minor)?.abort(reason);
        Ok(())
    }

    /// Shut every pair down and wake all waiters with `DriverShutdown`.
    ///
    /// Idempotent. Handles stay valid objects but every further operation on
    /// them fails.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for pair in &self.pairs {
            pair.shutdown();
        }
        info!(minors = self.pairs.len(), "Bridge torn down");
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.teardown();
    }
}
