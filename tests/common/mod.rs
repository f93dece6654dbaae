//! Shared test utilities for serial_bridge integration tests.
//!
//! This module provides common test infrastructure including:
//! - Registry builders with small, test-friendly limits
//! - Paired handle setup
//! - JSON assertion helpers

#![allow(dead_code)]

use serde_json::Value;
use serial_bridge::config::BridgeConfig;
use serial_bridge::{PortHandle, Registry};
use std::sync::Arc;
use std::time::Duration;

/// Generous bound for "promptly" in threaded tests.
pub const PROMPT: Duration = Duration::from_secs(2);

/// Build a bridge config with the given per-endpoint capacity.
pub fn config_with_capacity(capacity: usize) -> BridgeConfig {
    BridgeConfig {
        total_signal_capacity: capacity,
        ..Default::default()
    }
}

/// Create a shared registry with default limits.
pub fn registry() -> Arc<Registry> {
    Arc::new(Registry::init(BridgeConfig::default()).expect("default config is valid"))
}

/// Create a shared registry from a custom config.
pub fn registry_with(config: BridgeConfig) -> Arc<Registry> {
    Arc::new(Registry::init(config).expect("test config is valid"))
}

/// Open both sides of `minor`: `(emulated, exogenous)`.
pub fn open_pair(registry: &Registry, minor: usize) -> (PortHandle, PortHandle) {
    let emulated = registry
        .open(&format!("ttyEmulatedPort{minor}"))
        .expect("open emulated side");
    let exogenous = registry
        .open(&format!("ttyExogenous{minor}"))
        .expect("open exogenous side");
    (emulated, exogenous)
}

/// Terminate `text` with the default delimiter.
pub fn line(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(b'\n');
    bytes
}

/// Assert that a JSON value contains specific fields with expected values.
pub fn assert_json_contains(actual: &Value, expected: &Value) {
    match (actual, expected) {
        (Value::Object(actual_map), Value::Object(expected_map)) => {
            for (key, expected_value) in expected_map {
                let actual_value = actual_map
                    .get(key)
                    .unwrap_or_else(|| panic!("Missing key '{}' in {}", key, actual));
                assert_json_contains(actual_value, expected_value);
            }
        }
        _ => assert_eq!(actual, expected),
    }
}

/// Spin until `n` readers are parked on the endpoint, so a test can act on a
/// reader that is known to be blocked.
pub fn wait_for_blocked_readers(registry: &Registry, device: &str, n: usize) {
    let endpoint = registry.resolve(device).expect("known device");
    let deadline = std::time::Instant::now() + PROMPT;
    while endpoint.status().blocked_readers < n {
        assert!(
            std::time::Instant::now() < deadline,
            "{device}: expected {n} blocked readers"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Same as [`wait_for_blocked_readers`] for writers waiting on a full ring.
pub fn wait_for_blocked_writers(registry: &Registry, device: &str, n: usize) {
    let endpoint = registry.resolve(device).expect("known device");
    let deadline = std::time::Instant::now() + PROMPT;
    while endpoint.status().blocked_writers < n {
        assert!(
            std::time::Instant::now() < deadline,
            "{device}: expected {n} blocked writers"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}
