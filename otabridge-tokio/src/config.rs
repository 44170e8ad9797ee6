//! Runtime configuration

use std::time::Duration;

/// Firmware version reported alongside update jobs
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
}

impl AppVersion {
    pub const fn new(major: u8, minor: u8, build: u16) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }
}

impl std::fmt::Display for AppVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Runtime configuration for the update bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Thing name the device is registered under (default: "otabridge")
    pub thing_name: String,
    /// Interval between statistics readouts in milliseconds (default: 1000)
    pub stats_interval_ms: u64,
    /// Longest wait for the shared client lock in milliseconds (default: 100)
    pub gateway_lock_timeout_ms: u64,
    /// Capacity of the engine event queue (default: 8)
    pub event_queue_depth: usize,
    /// Capacity of the inbound message channel (default: 16)
    pub inbound_capacity: usize,
    /// Interval between telemetry drains in milliseconds (default: 3000)
    pub publish_interval_ms: u64,
    /// Pause between consecutive telemetry publishes in milliseconds (default: 50)
    pub publish_spacing_ms: u64,
    /// Drop job subscriptions when the engine shuts down (default: true)
    pub unsubscribe_on_shutdown: bool,
    /// Version of the running image (default: 1.1.1)
    pub firmware_version: AppVersion,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            thing_name: "otabridge".to_string(),
            stats_interval_ms: 1000,
            gateway_lock_timeout_ms: 100,
            event_queue_depth: 8,
            inbound_capacity: 16,
            publish_interval_ms: 3000,
            publish_spacing_ms: 50,
            unsubscribe_on_shutdown: true,
            firmware_version: AppVersion::new(1, 1, 1),
        }
    }
}

impl BridgeConfig {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    pub fn gateway_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_lock_timeout_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn publish_spacing(&self) -> Duration {
        Duration::from_millis(self.publish_spacing_ms)
    }
}
