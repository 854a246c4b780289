//! Shared bridge state for the web endpoints and metrics.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// An e-nail exposed by the bridge.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Identifier derived from the serial.
    pub uuid: String,
    pub serial: String,
    pub name: String,
    /// HAP accessory id.
    pub aid: u64,
    /// Whether the accessory came from the cache rather than being created this run.
    pub restored: bool,
    /// Last discovery pass that listed the device.
    pub last_seen: Option<Instant>,
}

/// Outcome of the last discovery pass against the MaxVapor cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    /// No discovery pass has completed yet.
    Unknown,
    Connected,
    /// The API rejected the token.
    Unauthorized,
    Error,
}

impl ApiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiStatus::Unknown => "unknown",
            ApiStatus::Connected => "connected",
            ApiStatus::Unauthorized => "unauthorized",
            ApiStatus::Error => "error",
        }
    }
}

#[derive(Debug)]
struct BridgeStateInner {
    start_time: Instant,
    api_status: ApiStatus,
    pairing_pin: String,
    pairing_url: String,
    devices: HashMap<String, DeviceInfo>,
    last_discovery: Option<Instant>,
    discovery_count: u64,
    discovery_failures: u64,
    api_host: Option<String>,
    last_error: Option<String>,
}

/// Thread-safe state shared by the platform and the web server.
#[derive(Debug, Clone)]
pub struct BridgeState {
    inner: Arc<RwLock<BridgeStateInner>>,
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BridgeStateInner {
                start_time: Instant::now(),
                api_status: ApiStatus::Unknown,
                pairing_pin: String::new(),
                pairing_url: String::new(),
                devices: HashMap::new(),
                last_discovery: None,
                discovery_count: 0,
                discovery_failures: 0,
                api_host: None,
                last_error: None,
            })),
        }
    }

    pub fn start_time(&self) -> Instant {
        self.inner.read().start_time
    }

    pub fn api_status(&self) -> ApiStatus {
        self.inner.read().api_status
    }

    pub fn set_pairing(&self, pin: String, url: String) {
        let mut inner = self.inner.write();
        inner.pairing_pin = pin;
        inner.pairing_url = url;
    }

    pub fn set_api_host(&self, host: String) {
        self.inner.write().api_host = Some(host);
    }

    /// Registers a device or refreshes the one with the same identifier.
    pub fn register_device(&self, device: DeviceInfo) {
        self.inner.write().devices.insert(device.uuid.clone(), device);
    }

    pub fn mark_seen(&self, uuid: &str) {
        if let Some(device) = self.inner.write().devices.get_mut(uuid) {
            device.last_seen = Some(Instant::now());
        }
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        let mut devices: Vec<_> = self.inner.read().devices.values().cloned().collect();
        devices.sort_by_key(|d| d.aid);
        devices
    }

    pub fn device_count(&self) -> usize {
        self.inner.read().devices.len()
    }

    pub fn record_discovery_success(&self) {
        let mut inner = self.inner.write();
        inner.discovery_count += 1;
        inner.last_discovery = Some(Instant::now());
        inner.api_status = ApiStatus::Connected;
        inner.last_error = None;
    }

    pub fn record_discovery_failure(&self, status: ApiStatus, error: String) {
        let mut inner = self.inner.write();
        inner.discovery_count += 1;
        inner.discovery_failures += 1;
        inner.api_status = status;
        inner.last_error = Some(error);
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.read().last_error.clone()
    }

    pub fn summary(&self) -> BridgeStateSummary {
        let inner = self.inner.read();
        BridgeStateSummary {
            uptime_seconds: inner.start_time.elapsed().as_secs(),
            api_status: inner.api_status,
            pairing_pin: inner.pairing_pin.clone(),
            pairing_url: inner.pairing_url.clone(),
            device_count: inner.devices.len(),
            last_discovery_seconds_ago: inner.last_discovery.map(|t| t.elapsed().as_secs()),
            discovery_count: inner.discovery_count,
            discovery_failures: inner.discovery_failures,
            api_host: inner.api_host.clone(),
            last_error: inner.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeStateSummary {
    pub uptime_seconds: u64,
    pub api_status: ApiStatus,
    pub pairing_pin: String,
    pub pairing_url: String,
    pub device_count: usize,
    pub last_discovery_seconds_ago: Option<u64>,
    pub discovery_count: u64,
    pub discovery_failures: u64,
    pub api_host: Option<String>,
    pub last_error: Option<String>,
}

impl BridgeStateSummary {
    /// Format uptime as a human-readable string.
    pub fn uptime_display(&self) -> String {
        let secs = self.uptime_seconds;
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if days > 0 {
            format!("{days}d {hours}h {mins}m {secs}s")
        } else if hours > 0 {
            format!("{hours}h {mins}m {secs}s")
        } else if mins > 0 {
            format!("{mins}m {secs}s")
        } else {
            format!("{secs}s")
        }
    }

    pub fn discovery_success_rate(&self) -> f64 {
        if self.discovery_count == 0 {
            100.0
        } else {
            let successes = self.discovery_count - self.discovery_failures;
            (successes as f64 / self.discovery_count as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(uuid: &str, aid: u64) -> DeviceInfo {
        DeviceInfo {
            uuid: uuid.to_string(),
            serial: format!("serial-{aid}"),
            name: "Nail".to_string(),
            aid,
            restored: false,
            last_seen: None,
        }
    }

    #[test]
    fn test_bridge_state_new() {
        let state = BridgeState::new();
        assert_eq!(state.api_status(), ApiStatus::Unknown);
        assert_eq!(state.device_count(), 0);
    }

    #[test]
    fn test_register_device_is_keyed_by_uuid() {
        let state = BridgeState::new();
        state.register_device(device("u1", 3));
        state.register_device(device("u2", 2));
        state.register_device(device("u1", 3));
        let devices = state.devices();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].aid, 2);
    }

    #[test]
    fn test_mark_seen() {
        let state = BridgeState::new();
        state.register_device(device("u1", 2));
        state.mark_seen("u1");
        state.mark_seen("missing");
        assert!(state.devices()[0].last_seen.is_some());
    }

    #[test]
    fn test_discovery_recording() {
        let state = BridgeState::new();
        state.record_discovery_success();
        state.record_discovery_failure(ApiStatus::Unauthorized, "bad token".into());
        let summary = state.summary();
        assert_eq!(summary.discovery_count, 2);
        assert_eq!(summary.discovery_failures, 1);
        assert_eq!(summary.api_status, ApiStatus::Unauthorized);
        assert_eq!(summary.discovery_success_rate(), 50.0);
        assert_eq!(state.last_error().as_deref(), Some("bad token"));

        state.record_discovery_success();
        assert_eq!(state.api_status(), ApiStatus::Connected);
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_uptime_display() {
        let mut summary = BridgeState::new().summary();
        summary.uptime_seconds = 90061;
        assert_eq!(summary.uptime_display(), "1d 1h 1m 1s");
        summary.uptime_seconds = 61;
        assert_eq!(summary.uptime_display(), "1m 1s");
    }
}
