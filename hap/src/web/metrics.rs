//! Prometheus metrics exposed via the `/metrics` endpoint.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Installs the Prometheus recorder and registers metric descriptions.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metric_descriptions();
    Ok(handle)
}

fn register_metric_descriptions() {
    describe_gauge!(
        "maxvapor_bridge_info",
        "Information about the bridge (always 1, labels contain version info)"
    );
    describe_gauge!(
        "maxvapor_bridge_uptime_seconds",
        "Time in seconds since the bridge started"
    );
    describe_gauge!(
        "maxvapor_devices_total",
        "Number of e-nails exposed to HomeKit"
    );
    describe_counter!(
        "maxvapor_discovery_total",
        "Total number of discovery passes against the MaxVapor API"
    );
    describe_counter!(
        "maxvapor_discovery_failure_total",
        "Total number of failed discovery passes"
    );
    describe_counter!(
        "maxvapor_accessories_registered_total",
        "Total number of accessories registered with HomeKit"
    );
    describe_counter!(
        "maxvapor_api_errors_total",
        "Total number of failed characteristic calls by operation"
    );
    describe_counter!(
        "maxvapor_hap_requests_total",
        "Total number of HomeKit characteristic reads and writes"
    );
}

pub struct Metrics;

impl Metrics {
    pub fn set_uptime(start_time: Instant) {
        gauge!("maxvapor_bridge_uptime_seconds").set(start_time.elapsed().as_secs_f64());
    }

    pub fn set_bridge_info(version: &str) {
        gauge!("maxvapor_bridge_info", "version" => version.to_string()).set(1.0);
    }

    pub fn set_device_count(count: usize) {
        gauge!("maxvapor_devices_total").set(count as f64);
    }

    pub fn record_discovery(success: bool) {
        counter!("maxvapor_discovery_total").increment(1);
        if !success {
            counter!("maxvapor_discovery_failure_total").increment(1);
        }
    }

    pub fn inc_registered(count: usize) {
        counter!("maxvapor_accessories_registered_total").increment(count as u64);
    }

    pub fn inc_api_errors(operation: &'static str) {
        counter!("maxvapor_api_errors_total", "operation" => operation).increment(1);
    }

    pub fn inc_hap_requests() {
        counter!("maxvapor_hap_requests_total").increment(1);
    }
}
