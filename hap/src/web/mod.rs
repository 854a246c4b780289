//! Status and Prometheus metrics server.

pub mod metrics;
pub mod state;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::web::metrics::Metrics;
use crate::web::state::{ApiStatus, BridgeState};

#[derive(Clone)]
pub struct AppState {
    pub bridge_state: BridgeState,
    pub metrics_handle: Option<PrometheusHandle>,
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub port: u16,
    pub enabled: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            enabled: true,
        }
    }
}

/// Spawns the web server in the background and returns once it is listening.
pub async fn start_web_server(
    config: WebConfig,
    bridge_state: BridgeState,
) -> Result<(), std::io::Error> {
    if !config.enabled {
        info!("Web server is disabled");
        return Ok(());
    }

    let metrics_handle = match metrics::init_metrics() {
        Ok(handle) => {
            Metrics::set_bridge_info(env!("CARGO_PKG_VERSION"));
            Some(handle)
        }
        Err(e) => {
            warn!("Prometheus recorder not installed: {e}");
            None
        }
    };

    let app = router(AppState {
        bridge_state,
        metrics_handle,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting web server on http://{addr}");
    let listener = TcpListener::bind(addr).await?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {e}");
        }
    });

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/status", get(api_status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Healthy as long as the last discovery pass reached the API.
async fn health_handler(State(state): State<AppState>) -> Response {
    match state.bridge_state.api_status() {
        ApiStatus::Connected | ApiStatus::Unknown => (StatusCode::OK, "OK").into_response(),
        ApiStatus::Unauthorized | ApiStatus::Error => {
            (StatusCode::SERVICE_UNAVAILABLE, "UNHEALTHY").into_response()
        }
    }
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(handle) = state.metrics_handle else {
        return (StatusCode::NOT_FOUND, "Metrics disabled").into_response();
    };
    Metrics::set_uptime(state.bridge_state.start_time());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
        .into_response()
}

async fn api_status_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let summary = state.bridge_state.summary();
    let devices: Vec<_> = state
        .bridge_state
        .devices()
        .into_iter()
        .map(|d| {
            serde_json::json!({
                "uuid": d.uuid,
                "serial": d.serial,
                "name": d.name,
                "aid": d.aid,
                "restored": d.restored,
                "last_seen_seconds_ago": d.last_seen.map(|t| t.elapsed().as_secs()),
            })
        })
        .collect();

    Json(serde_json::json!({
        "status": "ok",
        "uptime": summary.uptime_display(),
        "uptime_seconds": summary.uptime_seconds,
        "api_status": summary.api_status.as_str(),
        "api_host": summary.api_host,
        "pairing_pin": summary.pairing_pin,
        "pairing_url": summary.pairing_url,
        "device_count": summary.device_count,
        "devices": devices,
        "discovery": {
            "last_seconds_ago": summary.last_discovery_seconds_ago,
            "total": summary.discovery_count,
            "failures": summary.discovery_failures,
            "success_rate": summary.discovery_success_rate(),
        },
        "last_error": summary.last_error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_state() -> AppState {
        AppState {
            bridge_state: BridgeState::new(),
            metrics_handle: None,
        }
    }

    #[tokio::test]
    async fn test_health_follows_api_status() {
        let state = app_state();
        let response = health_handler(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        state
            .bridge_state
            .record_discovery_failure(ApiStatus::Unauthorized, "401".into());
        let response = health_handler(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let response = metrics_handler(State(app_state())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_status_lists_devices() {
        let state = app_state();
        state.bridge_state.register_device(state::DeviceInfo {
            uuid: "u1".into(),
            serial: "ABC123".into(),
            name: "Nail1".into(),
            aid: 2,
            restored: false,
            last_seen: None,
        });
        let Json(body) = api_status_handler(State(state)).await;
        assert_eq!(body["device_count"], 1);
        assert_eq!(body["devices"][0]["serial"], "ABC123");
        assert_eq!(body["api_status"], "unknown");
    }
}
