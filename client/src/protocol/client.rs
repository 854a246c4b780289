use std::time::Duration;

use async_trait::async_trait;
use derive_builder::Builder;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::messages::{
    DataPayload, DeviceRecord, DeviceResource, ErrorDetail, PidState, TemperatureUnits,
    is_truthy_one,
};

pub const DEFAULT_HOST: &str = "https://dashboard.maxvapor.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum MaxVaporClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Could not connect to MaxVapor API, please verify your credentials")]
    Unauthorized,
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid client options: {0}")]
    Options(String),
}

/// Which discovery endpoint the account answers on.
///
/// Older accounts only expose the singular `/api/device/` listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoveryEndpoint {
    #[default]
    Devices,
    Legacy,
}

impl DiscoveryEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            DiscoveryEndpoint::Devices => "/api/devices/",
            DiscoveryEndpoint::Legacy => "/api/device/",
        }
    }
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct MaxVaporOptions {
    pub token: String,
    #[builder(default = "DEFAULT_HOST.to_string()")]
    pub host: String,
    #[builder(default)]
    pub discovery: DiscoveryEndpoint,
    #[builder(default = "DEFAULT_TIMEOUT")]
    pub timeout: Duration,
}

impl MaxVaporOptions {
    pub fn builder() -> MaxVaporOptionsBuilder {
        MaxVaporOptionsBuilder::default()
    }
}

/// Operations the bridge needs from the MaxVapor cloud.
#[async_trait]
pub trait MaxVaporClientTrait: Send + Sync {
    async fn devices(&self) -> Result<Vec<DeviceRecord>, MaxVaporClientError>;
    async fn firmware(&self, serial: &str) -> Result<String, MaxVaporClientError>;
    async fn temperature(&self, serial: &str) -> Result<f64, MaxVaporClientError>;
    async fn setpoint(&self, serial: &str) -> Result<f64, MaxVaporClientError>;
    /// Returns whether the cloud acknowledged the change.
    async fn set_setpoint(&self, serial: &str, value: f64) -> Result<bool, MaxVaporClientError>;
    async fn pid_state(&self, serial: &str) -> Result<PidState, MaxVaporClientError>;
    async fn set_pid_state(&self, serial: &str, value: u8) -> Result<bool, MaxVaporClientError>;
    async fn temperature_units(
        &self,
        serial: &str,
    ) -> Result<TemperatureUnits, MaxVaporClientError>;
    async fn set_temperature_units(
        &self,
        serial: &str,
        value: u8,
    ) -> Result<bool, MaxVaporClientError>;
}

#[derive(Clone)]
pub struct MaxVaporClient {
    http: reqwest::Client,
    host: String,
    token: String,
    discovery: DiscoveryEndpoint,
}

impl MaxVaporClient {
    pub fn new(options: MaxVaporOptions) -> Result<Self, MaxVaporClientError> {
        if options.token.trim().is_empty() {
            return Err(MaxVaporClientError::Options("token is required".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;
        Ok(Self {
            http,
            host: options.host.trim_end_matches('/').to_string(),
            token: options.token,
            discovery: options.discovery,
        })
    }

    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.host, self.discovery.path())
    }

    pub fn device_url(&self, serial: &str, resource: DeviceResource) -> String {
        format!("{}/api/device/{}/{}/", self.host, serial, resource.as_str())
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, MaxVaporClientError> {
        debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        decode_response(status, &body)
    }

    async fn put_data<V: Serialize + Send + Sync>(
        &self,
        url: &str,
        value: V,
    ) -> Result<bool, MaxVaporClientError> {
        debug!("PUT {url}");
        let response = self
            .http
            .put(url)
            .header(AUTHORIZATION, self.auth_header())
            .json(&DataPayload { data: value })
            .send()
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        let ack: Value = decode_response(status, &body)?;
        Ok(is_truthy_one(&ack))
    }
}

/// Maps an HTTP answer to either the decoded body or a client error.
pub(crate) fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<T, MaxVaporClientError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(MaxVaporClientError::Unauthorized);
    }
    if !status.is_success() {
        let detail = serde_json::from_slice::<ErrorDetail>(body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
        warn!("MaxVapor API answered {status}: {detail}");
        return Err(MaxVaporClientError::Api {
            status: status.as_u16(),
            detail,
        });
    }
    Ok(serde_json::from_slice(body)?)
}

#[async_trait]
impl MaxVaporClientTrait for MaxVaporClient {
    async fn devices(&self) -> Result<Vec<DeviceRecord>, MaxVaporClientError> {
        self.get_json(&self.discovery_url()).await
    }

    async fn firmware(&self, serial: &str) -> Result<String, MaxVaporClientError> {
        let value: Value = self
            .get_json(&self.device_url(serial, DeviceResource::Firmware))
            .await?;
        Ok(match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn temperature(&self, serial: &str) -> Result<f64, MaxVaporClientError> {
        self.get_json(&self.device_url(serial, DeviceResource::Temperature))
            .await
    }

    async fn setpoint(&self, serial: &str) -> Result<f64, MaxVaporClientError> {
        self.get_json(&self.device_url(serial, DeviceResource::Setpoint))
            .await
    }

    async fn set_setpoint(&self, serial: &str, value: f64) -> Result<bool, MaxVaporClientError> {
        self.put_data(&self.device_url(serial, DeviceResource::Setpoint), value)
            .await
    }

    async fn pid_state(&self, serial: &str) -> Result<PidState, MaxVaporClientError> {
        self.get_json(&self.device_url(serial, DeviceResource::PidState))
            .await
    }

    async fn set_pid_state(&self, serial: &str, value: u8) -> Result<bool, MaxVaporClientError> {
        self.put_data(&self.device_url(serial, DeviceResource::PidState), value)
            .await
    }

    async fn temperature_units(
        &self,
        serial: &str,
    ) -> Result<TemperatureUnits, MaxVaporClientError> {
        self.get_json(&self.device_url(serial, DeviceResource::TemperatureUnits))
            .await
    }

    async fn set_temperature_units(
        &self,
        serial: &str,
        value: u8,
    ) -> Result<bool, MaxVaporClientError> {
        self.put_data(
            &self.device_url(serial, DeviceResource::TemperatureUnits),
            value,
        )
        .await
    }
}
