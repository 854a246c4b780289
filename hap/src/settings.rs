use anyhow::{Result, bail};
use maxvapor_client_rs::{DEFAULT_HOST, DiscoveryEndpoint, MaxVaporOptions};
use serde::{Deserialize, Serialize};

use crate::web::WebConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// MaxVapor API token.
    pub token: Option<String>,
    pub host: Option<String>,
    /// Discover through the singular `/api/device/` listing.
    pub legacy_discovery: Option<bool>,
    pub pairing_code: [u8; 8],
    pub setup_id: Option<String>,
    pub bridge_name: Option<String>,
    /// Where HAP pairing data and the accessory cache live.
    pub storage_dir: Option<String>,
    pub web_enabled: Option<bool>,
    pub web_port: Option<u16>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            token: None,
            host: None,
            legacy_discovery: Some(false),
            pairing_code: [2, 7, 1, 8, 2, 8, 1, 8],
            setup_id: Some(String::from("MXVP")),
            bridge_name: Some(String::from("MaxVapor Bridge")),
            storage_dir: Some(String::from(".")),
            web_enabled: Some(true),
            web_port: Some(8080),
        }
    }
}

impl Settings {
    /// Values given on the command line win over the settings file.
    pub fn with_overrides(mut self, token: Option<String>, host: Option<String>) -> Self {
        if token.is_some() {
            self.token = token;
        }
        if host.is_some() {
            self.host = host;
        }
        self
    }

    pub fn client_options(&self) -> Result<MaxVaporOptions> {
        let token = match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => bail!("A MaxVapor API token is required (settings `token` or --token)"),
        };
        let discovery = if self.legacy_discovery.unwrap_or_default() {
            DiscoveryEndpoint::Legacy
        } else {
            DiscoveryEndpoint::Devices
        };
        Ok(MaxVaporOptions::builder()
            .token(token)
            .host(self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()))
            .discovery(discovery)
            .build()?)
    }

    pub fn storage_dir(&self) -> String {
        self.storage_dir.clone().unwrap_or_else(|| ".".to_string())
    }

    pub fn bridge_name(&self) -> String {
        self.bridge_name
            .clone()
            .unwrap_or_else(|| "MaxVapor Bridge".to_string())
    }

    pub fn setup_id(&self) -> String {
        self.setup_id.clone().unwrap_or_else(|| "MXVP".to_string())
    }

    pub fn web_config(&self) -> WebConfig {
        let defaults = WebConfig::default();
        WebConfig {
            port: self.web_port.unwrap_or(defaults.port),
            enabled: self.web_enabled.unwrap_or(defaults.enabled),
        }
    }
}
