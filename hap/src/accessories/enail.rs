use std::sync::Arc;

use maxvapor_client_rs::{MaxVaporClientError, MaxVaporClientTrait};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::accessories::state::thermostat::{TargetHeatingCoolingState, TemperatureDisplayUnits};
use crate::web::metrics::Metrics;

/// Lowest setpoint the device accepts, also the floor applied to reads.
pub(crate) const MIN_TARGET_TEMPERATURE: f32 = 100.0;
pub(crate) const MAX_TEMPERATURE: f32 = 648.0;
pub(crate) const UNKNOWN_FIRMWARE: &str = "Unknown";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnailError {
    #[error("This device does not support Cooling Mode")]
    CoolingNotSupported,
    #[error("This device does not support Auto Mode")]
    AutoNotSupported,
    #[error("Invalid heating cooling state {0}")]
    InvalidState(u8),
}

/// Translates characteristic reads and writes of one e-nail into calls
/// against the MaxVapor cloud.
///
/// Holds nothing but the device serial: every read goes to the cloud. Reads
/// never fail, they fall back to a safe default and log the upstream error.
/// Writes log failures and return `Ok`, only requests the device cannot
/// honour are rejected.
#[derive(Clone)]
pub struct EnailHandler {
    serial: String,
    client: Arc<dyn MaxVaporClientTrait>,
}

impl EnailHandler {
    pub fn new(serial: impl Into<String>, client: Arc<dyn MaxVaporClientTrait>) -> Self {
        Self {
            serial: serial.into(),
            client,
        }
    }

    pub fn serial(&self) -> &str {
        self.serial.as_str()
    }

    fn api_error(&self, operation: &'static str, err: &MaxVaporClientError) {
        error!(serial = %self.serial, operation, "Error from API: {err}");
        Metrics::inc_api_errors(operation);
    }

    pub async fn firmware_revision(&self) -> String {
        match self.client.firmware(&self.serial).await {
            Ok(version) => version,
            Err(e) => {
                self.api_error("get_firmware", &e);
                UNKNOWN_FIRMWARE.to_string()
            }
        }
    }

    pub async fn current_temperature(&self) -> f32 {
        match self.client.temperature(&self.serial).await {
            Ok(temperature) => temperature as f32,
            Err(e) => {
                self.api_error("get_temperature", &e);
                0.0
            }
        }
    }

    pub async fn target_temperature(&self) -> f32 {
        let setpoint = match self.client.setpoint(&self.serial).await {
            Ok(setpoint) => setpoint as f32,
            Err(e) => {
                self.api_error("get_setpoint", &e);
                0.0
            }
        };
        setpoint.max(MIN_TARGET_TEMPERATURE)
    }

    pub async fn set_target_temperature(&self, value: f32) {
        debug!("Setting target temperature of {} to {value}", self.serial);
        match self.client.set_setpoint(&self.serial, value as f64).await {
            Ok(true) => {}
            Ok(false) => error!("Could not set target temperature of {}", self.serial),
            Err(e) => self.api_error("set_setpoint", &e),
        }
    }

    /// Serves both the current and the target heating state.
    pub async fn heating_cooling_state(&self) -> TargetHeatingCoolingState {
        match self.client.pid_state(&self.serial).await {
            Ok(pid) => TargetHeatingCoolingState::from(pid),
            Err(e) => {
                self.api_error("get_pid_state", &e);
                TargetHeatingCoolingState::Off
            }
        }
    }

    pub async fn set_target_heating_cooling_state(&self, value: u8) -> Result<(), EnailError> {
        let state = TargetHeatingCoolingState::try_from(value).map_err(EnailError::InvalidState)?;
        let rejected = match state {
            TargetHeatingCoolingState::Cool => Some(EnailError::CoolingNotSupported),
            TargetHeatingCoolingState::Auto => Some(EnailError::AutoNotSupported),
            TargetHeatingCoolingState::Off | TargetHeatingCoolingState::Heat => None,
        };
        if let Some(reason) = rejected {
            info!("{reason} ({})", self.serial);
            return Err(reason);
        }

        match self.client.set_pid_state(&self.serial, state.into()).await {
            Ok(true) => {}
            Ok(false) => error!("Could not set PID state of {}", self.serial),
            Err(e) => self.api_error("set_pid_state", &e),
        }
        Ok(())
    }

    pub async fn temperature_display_units(&self) -> TemperatureDisplayUnits {
        match self.client.temperature_units(&self.serial).await {
            Ok(units) => TemperatureDisplayUnits::from(units),
            Err(e) => {
                self.api_error("get_temperature_units", &e);
                TemperatureDisplayUnits::Celsius
            }
        }
    }

    pub async fn set_temperature_display_units(&self, value: u8) {
        match self.client.set_temperature_units(&self.serial, value).await {
            Ok(true) => {}
            Ok(false) => error!("Could not change temperature units of {}", self.serial),
            Err(e) => self.api_error("set_temperature_units", &e),
        }
    }
}
