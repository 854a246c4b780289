use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use maxvapor_client_rs::{
    DeviceRecord, DeviceResource, MaxVaporClientError, MaxVaporClientTrait, PidState,
    TemperatureUnits,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct FakeMaxVaporClient {
    pub devices: Arc<RwLock<Vec<DeviceRecord>>>,
    pub values: Arc<RwLock<HashMap<DeviceResource, Value>>>,
    pub put_calls: Arc<RwLock<Vec<(String, DeviceResource, Value)>>>,
    pub calls: Arc<AtomicUsize>,
    pub should_fail: Arc<AtomicBool>,
    pub unauthorized: Arc<AtomicBool>,
    /// Writes reach the device but the cloud answers something other than `true`.
    pub unacknowledged: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FakeMaxVaporClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: Arc::new(AtomicBool::new(true)),
            ..Default::default()
        }
    }

    pub fn with_devices(devices: Vec<DeviceRecord>) -> Self {
        Self {
            devices: Arc::new(RwLock::new(devices)),
            ..Default::default()
        }
    }

    pub async fn set_value(&self, resource: DeviceResource, value: Value) {
        self.values.write().await.insert(resource, value);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), MaxVaporClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized.load(Ordering::SeqCst) {
            return Err(MaxVaporClientError::Unauthorized);
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(MaxVaporClientError::Api {
                status: 500,
                detail: "Fake error".to_string(),
            });
        }
        Ok(())
    }

    async fn read<T: DeserializeOwned>(
        &self,
        resource: DeviceResource,
    ) -> Result<T, MaxVaporClientError> {
        self.check()?;
        let value = self
            .values
            .read()
            .await
            .get(&resource)
            .cloned()
            .ok_or_else(|| MaxVaporClientError::Api {
                status: 404,
                detail: "Not found.".to_string(),
            })?;
        Ok(serde_json::from_value(value)?)
    }

    async fn write(
        &self,
        serial: &str,
        resource: DeviceResource,
        value: Value,
    ) -> Result<bool, MaxVaporClientError> {
        self.check()?;
        self.put_calls
            .write()
            .await
            .push((serial.to_string(), resource, value));
        Ok(!self.unacknowledged.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl MaxVaporClientTrait for FakeMaxVaporClient {
    async fn devices(&self) -> Result<Vec<DeviceRecord>, MaxVaporClientError> {
        self.check()?;
        Ok(self.devices.read().await.clone())
    }

    async fn firmware(&self, _serial: &str) -> Result<String, MaxVaporClientError> {
        self.read(DeviceResource::Firmware).await
    }

    async fn temperature(&self, _serial: &str) -> Result<f64, MaxVaporClientError> {
        self.read(DeviceResource::Temperature).await
    }

    async fn setpoint(&self, _serial: &str) -> Result<f64, MaxVaporClientError> {
        self.read(DeviceResource::Setpoint).await
    }

    async fn set_setpoint(&self, serial: &str, value: f64) -> Result<bool, MaxVaporClientError> {
        self.write(serial, DeviceResource::Setpoint, Value::from(value))
            .await
    }

    async fn pid_state(&self, _serial: &str) -> Result<PidState, MaxVaporClientError> {
        self.read(DeviceResource::PidState).await
    }

    async fn set_pid_state(&self, serial: &str, value: u8) -> Result<bool, MaxVaporClientError> {
        self.write(serial, DeviceResource::PidState, Value::from(value))
            .await
    }

    async fn temperature_units(
        &self,
        _serial: &str,
    ) -> Result<TemperatureUnits, MaxVaporClientError> {
        self.read(DeviceResource::TemperatureUnits).await
    }

    async fn set_temperature_units(
        &self,
        serial: &str,
        value: u8,
    ) -> Result<bool, MaxVaporClientError> {
        self.write(serial, DeviceResource::TemperatureUnits, Value::from(value))
            .await
    }
}
