use anyhow::{Context, Result};
use futures::FutureExt;
use hap::characteristic::HapCharacteristic;
use hap::pointer::Accessory;
use hap::server::Server;
use hap::{
    HapType,
    accessory::{AccessoryInformation, HapAccessory},
    characteristic::AsyncCharacteristicCallbacks,
    server::IpServer,
    service::{
        HapService, accessory_information::AccessoryInformationService,
        thermostat::ThermostatService,
    },
};
use serde::{
    Serialize,
    ser::{SerializeStruct, Serializer},
};
use serde_json::Value;
use tracing::{debug, info};

use crate::accessories::enail::{
    EnailHandler, MAX_TEMPERATURE, MIN_TARGET_TEMPERATURE, UNKNOWN_FIRMWARE,
};
use crate::web::metrics::Metrics;

pub(crate) const MANUFACTURER: &str = "DB Electronics";
pub(crate) const MODEL: &str = "MaxVapor BT";

#[derive(Debug)]
struct EnailThermostat {
    id: u64,
    pub accessory_information: AccessoryInformationService,
    pub thermostat: ThermostatService,
}

impl HapAccessory for EnailThermostat {
    fn get_id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn get_service(&self, hap_type: HapType) -> Option<&dyn HapService> {
        self.get_services()
            .into_iter()
            .find(|&service| service.get_type() == hap_type)
    }

    fn get_mut_service(&mut self, hap_type: HapType) -> Option<&mut dyn HapService> {
        self.get_mut_services()
            .into_iter()
            .find(|service| service.get_type() == hap_type)
    }

    fn get_services(&self) -> Vec<&dyn HapService> {
        vec![&self.accessory_information, &self.thermostat]
    }

    fn get_mut_services(&mut self) -> Vec<&mut dyn HapService> {
        vec![&mut self.accessory_information, &mut self.thermostat]
    }
}

impl Serialize for EnailThermostat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("HapAccessory", 2)?;
        state.serialize_field("aid", &self.get_id())?;
        state.serialize_field("services", &self.get_services())?;
        state.end()
    }
}

impl EnailThermostat {
    async fn new(aid: u64, name: &str, serial: &str) -> Result<Self> {
        let accessory_information = AccessoryInformation {
            manufacturer: MANUFACTURER.to_string(),
            model: MODEL.to_string(),
            serial_number: serial.to_string(),
            firmware_revision: Some(UNKNOWN_FIRMWARE.to_string()),
            name: name.to_string(),
            ..Default::default()
        }
        .to_service(1, aid)?;

        let info_len = accessory_information.get_characteristics().len() as u64;
        let mut thermostat = ThermostatService::new(1 + info_len + 1, aid);
        thermostat.cooling_threshold_temperature = None;
        thermostat.heating_threshold_temperature = None;
        thermostat.current_relative_humidity = None;
        thermostat.target_relative_humidity = None;
        thermostat.set_primary(true);

        if let Some(service_name) = thermostat.name.as_mut() {
            service_name.set_value(Value::from(name)).await?;
        }

        thermostat
            .current_temperature
            .set_max_value(Some(Value::from(MAX_TEMPERATURE)))?;
        thermostat
            .current_temperature
            .set_min_value(Some(Value::from(0.0)))?;
        thermostat
            .current_temperature
            .set_step_value(Some(Value::from(1.0)))?;

        thermostat
            .target_temperature
            .set_max_value(Some(Value::from(MAX_TEMPERATURE)))?;
        thermostat
            .target_temperature
            .set_min_value(Some(Value::from(MIN_TARGET_TEMPERATURE)))?;
        thermostat
            .target_temperature
            .set_step_value(Some(Value::from(1.0)))?;
        thermostat
            .target_temperature
            .set_value(Value::from(MIN_TARGET_TEMPERATURE))
            .await
            .context("Cannot set initial target temperature")?;

        Ok(Self {
            id: aid,
            accessory_information,
            thermostat,
        })
    }
}

/// A MaxVapor e-nail exposed to HomeKit as a thermostat.
pub(crate) struct EnailThermostatAccessory {
    serial: String,
    #[allow(dead_code)]
    accessory: Accessory,
}

impl EnailThermostatAccessory {
    pub async fn new(
        aid: u64,
        name: &str,
        handler: EnailHandler,
        server: &IpServer,
    ) -> Result<Self> {
        let serial = handler.serial().to_string();
        let mut accessory = EnailThermostat::new(aid, name, &serial).await?;

        Self::setup_information(&mut accessory, handler.clone());
        Self::setup_temperatures(&mut accessory, handler.clone());
        Self::setup_heating_state(&mut accessory, handler.clone());
        Self::setup_display_units(&mut accessory, handler);

        info!("Adding e-nail {serial} ({name}) with aid {aid}");
        let accessory = server.add_accessory(accessory).await?;
        Ok(Self { serial, accessory })
    }

    pub fn serial(&self) -> &str {
        self.serial.as_str()
    }

    fn setup_information(accessory: &mut EnailThermostat, handler: EnailHandler) {
        let serial = handler.serial().to_string();
        accessory
            .accessory_information
            .identify
            .on_update_async(Some(move |_, _| {
                let serial = serial.clone();
                async move {
                    info!("Identify requested for e-nail {serial}");
                    Ok(())
                }
                .boxed()
            }));

        if let Some(firmware) = accessory.accessory_information.firmware_revision.as_mut() {
            firmware.on_read_async(Some(move || {
                let handler = handler.clone();
                async move {
                    Metrics::inc_hap_requests();
                    Ok(Some(handler.firmware_revision().await))
                }
                .boxed()
            }));
        }
    }

    fn setup_temperatures(accessory: &mut EnailThermostat, handler: EnailHandler) {
        let handler_ = handler.clone();
        accessory
            .thermostat
            .current_temperature
            .on_read_async(Some(move || {
                let handler = handler_.clone();
                async move {
                    Metrics::inc_hap_requests();
                    Ok(Some(handler.current_temperature().await))
                }
                .boxed()
            }));

        let handler_ = handler.clone();
        accessory
            .thermostat
            .target_temperature
            .on_read_async(Some(move || {
                let handler = handler_.clone();
                async move {
                    Metrics::inc_hap_requests();
                    Ok(Some(handler.target_temperature().await))
                }
                .boxed()
            }));

        accessory
            .thermostat
            .target_temperature
            .on_update_async(Some(move |prev: f32, new: f32| {
                let handler = handler.clone();
                async move {
                    Metrics::inc_hap_requests();
                    debug!(
                        "Target temperature of {} updated from {prev} to {new}",
                        handler.serial()
                    );
                    handler.set_target_temperature(new).await;
                    Ok(())
                }
                .boxed()
            }));
    }

    fn setup_heating_state(accessory: &mut EnailThermostat, handler: EnailHandler) {
        let handler_ = handler.clone();
        accessory
            .thermostat
            .current_heating_cooling_state
            .on_read_async(Some(move || {
                let handler = handler_.clone();
                async move {
                    Metrics::inc_hap_requests();
                    Ok(Some(u8::from(handler.heating_cooling_state().await)))
                }
                .boxed()
            }));

        let handler_ = handler.clone();
        accessory
            .thermostat
            .target_heating_cooling_state
            .on_read_async(Some(move || {
                let handler = handler_.clone();
                async move {
                    Metrics::inc_hap_requests();
                    Ok(Some(u8::from(handler.heating_cooling_state().await)))
                }
                .boxed()
            }));

        accessory
            .thermostat
            .target_heating_cooling_state
            .on_update_async(Some(move |_prev: u8, new: u8| {
                let handler = handler.clone();
                async move {
                    Metrics::inc_hap_requests();
                    handler.set_target_heating_cooling_state(new).await?;
                    Ok(())
                }
                .boxed()
            }));
    }

    fn setup_display_units(accessory: &mut EnailThermostat, handler: EnailHandler) {
        let handler_ = handler.clone();
        accessory
            .thermostat
            .temperature_display_units
            .on_read_async(Some(move || {
                let handler = handler_.clone();
                async move {
                    Metrics::inc_hap_requests();
                    Ok(Some(u8::from(handler.temperature_display_units().await)))
                }
                .boxed()
            }));

        accessory
            .thermostat
            .temperature_display_units
            .on_update_async(Some(move |_prev: u8, new: u8| {
                let handler = handler.clone();
                async move {
                    Metrics::inc_hap_requests();
                    handler.set_temperature_display_units(new).await;
                    Ok(())
                }
                .boxed()
            }));
    }
}
