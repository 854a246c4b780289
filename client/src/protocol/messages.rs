use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A device as returned by the discovery endpoint.
///
/// Only `serial` and `name` are used. Every other field the cloud sends
/// (current temperature, setpoint, firmware...) is kept in `extra` so the
/// record survives a round trip through the accessory cache untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl DeviceRecord {
    pub fn new(serial: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Name to show in HomeKit, falls back to the serial for unnamed devices.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            self.serial.as_str()
        } else {
            self.name.as_str()
        }
    }
}

/// Per-device sub-resources of `/api/device/<serial>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceResource {
    Firmware,
    Temperature,
    Setpoint,
    PidState,
    TemperatureUnits,
}

impl DeviceResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceResource::Firmware => "firmware",
            DeviceResource::Temperature => "temperature",
            DeviceResource::Setpoint => "setpoint",
            DeviceResource::PidState => "pid_state",
            DeviceResource::TemperatureUnits => "temperature_units",
        }
    }
}

/// Heating controller flag of the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "Value")]
#[repr(u8)]
pub enum PidState {
    #[default]
    Off = 0,
    Heating = 1,
}

// The cloud answers with `1`, `true` or `"1"` depending on the firmware.
impl From<Value> for PidState {
    fn from(value: Value) -> Self {
        if is_truthy_one(&value) {
            PidState::Heating
        } else {
            PidState::Off
        }
    }
}

impl From<PidState> for u8 {
    fn from(value: PidState) -> Self {
        value as u8
    }
}

/// Display units flag, `true` on the wire means Fahrenheit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "Value")]
#[repr(u8)]
pub enum TemperatureUnits {
    #[default]
    Celsius = 0,
    Fahrenheit = 1,
}

impl From<Value> for TemperatureUnits {
    fn from(value: Value) -> Self {
        if is_truthy_one(&value) {
            TemperatureUnits::Fahrenheit
        } else {
            TemperatureUnits::Celsius
        }
    }
}

impl From<TemperatureUnits> for u8 {
    fn from(value: TemperatureUnits) -> Self {
        value as u8
    }
}

pub(crate) fn is_truthy_one(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

/// Body of every PUT request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPayload<T> {
    pub data: T,
}

/// Error body returned by the API on failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_record_keeps_unknown_fields() {
        let record: DeviceRecord = serde_json::from_value(json!({
            "serial": "ABC123",
            "name": "Nail1",
            "setpoint": 710,
            "firmware": "1.4.2"
        }))
        .unwrap();
        assert_eq!(record.serial, "ABC123");
        assert_eq!(record.name, "Nail1");
        assert_eq!(record.extra.get("setpoint"), Some(&json!(710)));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["firmware"], json!("1.4.2"));
    }

    #[test]
    fn test_device_record_without_name() {
        let record: DeviceRecord = serde_json::from_value(json!({"serial": "XYZ"})).unwrap();
        assert_eq!(record.display_name(), "XYZ");
    }

    #[test]
    fn test_pid_state_only_one_means_heating() {
        assert_eq!(PidState::from(json!(1)), PidState::Heating);
        assert_eq!(PidState::from(json!(true)), PidState::Heating);
        assert_eq!(PidState::from(json!("1")), PidState::Heating);
        for other in [json!(0), json!(2), json!(-1), json!(false), json!(null), json!("on")] {
            assert_eq!(PidState::from(other), PidState::Off);
        }
    }

    #[test]
    fn test_temperature_units_mapping() {
        assert_eq!(TemperatureUnits::from(json!(true)), TemperatureUnits::Fahrenheit);
        assert_eq!(TemperatureUnits::from(json!(false)), TemperatureUnits::Celsius);
        assert_eq!(TemperatureUnits::from(json!(null)), TemperatureUnits::Celsius);
        assert_eq!(TemperatureUnits::from(json!("true")), TemperatureUnits::Celsius);
    }

    #[test]
    fn test_data_payload_shape() {
        let body = serde_json::to_value(DataPayload { data: 1u8 }).unwrap();
        assert_eq!(body, json!({"data": 1}));
    }
}
