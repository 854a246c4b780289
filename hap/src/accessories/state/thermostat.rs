use maxvapor_client_rs::{PidState, TemperatureUnits};

/// Values of the HomeKit `TargetHeatingCoolingState` characteristic.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[repr(u8)]
pub enum TargetHeatingCoolingState {
    #[default]
    Off = 0,
    Heat = 1,
    Cool = 2,
    Auto = 3,
}

impl TryFrom<u8> for TargetHeatingCoolingState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TargetHeatingCoolingState::Off),
            1 => Ok(TargetHeatingCoolingState::Heat),
            2 => Ok(TargetHeatingCoolingState::Cool),
            3 => Ok(TargetHeatingCoolingState::Auto),
            other => Err(other),
        }
    }
}

impl From<TargetHeatingCoolingState> for u8 {
    fn from(value: TargetHeatingCoolingState) -> Self {
        value as u8
    }
}

/// The e-nail can only heat, so the PID flag maps onto HEAT or OFF.
impl From<PidState> for TargetHeatingCoolingState {
    fn from(value: PidState) -> Self {
        match value {
            PidState::Heating => TargetHeatingCoolingState::Heat,
            PidState::Off => TargetHeatingCoolingState::Off,
        }
    }
}

/// Values of the HomeKit `TemperatureDisplayUnits` characteristic.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
#[repr(u8)]
pub enum TemperatureDisplayUnits {
    #[default]
    Celsius = 0,
    Fahrenheit = 1,
}

impl From<TemperatureUnits> for TemperatureDisplayUnits {
    fn from(value: TemperatureUnits) -> Self {
        match value {
            TemperatureUnits::Fahrenheit => TemperatureDisplayUnits::Fahrenheit,
            TemperatureUnits::Celsius => TemperatureDisplayUnits::Celsius,
        }
    }
}

impl From<TemperatureDisplayUnits> for u8 {
    fn from(value: TemperatureDisplayUnits) -> Self {
        value as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_state_from_u8() {
        assert_eq!(
            TargetHeatingCoolingState::try_from(1),
            Ok(TargetHeatingCoolingState::Heat)
        );
        assert_eq!(
            TargetHeatingCoolingState::try_from(3),
            Ok(TargetHeatingCoolingState::Auto)
        );
        assert_eq!(TargetHeatingCoolingState::try_from(7), Err(7));
    }

    #[test]
    fn test_pid_state_mapping() {
        assert_eq!(
            TargetHeatingCoolingState::from(PidState::Heating),
            TargetHeatingCoolingState::Heat
        );
        assert_eq!(
            TargetHeatingCoolingState::from(PidState::Off),
            TargetHeatingCoolingState::Off
        );
    }

    #[test]
    fn test_units_mapping() {
        assert_eq!(
            u8::from(TemperatureDisplayUnits::from(TemperatureUnits::Fahrenheit)),
            1
        );
        assert_eq!(
            u8::from(TemperatureDisplayUnits::from(TemperatureUnits::Celsius)),
            0
        );
    }
}
