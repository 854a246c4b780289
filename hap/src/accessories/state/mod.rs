pub(crate) mod thermostat;
