mod enail;
mod state;
mod thermostat;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use enail::EnailHandler;
pub(crate) use thermostat::EnailThermostatAccessory;
