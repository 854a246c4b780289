mod devices;
mod info;
mod update;

pub use devices::list_devices;
pub use info::device_info;
pub use update::{set_pid, set_temperature, set_units};
