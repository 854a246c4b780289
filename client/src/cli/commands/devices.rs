use maxvapor_client_rs::{MaxVaporClient, MaxVaporClientError, MaxVaporClientTrait};

pub async fn list_devices(client: &MaxVaporClient) -> Result<(), MaxVaporClientError> {
    let devices = client.devices().await?;
    if devices.is_empty() {
        println!("No devices found on {}", client.host());
    }
    for device in devices {
        println!("Device '{}' ({})", device.display_name(), device.serial);
    }
    Ok(())
}
