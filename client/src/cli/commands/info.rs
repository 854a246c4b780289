use maxvapor_client_rs::{MaxVaporClient, MaxVaporClientError, MaxVaporClientTrait};

pub async fn device_info(client: &MaxVaporClient, serial: &str) -> Result<(), MaxVaporClientError> {
    let firmware = client.firmware(serial).await?;
    let temperature = client.temperature(serial).await?;
    let setpoint = client.setpoint(serial).await?;
    let pid = client.pid_state(serial).await?;
    let units = client.temperature_units(serial).await?;

    println!("Device {serial}");
    println!("  firmware:    {firmware}");
    println!("  temperature: {temperature}");
    println!("  setpoint:    {setpoint}");
    println!("  pid state:   {pid:?}");
    println!("  units:       {units:?}");
    Ok(())
}
