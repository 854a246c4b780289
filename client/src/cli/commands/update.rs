use maxvapor_client_rs::{MaxVaporClient, MaxVaporClientError, MaxVaporClientTrait};

fn report(what: &str, serial: &str, acknowledged: bool) {
    if acknowledged {
        println!("{what} updated on device {serial}");
    } else {
        println!("Device {serial} did not acknowledge the {what} change");
    }
}

pub async fn set_temperature(
    client: &MaxVaporClient,
    serial: &str,
    value: f64,
) -> Result<(), MaxVaporClientError> {
    let ack = client.set_setpoint(serial, value).await?;
    report("Target temperature", serial, ack);
    Ok(())
}

pub async fn set_pid(
    client: &MaxVaporClient,
    serial: &str,
    value: u8,
) -> Result<(), MaxVaporClientError> {
    let ack = client.set_pid_state(serial, value).await?;
    report("PID state", serial, ack);
    Ok(())
}

pub async fn set_units(
    client: &MaxVaporClient,
    serial: &str,
    value: u8,
) -> Result<(), MaxVaporClientError> {
    let ack = client.set_temperature_units(serial, value).await?;
    report("Temperature units", serial, ack);
    Ok(())
}
