mod commands;
mod utils;

use clap::{Parser, Subcommand};
use maxvapor_client_rs::MaxVaporClientError;
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// List the devices registered on the account
    Devices,
    /// Read every value the cloud exposes for a device
    Info {
        #[arg(long)]
        serial: String,
    },
    /// Change the target temperature of a device
    SetTemperature {
        #[arg(long)]
        serial: String,
        #[arg(long)]
        value: f64,
    },
    /// Turn the heating controller on (1) or off (0)
    SetPid {
        #[arg(long)]
        serial: String,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
        value: u8,
    },
    /// Switch display units, 0 for Celsius and 1 for Fahrenheit
    SetUnits {
        #[arg(long)]
        serial: String,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
        value: u8,
    },
}

#[derive(Parser, Debug)]
struct Params {
    /// API token of the MaxVapor account
    #[clap(long, env = "MAXVAPOR_TOKEN")]
    token: String,
    /// Base URL of the MaxVapor API
    #[clap(long)]
    host: Option<String>,
    /// Use the singular /api/device/ listing for discovery
    #[clap(long, default_value_t = false)]
    legacy: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), MaxVaporClientError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let params = Params::parse();
    let client = utils::create_client(&params)?;

    match params.command {
        Commands::Devices => commands::list_devices(&client).await?,
        Commands::Info { serial } => commands::device_info(&client, &serial).await?,
        Commands::SetTemperature { serial, value } => {
            commands::set_temperature(&client, &serial, value).await?
        }
        Commands::SetPid { serial, value } => commands::set_pid(&client, &serial, value).await?,
        Commands::SetUnits { serial, value } => {
            commands::set_units(&client, &serial, value).await?
        }
    }

    Ok(())
}
