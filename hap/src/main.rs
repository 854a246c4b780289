mod accessories;
mod bridge;
mod cache;
mod host;
mod logging;
mod platform;
mod settings;
mod web;

pub use bridge::start_bridge;

use anyhow::Result;
use clap::Parser;
use clap_derive::Parser;
use logging::{LogConfig, LogOutput, RotationPeriod, setup_logging};
use settings::Settings;
use tracing::{info, warn};

#[derive(Parser, Debug)]
pub struct Params {
    /// Settings file (JSON). Defaults are used when missing or unreadable
    #[clap(long)]
    settings: Option<String>,
    /// MaxVapor API token, overrides the one in the settings file
    #[clap(long, env = "MAXVAPOR_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// MaxVapor API host (default: https://dashboard.maxvapor.com)
    #[clap(long)]
    host: Option<String>,
    /// Directory for rotating log files (if not set, logs to stdout)
    #[clap(long)]
    log_dir: Option<String>,
    /// How often log files rotate: minutely, hourly, daily, never
    #[clap(long, default_value = "daily")]
    log_rotation: RotationPeriod,
    /// Number of rotated log files to keep (0 keeps all)
    #[clap(long, default_value_t = 7)]
    max_log_files: usize,
    /// Also log to stdout when --log-dir is set
    #[clap(long)]
    log_console: bool,
}

impl Params {
    fn log_output(&self) -> LogOutput {
        let file = self.log_dir.as_ref().map(|dir| LogConfig {
            log_dir: dir.clone(),
            rotation: self.log_rotation,
            max_log_files: self.max_log_files,
            ..LogConfig::default()
        });
        LogOutput::new(file, self.log_console)
    }
}

fn load_settings(path: Option<&str>) -> Settings {
    let Some(path) = path else {
        return Settings::default();
    };
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Invalid settings file {path}: {e}, using default settings");
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read settings file {path}: {e}, using default settings");
            Settings::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let params = Params::parse();
    let _log_guard = setup_logging(params.log_output())?;
    info!("Starting MaxVapor bridge v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings(params.settings.as_deref())
        .with_overrides(params.token.clone(), params.host.clone());

    start_bridge(settings).await
}
