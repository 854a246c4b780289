//! Log output for the bridge: console, rotating files, or both.
//!
//! Rotation is handled by tracing-appender, so no external logrotate setup is needed.

use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl std::str::FromStr for RotationPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minutely" | "minute" => Ok(RotationPeriod::Minutely),
            "hourly" | "hour" => Ok(RotationPeriod::Hourly),
            "daily" | "day" => Ok(RotationPeriod::Daily),
            "never" | "none" => Ok(RotationPeriod::Never),
            _ => Err(format!(
                "Invalid rotation period '{s}'. Valid options: minutely, hourly, daily, never"
            )),
        }
    }
}

impl From<RotationPeriod> for Rotation {
    fn from(period: RotationPeriod) -> Self {
        match period {
            RotationPeriod::Minutely => Rotation::MINUTELY,
            RotationPeriod::Hourly => Rotation::HOURLY,
            RotationPeriod::Daily => Rotation::DAILY,
            RotationPeriod::Never => Rotation::NEVER,
        }
    }
}

/// Rolling log files.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: String,
    pub log_prefix: String,
    pub rotation: RotationPeriod,
    /// 0 keeps every file.
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: ".".to_string(),
            log_prefix: "maxvapor-bridge".to_string(),
            rotation: RotationPeriod::Daily,
            max_log_files: 7,
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone)]
pub enum LogOutput {
    Console,
    File(LogConfig),
    /// Files plus a colored copy on stdout.
    Dual(LogConfig),
}

impl LogOutput {
    pub fn new(file: Option<LogConfig>, console: bool) -> Self {
        match (file, console) {
            (None, _) => LogOutput::Console,
            (Some(config), false) => LogOutput::File(config),
            (Some(config), true) => LogOutput::Dual(config),
        }
    }
}

/// Keeps the non-blocking writer alive; dropping it flushes pending lines.
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Must be called once, before the bridge starts.
pub fn setup_logging(output: LogOutput) -> std::io::Result<LogGuard> {
    match output {
        LogOutput::Console => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).init();
            Ok(LogGuard { _guard: None })
        }
        LogOutput::File(config) => {
            let (writer, guard) = file_writer(&config)?;
            let file_layer = Layer::default()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            tracing_subscriber::registry()
                .with(env_filter())
                .with(file_layer)
                .init();
            Ok(LogGuard {
                _guard: Some(guard),
            })
        }
        LogOutput::Dual(config) => {
            let (writer, guard) = file_writer(&config)?;
            let file_layer = Layer::default()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            let console_layer = Layer::default()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter())
                .with(file_layer)
                .with(console_layer)
                .init();
            Ok(LogGuard {
                _guard: Some(guard),
            })
        }
    }
}

fn file_writer(config: &LogConfig) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    let log_dir = Path::new(&config.log_dir);
    std::fs::create_dir_all(log_dir)?;
    if config.max_log_files > 0 {
        cleanup_old_logs(log_dir, &config.log_prefix, config.max_log_files)?;
    }

    let mut builder = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.log_prefix)
        .filename_suffix("log");
    if config.max_log_files > 0 {
        builder = builder.max_log_files(config.max_log_files);
    }
    let appender = builder.build(log_dir).map_err(std::io::Error::other)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Removes the oldest `<prefix>*.log` files beyond `max_files`.
fn cleanup_old_logs(log_dir: &Path, prefix: &str, max_files: usize) -> std::io::Result<()> {
    if !log_dir.exists() {
        return Ok(());
    }

    let mut log_files: Vec<_> = std::fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".log"))
        })
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.path(), modified))
        })
        .collect();

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.into_iter().skip(max_files) {
        if let Err(e) = std::fs::remove_file(&path) {
            eprintln!("Warning: failed to remove old log file {path:?}: {e}");
        }
    }

    Ok(())
}
