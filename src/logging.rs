//! Subscriber setup for applications embedding the mapper.
//!
//! The library only emits `tracing` events and spans. A binary that wants them
//! written somewhere calls [`init_logging`] once and holds the returned guard
//! until shutdown.

use anyhow::{Context, Result};
use std::env;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use strum::{AsRefStr, EnumString};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation as FileRotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt,
};

const ENV_FORMAT: &str = "RDFBIND_LOG_FORMAT";
const ENV_OUTPUT: &str = "RDFBIND_LOG_OUTPUT";
const ENV_DIR: &str = "RDFBIND_LOG_DIR";
const ENV_ROTATION: &str = "RDFBIND_LOG_ROTATION";
const ENV_LEVEL: &str = "RDFBIND_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File,
}

/// How often file output starts a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Rotation {
    Hourly,
    Daily,
    Never,
}

impl From<Rotation> for FileRotation {
    fn from(rotation: Rotation) -> Self {
        match rotation {
            Rotation::Hourly => FileRotation::HOURLY,
            Rotation::Daily => FileRotation::DAILY,
            Rotation::Never => FileRotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for [`LogOutput::File`].
    pub log_dir: PathBuf,
    pub file_prefix: String,
    pub rotation: Rotation,
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            file_prefix: env!("CARGO_PKG_NAME").to_string(),
            rotation: Rotation::Daily,
            level: format!("{}=info,warn", env!("CARGO_CRATE_NAME")),
        }
    }
}

impl LoggingConfig {
    /// JSON lines into `dir`, one file per `rotation` period.
    pub fn to_dir(dir: impl Into<PathBuf>, rotation: Rotation) -> Self {
        Self {
            format: LogFormat::Json,
            output: LogOutput::File,
            log_dir: dir.into(),
            rotation,
            ..Self::default()
        }
    }

    /// Defaults overridden by the `RDFBIND_LOG_*` environment variables.
    ///
    /// # Errors
    /// Fails on a format, output or rotation value it does not know.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(format) = env_choice(ENV_FORMAT)? {
            config.format = format;
        }
        if let Some(output) = env_choice(ENV_OUTPUT)? {
            config.output = output;
        }
        if let Some(rotation) = env_choice(ENV_ROTATION)? {
            config.rotation = rotation;
        }
        if let Ok(dir) = env::var(ENV_DIR) {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(level) = env::var(ENV_LEVEL) {
            config.level = level;
        }
        Ok(config)
    }
}

fn env_choice<T: FromStr>(name: &str) -> Result<Option<T>> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    T::from_str(raw.trim())
        .map(Some)
        .map_err(|_| anyhow::anyhow!("{name}={raw:?} is not a recognized value"))
}

/// Installs the global subscriber described by `config`.
///
/// The returned guard flushes buffered output when dropped.
///
/// # Errors
/// Fails if the log directory cannot be created, the filter does not parse,
/// or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log filter {:?}", config.level))?,
    };

    let (writer, guard) = match config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
        LogOutput::File => {
            std::fs::create_dir_all(&config.log_dir).with_context(|| {
                format!("failed to create log directory {:?}", config.log_dir)
            })?;
            let appender = RollingFileAppender::builder()
                .rotation(config.rotation.into())
                .filename_prefix(config.file_prefix.as_str())
                .build(&config.log_dir)
                .context("failed to open the log file")?;
            tracing_appender::non_blocking(appender)
        }
    };

    let base = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(config.output != LogOutput::File);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => base.json().with_current_span(true).boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        format = config.format.as_ref(),
        output = config.output.as_ref(),
        "logging initialized"
    );
    Ok(guard)
}

/// Span wrapping one mapper operation, e.g. `find` or `persist`.
pub fn operation_span(name: &'static str, entity_type: &str) -> tracing::Span {
    tracing::debug_span!(
        "mapper_operation",
        operation.name = name,
        entity_type = entity_type,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_log_pretty_to_stderr() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.output, LogOutput::Stderr);
        assert_eq!(config.file_prefix, "rdfbind");
        assert!(config.level.starts_with("rdfbind="));
    }

    #[test]
    #[serial]
    fn environment_selects_format_and_output() {
        // SAFETY: serialized with every other test that touches the environment.
        unsafe {
            env::set_var(ENV_FORMAT, "JSON");
            env::set_var(ENV_OUTPUT, "file");
            env::set_var(ENV_ROTATION, "never");
        }
        let config = LoggingConfig::from_env();
        unsafe {
            env::remove_var(ENV_FORMAT);
            env::remove_var(ENV_OUTPUT);
            env::remove_var(ENV_ROTATION);
        }
        let config = config.expect("from_env");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::File);
        assert_eq!(config.rotation, Rotation::Never);
    }

    #[test]
    #[serial]
    fn unknown_environment_values_are_rejected() {
        unsafe { env::set_var(ENV_OUTPUT, "syslog") };
        let config = LoggingConfig::from_env();
        unsafe { env::remove_var(ENV_OUTPUT) };
        assert!(config.is_err());
    }

    #[test]
    #[serial]
    fn file_subscriber_installs_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let logs = dir.path().join("logs");
        let config = LoggingConfig::to_dir(&logs, Rotation::Never);

        let guard = init_logging(&config).expect("first install");
        let _span = operation_span("persist", "logging::Test").entered();
        tracing::warn!("written to the log file");
        assert!(init_logging(&config).is_err());
        drop(guard);

        let file = logs.join(&config.file_prefix);
        let written = std::fs::read_to_string(&file).expect("log file");
        assert!(written.contains("written to the log file"));
    }
}
