//! Tracing setup and the per-device logging handles.
//!
//! The library only emits `tracing` events and spans. Installing a subscriber is
//! left to the application; [`init`] is the one the `daq-adapters` binary uses.
//!
//! Every device is created with a pair of spans ([`DeviceLoggers`]): one scoped
//! to the device and one for the controller core. Events raised on behalf of a
//! device are recorded inside its span, so the label shows up on every line.
//!
//! ```no_run
//! use daq_adapters::logging::{self, OutputFormat, TracingConfig};
//! use tracing::Level;
//!
//! logging::init(TracingConfig::new(Level::DEBUG).with_format(OutputFormat::Compact))?;
//! # Ok::<(), String>(())
//! ```

use crate::config::AdapterConfig;
use tracing::{Level, Span};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for the CLI subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-line, coloured (for interactive use)
    Pretty,
    /// Single-line
    Compact,
    /// JSON lines
    Json,
}

/// Subscriber options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to enable ANSI colors (Pretty only)
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Compact,
            with_file_and_line: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    /// Config with a given default level
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Take the level from the host configuration
    pub fn from_config(config: &AdapterConfig) -> Result<Self, String> {
        Ok(Self::new(parse_log_level(&config.log_level)?))
    }

    /// Set output format
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG` (falling back to
/// `config.level`).
///
/// Idempotent: a subscriber that is already installed is left in place.
pub fn init(config: TracingConfig) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .pretty()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(config.with_ansi)
            .with_filter(env_filter)
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .compact()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_ansi(false)
            .with_filter(env_filter)
            .boxed(),
        OutputFormat::Json => fmt::layer()
            .json()
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .or_else(|e| {
            if e
                .to_string()
                .contains("a global default trace dispatcher has already been set")
            {
                Ok(())
            } else {
                Err(format!("Failed to initialize tracing: {}", e))
            }
        })
}

fn parse_log_level(level: &str) -> Result<Level, String> {
    level.parse::<Level>().map_err(|_| {
        format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        )
    })
}

/// Logging handles handed to a device at construction.
#[derive(Debug, Clone)]
pub struct DeviceLoggers {
    /// Span for events about this device
    pub device: Span,
    /// Span for lifecycle events the host records about this device: creation
    /// and release of the raw handle
    pub core: Span,
}

impl DeviceLoggers {
    /// Explicit spans supplied by the controller.
    pub fn new(device: Span, core: Span) -> Self {
        Self { device, core }
    }

    /// Default spans tagged with `label`.
    pub fn for_label(label: &str) -> Self {
        Self {
            device: tracing::info_span!("device", label = %label),
            core: tracing::info_span!("core", device = %label),
        }
    }

    /// Spans that record nothing.
    pub fn disabled() -> Self {
        Self {
            device: Span::none(),
            core: Span::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace"), Ok(Level::TRACE));
        assert_eq!(parse_log_level("WARN"), Ok(Level::WARN));
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_tracing_config_from_adapter_config() {
        let config = AdapterConfig {
            log_level: "debug".to_string(),
            ..AdapterConfig::default()
        };
        let tracing_config = TracingConfig::from_config(&config).unwrap();
        assert_eq!(tracing_config.level, Level::DEBUG);
        assert_eq!(tracing_config.format, OutputFormat::Compact);
    }

    #[test]
    fn test_tracing_config_builder() {
        let config = TracingConfig::new(Level::WARN)
            .with_format(OutputFormat::Json)
            .with_ansi(false);
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.with_ansi);
    }

    #[test]
    fn test_disabled_loggers() {
        let loggers = DeviceLoggers::disabled();
        assert!(loggers.device.is_none());
        assert!(loggers.core.is_none());
    }
}
