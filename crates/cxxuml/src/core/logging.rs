//! Logging infrastructure for diagram generation
//!
//! Structured logging uses the `tracing` crate, with configurable levels
//! and output formats.
//!
//! # Usage
//!
//! ```rust,no_run
//! use cxxuml::core::logging::init_logging;
//!
//! // Initialize with default settings
//! init_logging(None, None).ok();
//!
//! // Or with custom level and format
//! init_logging(Some("debug"), Some("pretty")).ok();
//! ```
//!
//! # Log Levels
//!
//! - `trace`: model dumps and per-event visitor output
//! - `debug`: tolerated modeling errors, chain resolution details
//! - `info`: pipeline stages (default)
//! - `warn`: diagrams skipped because of configuration errors
//! - `error`: fatal errors that abort the run
//!
//! # Log Formats
//!
//! - `compact`: single line, good for terminals
//! - `pretty`: multi-line with span events, good for debugging
//! - `json`: for log aggregation systems
//!
//! # Environment Variables
//!
//! - `CXXUML_LOG_LEVEL`: set log level (trace|debug|info|warn|error)
//! - `RUST_LOG`: standard tracing-subscriber filter directives
//! - `CXXUML_LOG_FORMAT`: set log format (compact|pretty|json)
//!
//! # Filtering Logs
//!
//! ```bash
//! # Show only visitor logs at trace level
//! RUST_LOG="cxxuml::plugins::sequence::visitor=trace" cxxuml generate -c cxxuml.toml
//!
//! # Show everything at info, chain extraction at debug
//! RUST_LOG="info,cxxuml::plugins::sequence::chains=debug" cxxuml generate -c cxxuml.toml
//! ```

use std::str::FromStr;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact single-line format
    Compact,
    /// Pretty multi-line format with colors
    Pretty,
    /// JSON format for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

impl LogFormat {
    /// Get all valid format names
    pub fn variants() -> &'static [&'static str] {
        &["compact", "pretty", "json"]
    }
}

/// Initialize the tracing subscriber with the given log level and format
///
/// # Arguments
///
/// * `level` - Optional log level string (trace|debug|info|warn|error|off).
///   If None, uses `CXXUML_LOG_LEVEL` or `RUST_LOG`, or defaults to `info`.
/// * `format` - Optional log format (compact|pretty|json).
///   If None, uses `CXXUML_LOG_FORMAT`, or defaults to `compact`.
///
/// # Returns
///
/// Returns an error if the format is unknown or a global subscriber is
/// already installed.
pub fn init_logging(
    level: Option<&str>,
    format: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = level
        .map(|s| s.to_string())
        .or_else(|| std::env::var("CXXUML_LOG_LEVEL").ok())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    let log_format = format
        .map(|s| s.to_string())
        .or_else(|| std::env::var("CXXUML_LOG_FORMAT").ok())
        .unwrap_or_else(|| "compact".to_string());

    let format =
        LogFormat::from_str(&log_format).map_err(|e| format!("Invalid log format: {}", e))?;

    let filter = if log_level == "off" {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&log_level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Diagram output goes to stdout, so logs always go to stderr
    match format {
        LogFormat::Compact => {
            Registry::default()
                .with(filter)
                .with(
                    fmt::Layer::default()
                        .with_writer(std::io::stderr)
                        .with_target(false)
                        .with_level(true)
                        .with_file(false)
                        .with_line_number(false)
                        .with_span_events(FmtSpan::NONE),
                )
                .try_init()?;
        }
        LogFormat::Pretty => {
            Registry::default()
                .with(filter)
                .with(
                    fmt::Layer::default()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_span_events(FmtSpan::ACTIVE)
                        .pretty(),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            Registry::default()
                .with(filter)
                .with(
                    fmt::Layer::default()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_span_events(FmtSpan::ACTIVE)
                        .json(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// Initialize logging with default settings (info level, compact format)
pub fn init_default_logging() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(None, None)
}
