// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log subscriber setup for hosts embedding the probe.

use std::io;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human readable records.
    Compact,
    /// Multi-line human readable records.
    Full,
    /// One JSON object per record, for log shippers.
    Json,
}

/// Configuration for telemetry initialization.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,

    /// Emit a record when a request span closes (includes its busy time).
    pub include_span_events: bool,

    /// Whether to include file/line information.
    pub include_file_line: bool,

    /// Whether to include target module path.
    pub include_target: bool,

    /// Whether to use ANSI colors in output.
    pub ansi_colors: bool,

    /// Record format.
    pub format: LogFormat,

    /// Custom filter directive (overrides default_level and RUST_LOG).
    pub filter_directive: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_span_events: false,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            format: LogFormat::Compact,
            filter_directive: None,
        }
    }
}

impl TelemetryConfig {
    /// Verbose output, including span close events.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_span_events: true,
            include_file_line: true,
            format: LogFormat::Full,
            ..Self::default()
        }
    }

    /// JSON records at warn level, for running inside a production host.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_target: false,
            ansi_colors: false,
            format: LogFormat::Json,
            ..Self::default()
        }
    }

    /// Set the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set a custom filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    /// Set the record format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Guard returned by [`init_telemetry`].
///
/// Keep this guard alive for the duration of your program.
pub struct TelemetryGuard {
    _private: (),
}

/// Install the global tracing subscriber.
///
/// Call once at startup; a second call fails because a global subscriber is
/// already set.
///
/// # Example
///
/// ```rust,ignore
/// use routeprobe::telemetry::{init_telemetry, TelemetryConfig};
///
/// let _guard = init_telemetry(&TelemetryConfig::default())?;
/// ```
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let filter = config.env_filter();

    let span_events = if config.include_span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Compact => registry.with(fmt_layer.compact()).try_init(),
        LogFormat::Full => registry.with(fmt_layer).try_init(),
        LogFormat::Json => registry.with(fmt_layer.json()).try_init(),
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(TelemetryGuard { _private: () })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert!(config.ansi_colors);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_telemetry_config_development() {
        let config = TelemetryConfig::development();
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(config.include_span_events);
        assert_eq!(config.format, LogFormat::Full);
    }

    #[test]
    fn test_telemetry_config_production() {
        let config = TelemetryConfig::production();
        assert_eq!(config.default_level, Level::WARN);
        assert!(!config.ansi_colors);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::default()
            .with_level(Level::DEBUG)
            .with_filter("routeprobe::probe=debug")
            .with_format(LogFormat::Json)
            .with_ansi(false);

        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(
            config.filter_directive,
            Some("routeprobe::probe=debug".to_string())
        );
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.ansi_colors);
    }
}
