// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for routeprobe.
//!
//! Strongly-typed errors for attachment, dispatch and configuration, using
//! `thiserror` for the definitions and `anyhow` for propagation in the binary.

use thiserror::Error;

/// Errors surfaced while attaching a probe or driving its timers and switches.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Method not found on target: {0}")]
    MethodNotFound(String),

    #[error("Timer already stopped")]
    TimerAlreadyStopped,

    #[error("Unknown report stream: {0}")]
    UnknownStream(String),
}

impl ProbeError {
    /// Check if this error indicates a framework/probe version mismatch.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::MethodNotFound(_))
    }
}

/// Errors raised by an [`Application`](crate::framework::Application) when invoked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown dispatch method: {0}")]
    UnknownMethod(String),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;
