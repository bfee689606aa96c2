// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Probe configuration files may be JSON or YAML; keys are camelCase and
//! every key is optional.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::report::REQUEST_TOPIC;

/// Settings applied to a probe through [`ProbeBuilder::config`](crate::probe::ProbeBuilder::config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeConfig {
    /// Emit lightweight metrics events.
    pub metrics: bool,

    /// Open heavyweight request spans.
    pub requests: bool,

    /// Topic for metrics events (defaults to the framework name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Topic for closed request spans
    pub request_topic: String,

    /// Kind of request spans (defaults to `HTTP`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_kind: Option<String>,

    /// Fail attach when the application lacks one of the probe's methods
    pub strict_methods: bool,

    /// Give the probe its own channel with this capacity instead of the
    /// process-wide one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            requests: true,
            topic: None,
            request_topic: REQUEST_TOPIC.to_string(),
            span_kind: None,
            strict_methods: false,
            channel_capacity: None,
        }
    }
}

impl ProbeConfig {
    /// Check values serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "channelCapacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.request_topic.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "requestTopic".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if matches!(&self.topic, Some(topic) if topic.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "topic".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
