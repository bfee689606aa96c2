// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lightweight per-call metrics events.
//!
//! One event per completed call, published as-is. Nothing is aggregated
//! here; consumers of the channel do their own rollups.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::channel::PublishChannel;

/// Timing and route identity of one dispatched call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEvent {
    /// Call start, in milliseconds since the Unix epoch.
    pub time: i64,
    /// Route pattern (first argument of the call).
    pub route: Value,
    /// Dispatch method name, e.g. `get`.
    pub method: String,
    /// Elapsed milliseconds between call start and completion.
    pub duration: f64,
}

/// Emits [`MetricsEvent`]s on a publish channel under a fixed topic.
#[derive(Clone)]
pub struct MetricsReporter {
    channel: Arc<dyn PublishChannel>,
    topic: String,
}

impl MetricsReporter {
    /// Create a reporter publishing under `topic`.
    pub fn new(channel: Arc<dyn PublishChannel>, topic: impl Into<String>) -> Self {
        Self {
            channel,
            topic: topic.into(),
        }
    }

    /// Topic events are published under.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one event.
    pub fn emit(&self, event: &MetricsEvent) {
        match serde_json::to_value(event) {
            Ok(record) => self.channel.emit(&self.topic, record),
            Err(err) => tracing::warn!(error = %err, "Failed to encode metrics event"),
        }
    }
}

impl fmt::Debug for MetricsReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsReporter")
            .field("topic", &self.topic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::channel::{drain, BroadcastChannel};
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = MetricsEvent {
            time: 1_700_000_000_000,
            route: json!("/users"),
            method: "get".to_string(),
            duration: 1.5,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"time": 1_700_000_000_000i64, "route": "/users", "method": "get", "duration": 1.5})
        );
    }

    #[test]
    fn test_emit_publishes_under_topic() {
        let channel = Arc::new(BroadcastChannel::new(8));
        let mut receiver = channel.subscribe();
        let reporter = MetricsReporter::new(channel.clone(), "express");

        let event = MetricsEvent {
            time: 0,
            route: json!("/orders/:id"),
            method: "delete".to_string(),
            duration: 0.0,
        };
        reporter.emit(&event);

        let records = drain(&mut receiver);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "express");
        let parsed: MetricsEvent = serde_json::from_value(records[0].record.clone()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_reporter_debug_hides_channel() {
        let reporter = MetricsReporter::new(Arc::new(BroadcastChannel::new(1)), "express");
        assert_eq!(reporter.topic(), "express");
        assert!(format!("{:?}", reporter).contains("express"));
    }
}
