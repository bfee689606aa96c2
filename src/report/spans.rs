// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Heavyweight request spans.
//!
//! A request span is opened when a call starts, carries an attribute map
//! (the context), and is stopped exactly once when the call completes.
//! [`TracingSpanReporter`] backs each request span with a `tracing` span and
//! can additionally publish a [`RequestRecord`] for every closed span.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, info_span, Span};

use super::channel::PublishChannel;
use crate::probe::timer::duration_millis;
use crate::probe::Timer;
use crate::telemetry::{CorrelationId, CorrelationIdExt};

/// Topic closed request spans are published under by default.
pub const REQUEST_TOPIC: &str = "request";

/// Attributes attached to a request span.
pub type ContextMap = BTreeMap<String, Value>;

/// Build the `{url: ...}` context used by HTTP request spans.
pub fn url_context(url: Value) -> ContextMap {
    let mut context = ContextMap::new();
    context.insert("url".to_string(), url);
    context
}

/// Opens request spans.
pub trait SpanReporter: Send + Sync {
    /// Open a span of `kind` (e.g. `HTTP`) named `name`, timed from `timer`'s start.
    fn open_span(&self, kind: &str, name: &str, is_async: bool, timer: &Timer)
        -> Box<dyn RequestSpan>;
}

/// An open request span.
pub trait RequestSpan: Send {
    /// Identifier of this span.
    fn id(&self) -> CorrelationId;

    /// Merge `context` into the span's attributes.
    fn set_context(&mut self, context: ContextMap);

    /// Close the span, merging the closing `context` first.
    fn stop(self: Box<Self>, context: ContextMap);
}

/// A closed request span, as published on the request topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    /// Span start, in milliseconds since the Unix epoch.
    pub time: i64,
    pub kind: String,
    pub name: String,
    pub id: CorrelationId,
    pub is_async: bool,
    pub context: ContextMap,
    /// Elapsed milliseconds between open and stop.
    pub duration: f64,
}

/// Span reporter backed by `tracing`.
#[derive(Clone, Default)]
pub struct TracingSpanReporter {
    publisher: Option<(Arc<dyn PublishChannel>, String)>,
}

impl TracingSpanReporter {
    /// Reporter that only logs spans.
    pub fn new() -> Self {
        Self { publisher: None }
    }

    /// Also publish a [`RequestRecord`] on `channel` under `topic` when a span stops.
    pub fn with_channel(
        mut self,
        channel: Arc<dyn PublishChannel>,
        topic: impl Into<String>,
    ) -> Self {
        self.publisher = Some((channel, topic.into()));
        self
    }

    /// Topic records are published under, if publishing.
    pub fn topic(&self) -> Option<&str> {
        self.publisher.as_ref().map(|(_, topic)| topic.as_str())
    }
}

impl fmt::Debug for TracingSpanReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingSpanReporter")
            .field("topic", &self.topic())
            .finish()
    }
}

impl SpanReporter for TracingSpanReporter {
    fn open_span(
        &self,
        kind: &str,
        name: &str,
        is_async: bool,
        timer: &Timer,
    ) -> Box<dyn RequestSpan> {
        let id = CorrelationId::new();
        let span = info_span!(
            "request",
            kind = %kind,
            name = %name,
            is_async,
            correlation_id = tracing::field::Empty,
            url = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );
        span.record_correlation_id(&id);

        Box::new(TracingRequestSpan {
            id,
            kind: kind.to_string(),
            name: name.to_string(),
            is_async,
            start_time_millis: timer.start_time_millis(),
            started: timer.started_at(),
            context: ContextMap::new(),
            span,
            publisher: self.publisher.clone(),
        })
    }
}

struct TracingRequestSpan {
    id: CorrelationId,
    kind: String,
    name: String,
    is_async: bool,
    start_time_millis: i64,
    started: Instant,
    context: ContextMap,
    span: Span,
    publisher: Option<(Arc<dyn PublishChannel>, String)>,
}

impl TracingRequestSpan {
    fn record_url(&self) {
        match self.context.get("url") {
            Some(Value::String(url)) => {
                self.span.record("url", url.as_str());
            }
            Some(other) => {
                self.span.record("url", other.to_string().as_str());
            }
            None => {}
        }
    }
}

impl RequestSpan for TracingRequestSpan {
    fn id(&self) -> CorrelationId {
        self.id
    }

    fn set_context(&mut self, context: ContextMap) {
        self.context.extend(context);
        self.record_url();
    }

    fn stop(self: Box<Self>, context: ContextMap) {
        let mut this = *self;
        this.context.extend(context);
        this.record_url();

        let duration_ms = duration_millis(this.started.elapsed());
        this.span.record("duration_ms", duration_ms);
        info!(parent: &this.span, duration_ms, "Request complete");

        if let Some((channel, topic)) = this.publisher.take() {
            let record = RequestRecord {
                time: this.start_time_millis,
                kind: this.kind,
                name: this.name,
                id: this.id,
                is_async: this.is_async,
                context: this.context,
                duration: duration_ms,
            };
            match serde_json::to_value(&record) {
                Ok(value) => channel.emit(&topic, value),
                Err(err) => tracing::warn!(error = %err, "Failed to encode request record"),
            }
        }
    }
}
