// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry streams produced for every intercepted call.
//!
//! Two independent streams are reported at call completion:
//!
//! - **Metrics**: a lightweight [`MetricsEvent`] published on the
//!   [`PublishChannel`] under the probe's topic
//! - **Requests**: a heavyweight [`RequestSpan`] opened at call start and
//!   stopped at completion
//!
//! [`DualReporter`] opens a [`CorrelationContext`] at call start and consumes
//! it at completion, so each call reports at most once per stream.

pub mod channel;
pub mod metrics;
pub mod spans;

pub use channel::{BroadcastChannel, PublishChannel, Published, GLOBAL_CHANNEL};
pub use metrics::{MetricsEvent, MetricsReporter};
pub use spans::{
    url_context, ContextMap, RequestRecord, RequestSpan, SpanReporter, TracingSpanReporter,
    REQUEST_TOPIC,
};

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::probe::{CorrelationContext, Timer};

/// Span kind used for HTTP dispatch.
pub const HTTP_SPAN_KIND: &str = "HTTP";

/// Span name used for HTTP dispatch.
pub const REQUEST_SPAN_NAME: &str = "request";

/// A reporting stream that can be switched on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Lightweight metrics events.
    Metrics,
    /// Heavyweight request spans.
    Requests,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Requests => "requests",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stream {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metrics" => Ok(Self::Metrics),
            "requests" => Ok(Self::Requests),
            _ => Err(ProbeError::UnknownStream(s.to_string())),
        }
    }
}

/// On/off state of both streams. Read once per call, at call start.
#[derive(Debug)]
pub struct StreamSwitches {
    metrics: AtomicBool,
    requests: AtomicBool,
}

impl StreamSwitches {
    pub fn new(metrics: bool, requests: bool) -> Self {
        Self {
            metrics: AtomicBool::new(metrics),
            requests: AtomicBool::new(requests),
        }
    }

    /// Turn a stream on or off for calls starting from now.
    pub fn set(&self, stream: Stream, enabled: bool) {
        self.flag(stream).store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self, stream: Stream) -> bool {
        self.flag(stream).load(Ordering::Relaxed)
    }

    fn flag(&self, stream: Stream) -> &AtomicBool {
        match stream {
            Stream::Metrics => &self.metrics,
            Stream::Requests => &self.requests,
        }
    }
}

impl Default for StreamSwitches {
    fn default() -> Self {
        Self::new(true, true)
    }
}

/// Starts and finishes both telemetry streams for intercepted calls.
///
/// Cheap to clone; clones share the same channel, span reporter and switches.
#[derive(Clone)]
pub struct DualReporter {
    metrics: MetricsReporter,
    spans: Arc<dyn SpanReporter>,
    switches: Arc<StreamSwitches>,
    span_kind: String,
}

impl DualReporter {
    pub fn new(
        metrics: MetricsReporter,
        spans: Arc<dyn SpanReporter>,
        switches: Arc<StreamSwitches>,
    ) -> Self {
        Self {
            metrics,
            spans,
            switches,
            span_kind: HTTP_SPAN_KIND.to_string(),
        }
    }

    /// Set the kind of the request spans this reporter opens.
    pub fn with_span_kind(mut self, kind: impl Into<String>) -> Self {
        self.span_kind = kind.into();
        self
    }

    /// Stream switches shared with the owning probe.
    pub fn switches(&self) -> &StreamSwitches {
        &self.switches
    }

    /// Topic metrics events are published under.
    pub fn topic(&self) -> &str {
        self.metrics.topic()
    }

    /// Open the correlation context for a call that is about to run.
    ///
    /// The timer always starts; a request span is opened (with the route as
    /// its `url` context) only while requests are enabled.
    pub fn start(&self, method: &str, args: &[Value]) -> CorrelationContext {
        let timer = Timer::start();
        let route = args.first().cloned().unwrap_or(Value::Null);

        let span = self.switches.is_enabled(Stream::Requests).then(|| {
            let mut span = self
                .spans
                .open_span(&self.span_kind, REQUEST_SPAN_NAME, false, &timer);
            span.set_context(url_context(route));
            span
        });

        CorrelationContext::new(
            method,
            args.to_vec(),
            timer,
            span,
            self.switches.is_enabled(Stream::Metrics),
        )
    }

    /// Complete a call: stop its timer, emit the metrics event and close the
    /// request span. Consumes the context so it can only finish once.
    pub fn finish(&self, context: CorrelationContext) {
        let id = context.id();
        let route = context.route();
        let (method, mut timer, span, emit_metrics) = context.into_parts();

        let duration = match timer.stop() {
            Ok(duration) => duration,
            Err(err) => {
                warn!(correlation_id = %id, error = %err, "Call completed twice, ignoring");
                return;
            }
        };

        if emit_metrics {
            self.metrics.emit(&MetricsEvent {
                time: timer.start_time_millis(),
                route: route.clone(),
                method: method.clone(),
                duration,
            });
        }

        if let Some(span) = span {
            span.stop(url_context(route));
        }

        debug!(
            correlation_id = %id,
            method = %method,
            duration_ms = duration,
            "Dispatch call complete"
        );
    }
}

impl fmt::Debug for DualReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualReporter")
            .field("topic", &self.metrics.topic())
            .field("span_kind", &self.span_kind)
            .field("switches", &self.switches)
            .finish()
    }
}
