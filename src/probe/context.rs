// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-call correlation context.

use std::fmt;

use serde_json::Value;

use super::Timer;
use crate::report::RequestSpan;
use crate::telemetry::CorrelationId;

/// State tying one call's start to its completion.
///
/// Created by before advice, moved into the single completion closure of
/// the call, and consumed by [`DualReporter::finish`](crate::report::DualReporter::finish).
/// Not `Clone`: a context can only ever complete once.
pub struct CorrelationContext {
    id: CorrelationId,
    method_name: String,
    method_args: Vec<Value>,
    timer: Timer,
    span: Option<Box<dyn RequestSpan>>,
    emit_metrics: bool,
}

impl CorrelationContext {
    pub fn new(
        method_name: impl Into<String>,
        method_args: Vec<Value>,
        timer: Timer,
        span: Option<Box<dyn RequestSpan>>,
        emit_metrics: bool,
    ) -> Self {
        Self {
            id: CorrelationId::new(),
            method_name: method_name.into(),
            method_args,
            timer,
            span,
            emit_metrics,
        }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn method_args(&self) -> &[Value] {
        &self.method_args
    }

    /// Route of the call: its first argument, or `null` if it had none.
    pub fn route(&self) -> Value {
        self.method_args.first().cloned().unwrap_or(Value::Null)
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Whether a request span was opened for this call.
    pub fn has_span(&self) -> bool {
        self.span.is_some()
    }

    /// Whether a metrics event will be emitted at completion.
    pub fn emits_metrics(&self) -> bool {
        self.emit_metrics
    }

    pub(crate) fn into_parts(self) -> (String, Timer, Option<Box<dyn RequestSpan>>, bool) {
        (self.method_name, self.timer, self.span, self.emit_metrics)
    }
}

impl fmt::Debug for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationContext")
            .field("id", &self.id)
            .field("method_name", &self.method_name)
            .field("method_args", &self.method_args)
            .field("timer", &self.timer)
            .field("has_span", &self.span.is_some())
            .field("emit_metrics", &self.emit_metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_is_first_argument() {
        let context = CorrelationContext::new(
            "get",
            vec![json!("/users/:id"), json!("handler")],
            Timer::start(),
            None,
            true,
        );
        assert_eq!(context.route(), json!("/users/:id"));
        assert_eq!(context.method_name(), "get");
        assert_eq!(context.method_args().len(), 2);
        assert!(!context.has_span());
        assert!(context.emits_metrics());
    }

    #[test]
    fn test_route_defaults_to_null() {
        let context = CorrelationContext::new("head", vec![], Timer::start(), None, false);
        assert_eq!(context.route(), Value::Null);
    }

    #[test]
    fn test_contexts_are_independent() {
        let a = CorrelationContext::new("get", vec![json!("/a")], Timer::start(), None, true);
        let b = CorrelationContext::new("get", vec![json!("/b")], Timer::start(), None, true);
        assert_ne!(a.id(), b.id());
        assert!(!a.timer().is_stopped());
    }

    #[test]
    fn test_debug_omits_span_internals() {
        let context = CorrelationContext::new("get", vec![json!("/")], Timer::start(), None, true);
        let debug = format!("{:?}", context);
        assert!(debug.contains("CorrelationContext"));
        assert!(debug.contains("has_span: false"));
    }
}
