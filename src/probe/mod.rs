// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Probes: the composition root of the instrumentation.
//!
//! A [`Probe`] is named after the framework it instruments. Hosts offer every
//! loaded framework module to every probe through [`Probe::attach`] (or to a
//! whole [`ProbeSet`] at once); a probe reacts only to its own framework
//! name and wraps each target instance at most once.
//!
//! # Example
//!
//! ```rust,ignore
//! use routeprobe::probe::http;
//!
//! let probe = http::http_probe().build();
//! let target = probe.attach("express", express_module)?;
//! ```

pub(crate) mod context;
mod guard;
pub mod http;
pub(crate) mod timer;

pub use context::CorrelationContext;
pub use guard::{AttachmentGuard, GLOBAL_ATTACHMENTS};
pub use timer::Timer;

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::advice::{AdviceRegistry, Aspect, BeforeAdvice, Invocation};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::framework::Instrumentable;
use crate::report::{
    BroadcastChannel, DualReporter, MetricsReporter, PublishChannel, Published, SpanReporter,
    Stream, StreamSwitches, TracingSpanReporter, GLOBAL_CHANNEL, HTTP_SPAN_KIND, REQUEST_TOPIC,
};

/// Something that can be offered framework modules by name.
pub trait Instrument: Send + Sync {
    /// Framework identifier this instrument reacts to.
    fn name(&self) -> &str;

    /// Offer `target`, loaded under `name`. Returns the (possibly
    /// instrumented) target.
    fn attach(
        &self,
        name: &str,
        target: Arc<dyn Instrumentable>,
    ) -> Result<Arc<dyn Instrumentable>, ProbeError>;
}

/// Instruments the dispatch methods of one framework.
pub struct Probe {
    name: String,
    methods: Vec<String>,
    advice: Arc<dyn AdviceRegistry>,
    reporter: DualReporter,
    broadcast: Option<BroadcastChannel>,
}

impl Probe {
    /// Start building a probe for the framework named `name`.
    pub fn builder(name: impl Into<String>) -> ProbeBuilder {
        ProbeBuilder::new(name)
    }

    /// Framework identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch methods this probe intercepts.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Topic metrics events are published under.
    pub fn topic(&self) -> &str {
        self.reporter.topic()
    }

    /// Whether the application behind `target` has been instrumented by a
    /// probe of this name.
    pub fn is_attached(&self, target: &Arc<dyn Instrumentable>) -> bool {
        self.advice
            .after_constructor(target.as_ref())
            .is_some_and(|application| {
                GLOBAL_ATTACHMENTS.is_attached(&self.name, &application)
            })
    }

    /// Subscribe to the channel the builder created for this probe.
    ///
    /// `None` when the channel was supplied through [`ProbeBuilder::channel`];
    /// subscribe to that channel instead.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Published>> {
        self.broadcast.as_ref().map(BroadcastChannel::subscribe)
    }

    /// Turn a reporting stream on for calls starting from now.
    pub fn enable(&self, stream: Stream) {
        self.reporter.switches().set(stream, true);
    }

    /// Turn a reporting stream off for calls starting from now.
    pub fn disable(&self, stream: Stream) {
        self.reporter.switches().set(stream, false);
    }

    pub fn is_enabled(&self, stream: Stream) -> bool {
        self.reporter.switches().is_enabled(stream)
    }

    /// Attach to `target` if it was loaded under this probe's framework name.
    ///
    /// Mismatched names, targets without an application, and targets whose
    /// application a probe of this name already instrumented (through any
    /// module or probe instance) are returned unchanged. The target is mutated in place:
    /// its application's dispatch methods are replaced by advised ones. The
    /// only error is one raised by the advice registry.
    pub fn attach(
        &self,
        name: &str,
        target: Arc<dyn Instrumentable>,
    ) -> Result<Arc<dyn Instrumentable>, ProbeError> {
        if name != self.name {
            trace!(probe = %self.name, offered = %name, "Target not for this probe");
            return Ok(target);
        }
        let Some(application) = self.advice.after_constructor(target.as_ref()) else {
            debug!(probe = %self.name, "Target exposes no application, skipping");
            return Ok(target);
        };

        if !GLOBAL_ATTACHMENTS.mark(&self.name, &application) {
            debug!(probe = %self.name, "Application already instrumented");
            return Ok(target);
        }

        let methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
        self.advice
            .apply_before_advice(&application, &methods, self.before_advice())?;

        info!(
            probe = %self.name,
            methods = methods.len(),
            topic = %self.topic(),
            "Probe attached"
        );
        Ok(target)
    }

    /// Advice run before every intercepted call.
    ///
    /// Captures only the shared reporter; each call gets its own context,
    /// moved into exactly one completion closure.
    fn before_advice(&self) -> Arc<BeforeAdvice> {
        let reporter = self.reporter.clone();
        Arc::new(move |invocation: &mut Invocation| {
            let context = reporter.start(invocation.method(), invocation.args());
            let reporter = reporter.clone();
            if invocation.find_trailing_callback() {
                invocation.around_callback(move |_values| reporter.finish(context));
            } else {
                invocation.after_return(move || reporter.finish(context));
            }
        })
    }
}

impl Instrument for Probe {
    fn name(&self) -> &str {
        Probe::name(self)
    }

    fn attach(
        &self,
        name: &str,
        target: Arc<dyn Instrumentable>,
    ) -> Result<Arc<dyn Instrumentable>, ProbeError> {
        Probe::attach(self, name, target)
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("methods", &self.methods.len())
            .field("owns_channel", &self.broadcast.is_some())
            .field("reporter", &self.reporter)
            .finish()
    }
}

/// Builder for constructing a [`Probe`].
pub struct ProbeBuilder {
    name: String,
    methods: Vec<String>,
    topic: Option<String>,
    channel: Option<Arc<dyn PublishChannel>>,
    broadcast: Option<BroadcastChannel>,
    spans: Option<Arc<dyn SpanReporter>>,
    request_topic: Option<String>,
    advice: Option<Arc<dyn AdviceRegistry>>,
    span_kind: String,
    metrics: bool,
    requests: bool,
}

impl ProbeBuilder {
    /// Create a builder for the framework named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            topic: None,
            channel: None,
            broadcast: None,
            spans: None,
            request_topic: None,
            advice: None,
            span_kind: HTTP_SPAN_KIND.to_string(),
            metrics: true,
            requests: true,
        }
    }

    /// Add dispatch methods to intercept. Duplicates are ignored.
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for method in methods {
            let method = method.into();
            if !self.methods.contains(&method) {
                self.methods.push(method);
            }
        }
        self
    }

    /// Publish metrics under `topic` instead of the framework name.
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Publish on `channel` instead of [`GLOBAL_CHANNEL`].
    pub fn channel(mut self, channel: Arc<dyn PublishChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Use a custom span reporter.
    pub fn span_reporter(mut self, spans: Arc<dyn SpanReporter>) -> Self {
        self.spans = Some(spans);
        self
    }

    /// Publish closed request spans under `topic` on the probe's channel.
    ///
    /// Only applies to the default span reporter.
    pub fn request_topic(mut self, topic: impl Into<String>) -> Self {
        self.request_topic = Some(topic.into());
        self
    }

    /// Use a custom advice registry.
    pub fn advice(mut self, advice: Arc<dyn AdviceRegistry>) -> Self {
        self.advice = Some(advice);
        self
    }

    /// Kind of the request spans opened for each call.
    pub fn span_kind(mut self, kind: impl Into<String>) -> Self {
        self.span_kind = kind.into();
        self
    }

    /// Initial state of the metrics stream.
    pub fn metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Initial state of the requests stream.
    pub fn requests(mut self, enabled: bool) -> Self {
        self.requests = enabled;
        self
    }

    /// Apply a loaded [`ProbeConfig`].
    ///
    /// `strictMethods` selects [`Aspect::strict`] only when no registry was
    /// set through [`advice`](Self::advice). `channelCapacity` gives the probe
    /// its own channel, readable through [`Probe::subscribe`], unless one was
    /// set through [`channel`](Self::channel).
    pub fn config(mut self, config: &ProbeConfig) -> Self {
        self.metrics = config.metrics;
        self.requests = config.requests;
        if let Some(topic) = &config.topic {
            self.topic = Some(topic.clone());
        }
        if let Some(kind) = &config.span_kind {
            self.span_kind = kind.clone();
        }
        self.request_topic = Some(config.request_topic.clone());
        if config.strict_methods && self.advice.is_none() {
            self.advice = Some(Arc::new(Aspect::strict()));
        }
        if let (None, Some(capacity)) = (&self.channel, config.channel_capacity) {
            self.broadcast = Some(BroadcastChannel::new(capacity));
        }
        self
    }

    /// Build the probe.
    pub fn build(self) -> Probe {
        let (channel, broadcast): (Arc<dyn PublishChannel>, _) = match self.channel {
            Some(channel) => (channel, None),
            None => {
                let broadcast = self.broadcast.unwrap_or_else(|| GLOBAL_CHANNEL.clone());
                (Arc::new(broadcast.clone()), Some(broadcast))
            }
        };
        let topic = self.topic.unwrap_or_else(|| self.name.clone());

        let spans: Arc<dyn SpanReporter> = match self.spans {
            Some(spans) => spans,
            None => {
                let request_topic = self
                    .request_topic
                    .unwrap_or_else(|| REQUEST_TOPIC.to_string());
                Arc::new(
                    TracingSpanReporter::new().with_channel(Arc::clone(&channel), request_topic),
                )
            }
        };

        let reporter = DualReporter::new(
            MetricsReporter::new(channel, topic),
            spans,
            Arc::new(StreamSwitches::new(self.metrics, self.requests)),
        )
        .with_span_kind(self.span_kind);

        Probe {
            name: self.name,
            methods: self.methods,
            advice: self.advice.unwrap_or_else(|| Arc::new(Aspect::lenient())),
            reporter,
            broadcast,
        }
    }
}

/// A set of instruments offered every loaded framework module.
#[derive(Default)]
pub struct ProbeSet {
    instruments: Vec<Arc<dyn Instrument>>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument.
    pub fn register(&mut self, instrument: Arc<dyn Instrument>) -> &mut Self {
        self.instruments.push(instrument);
        self
    }

    /// Get an instrument by framework name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Instrument>> {
        self.instruments.iter().find(|i| i.name() == name).cloned()
    }

    /// Framework names of all registered instruments.
    pub fn names(&self) -> Vec<&str> {
        self.instruments.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Offer `target`, loaded under `name`, to every instrument in turn.
    ///
    /// Stops at the first registry error.
    pub fn attach_all(
        &self,
        name: &str,
        target: Arc<dyn Instrumentable>,
    ) -> Result<Arc<dyn Instrumentable>, ProbeError> {
        self.instruments
            .iter()
            .try_fold(target, |target, instrument| instrument.attach(name, target))
    }
}

impl fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeSet")
            .field("instruments", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::{Application, Args, CallShape, Callback, FrameworkModule};
    use crate::report::channel::drain;
    use serde_json::{json, Value};

    fn module(methods: &[(&str, CallShape)]) -> (Arc<Application>, Arc<dyn Instrumentable>) {
        let app = Arc::new(Application::new());
        for &(name, shape) in methods {
            app.define(name, shape, |args: Args, cb: Option<Callback>| {
                if let Some(cb) = cb {
                    cb(vec![Value::Null]);
                }
                args.first().cloned().unwrap_or(Value::Null)
            });
        }
        let target = FrameworkModule::new(Arc::clone(&app)).into_target();
        (app, target)
    }

    fn probe(channel: &Arc<BroadcastChannel>) -> Probe {
        Probe::builder("express")
            .methods(["get", "post"])
            .channel(channel.clone())
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let channel = Arc::new(BroadcastChannel::new(8));
        let probe = probe(&channel);
        assert_eq!(probe.name(), "express");
        assert_eq!(probe.topic(), "express");
        assert_eq!(probe.methods(), &["get".to_string(), "post".to_string()]);
        assert!(probe.is_enabled(Stream::Metrics));
        assert!(probe.is_enabled(Stream::Requests));
    }

    #[test]
    fn test_builder_dedupes_methods() {
        let probe = Probe::builder("express")
            .methods(["get", "get"])
            .methods(vec!["post".to_string(), "get".to_string()])
            .channel(Arc::new(BroadcastChannel::new(1)))
            .build();
        assert_eq!(probe.methods().len(), 2);
    }

    #[test]
    fn test_attach_other_name_is_noop() {
        let channel = Arc::new(BroadcastChannel::new(8));
        let mut receiver = channel.subscribe();
        let probe = probe(&channel);
        let (app, target) = module(&[("get", CallShape::Sync)]);

        let returned = probe.attach("koa", Arc::clone(&target)).unwrap();
        assert!(Arc::ptr_eq(&returned, &target));
        assert!(!probe.is_attached(&target));

        app.invoke("get", vec![json!("/")], None).unwrap();
        assert!(drain(&mut receiver).is_empty());
    }

    #[test]
    fn test_attach_without_application_is_noop() {
        let probe = probe(&Arc::new(BroadcastChannel::new(8)));
        let target = FrameworkModule::without_application().into_target();

        probe.attach("express", Arc::clone(&target)).unwrap();
        assert!(!probe.is_attached(&target));
    }

    #[test]
    fn test_sync_call_reports_after_return() {
        let channel = Arc::new(BroadcastChannel::new(8));
        let mut receiver = channel.subscribe();
        let probe = probe(&channel);
        let (app, target) = module(&[("post", CallShape::Sync)]);

        probe.attach("express", target).unwrap();
        let result = app.invoke("post", vec![json!("/items")], None).unwrap();
        assert_eq!(result, json!("/items"));

        let records = drain(&mut receiver);
        let metrics: Vec<_> = records.iter().filter(|p| p.topic == "express").collect();
        let requests: Vec<_> = records.iter().filter(|p| p.topic == "request").collect();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].record["method"], json!("post"));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].record["context"], json!({"url": "/items"}));
    }

    #[test]
    fn test_disable_metrics_stream() {
        let channel = Arc::new(BroadcastChannel::new(8));
        let mut receiver = channel.subscribe();
        let probe = probe(&channel);
        let (app, target) = module(&[("get", CallShape::Sync)]);
        probe.attach("express", target).unwrap();

        probe.disable(Stream::Metrics);
        app.invoke("get", vec![json!("/")], None).unwrap();
        let topics: Vec<_> = drain(&mut receiver).into_iter().map(|p| p.topic).collect();
        assert_eq!(topics, vec!["request"]);

        probe.enable(Stream::Metrics);
        probe.disable(Stream::Requests);
        app.invoke("get", vec![json!("/")], None).unwrap();
        let topics: Vec<_> = drain(&mut receiver).into_iter().map(|p| p.topic).collect();
        assert_eq!(topics, vec!["express"]);
    }

    #[test]
    fn test_strict_config_surfaces_missing_method() {
        let config = ProbeConfig {
            strict_methods: true,
            ..ProbeConfig::default()
        };
        let probe = Probe::builder("express")
            .methods(["get", "mkactivity"])
            .channel(Arc::new(BroadcastChannel::new(1)))
            .config(&config)
            .build();
        let (_, target) = module(&[("get", CallShape::Sync)]);

        let err = probe.attach("express", Arc::clone(&target)).err().unwrap();
        assert!(matches!(err, ProbeError::MethodNotFound(m) if m == "mkactivity"));
        // The marker is terminal even when advice fails.
        assert!(probe.is_attached(&target));
    }

    #[test]
    fn test_strict_config_keeps_explicit_registry() {
        let config = ProbeConfig {
            strict_methods: true,
            ..ProbeConfig::default()
        };
        let probe = Probe::builder("express")
            .methods(["get", "mkactivity"])
            .channel(Arc::new(BroadcastChannel::new(1)))
            .advice(Arc::new(Aspect::lenient()))
            .config(&config)
            .build();
        let (_, target) = module(&[("get", CallShape::Sync)]);

        assert!(probe.attach("express", Arc::clone(&target)).is_ok());
        assert!(probe.is_attached(&target));
    }

    #[test]
    fn test_config_capacity_channel_is_subscribable() {
        let config = ProbeConfig {
            channel_capacity: Some(16),
            ..ProbeConfig::default()
        };
        let probe = Probe::builder("express")
            .methods(["get"])
            .config(&config)
            .build();
        let mut receiver = probe.subscribe().unwrap();
        let (app, target) = module(&[("get", CallShape::Sync)]);
        probe.attach("express", target).unwrap();

        app.invoke("get", vec![json!("/sized")], None).unwrap();
        let topics: Vec<_> = drain(&mut receiver).into_iter().map(|p| p.topic).collect();
        assert_eq!(topics, vec!["express", "request"]);
    }

    #[test]
    fn test_supplied_channel_is_not_subscribable_through_probe() {
        let config = ProbeConfig {
            channel_capacity: Some(16),
            ..ProbeConfig::default()
        };
        let probe = Probe::builder("express")
            .config(&config)
            .channel(Arc::new(BroadcastChannel::new(4)))
            .build();
        assert!(probe.subscribe().is_none());
    }

    #[test]
    fn test_shared_application_wrapped_once_across_modules() {
        let channel = Arc::new(BroadcastChannel::new(16));
        let mut receiver = channel.subscribe();
        let probe = probe(&channel);
        let (app, first) = module(&[("get", CallShape::Sync)]);
        let second = FrameworkModule::new(Arc::clone(&app)).into_target();

        probe.attach("express", first).unwrap();
        probe.attach("express", Arc::clone(&second)).unwrap();
        assert!(probe.is_attached(&second));

        app.invoke("get", vec![json!("/")], None).unwrap();
        let topics: Vec<_> = drain(&mut receiver).into_iter().map(|p| p.topic).collect();
        assert_eq!(topics, vec!["express", "request"]);
    }

    #[test]
    fn test_config_topic_and_streams() {
        let config = ProbeConfig {
            topic: Some("http".to_string()),
            requests: false,
            span_kind: Some("HTTP-OUTBOUND".to_string()),
            ..ProbeConfig::default()
        };
        let probe = Probe::builder("express")
            .channel(Arc::new(BroadcastChannel::new(1)))
            .config(&config)
            .build();
        assert_eq!(probe.topic(), "http");
        assert!(probe.is_enabled(Stream::Metrics));
        assert!(!probe.is_enabled(Stream::Requests));
        assert!(format!("{:?}", probe).contains("HTTP-OUTBOUND"));
    }

    #[test]
    fn test_probe_set_routes_by_name() {
        let channel = Arc::new(BroadcastChannel::new(16));
        let mut receiver = channel.subscribe();

        let express = Arc::new(probe(&channel));
        let koa = Arc::new(
            Probe::builder("koa")
                .methods(["get"])
                .channel(channel.clone())
                .build(),
        );
        let mut set = ProbeSet::new();
        set.register(express.clone()).register(koa.clone());
        assert_eq!(set.names(), vec!["express", "koa"]);
        assert_eq!(set.len(), 2);
        assert!(set.get("koa").is_some());
        assert!(set.get("hapi").is_none());

        let (app, target) = module(&[("get", CallShape::Sync)]);
        set.attach_all("express", Arc::clone(&target)).unwrap();
        assert!(express.is_attached(&target));
        assert!(!koa.is_attached(&target));

        app.invoke("get", vec![json!("/")], None).unwrap();
        let metrics = drain(&mut receiver)
            .into_iter()
            .filter(|p| p.topic != "request")
            .count();
        assert_eq!(metrics, 1);
    }
}
