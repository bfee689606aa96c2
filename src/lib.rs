// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! routeprobe - in-process instrumentation for HTTP routing frameworks.
//!
//! A probe intercepts the dispatch methods of a framework's application
//! object (`get`, `post`, ...) and reports every call on two streams:
//! a lightweight metrics event and a heavyweight request span. Completion is
//! detected on the trailing callback for callback-shaped methods and on
//! return otherwise, and each call completes at most once.
//!
//! # Architecture
//!
//! - [`framework`] - Application model: named dispatch methods and their call shapes
//! - [`advice`] - Before-advice and callback wrapping over application methods
//! - [`probe`] - Probes, attachment, timers and per-call correlation contexts
//! - [`report`] - Publish channel, metrics events and request spans
//! - [`config`] - Probe configuration files
//! - [`telemetry`] - Tracing subscriber setup and correlation ids
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use routeprobe::framework::{Application, CallShape, FrameworkModule};
//! use routeprobe::probe::http::http_probe;
//!
//! let app = Arc::new(Application::new());
//! app.define("get", CallShape::Callback, get_handler);
//!
//! let probe = http_probe().build();
//! let target = probe.attach("express", FrameworkModule::new(app.clone()).into_target())?;
//!
//! // Calls through `app` now publish on the "express" and "request" topics.
//! app.invoke("get", vec![json!("/users")], Some(callback))?;
//! ```

pub mod advice;
pub mod config;
pub mod error;
pub mod framework;
pub mod probe;
pub mod report;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use advice::{AdviceRegistry, Aspect, Invocation};
pub use config::ProbeConfig;
pub use error::{ConfigError, DispatchError, ProbeError, Result};
pub use framework::{Application, CallShape, FrameworkModule, Instrumentable};
pub use probe::{Instrument, Probe, ProbeBuilder, ProbeSet};
pub use report::{
    BroadcastChannel, MetricsEvent, PublishChannel, Published, RequestRecord, Stream,
    GLOBAL_CHANNEL,
};

/// routeprobe version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let _probe = ProbeBuilder::new("express")
            .channel(std::sync::Arc::new(BroadcastChannel::new(1)))
            .build();
        let _config = ProbeConfig::default();
        assert_eq!(Stream::Metrics.as_str(), "metrics");
    }
}
