// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Advice application for dispatch methods.
//!
//! This module defines how behavior is injected around framework methods:
//! - [`AdviceRegistry`] trait that resolves targets and installs advice
//! - [`Aspect`], the default registry, which decorates [`Application`] methods
//! - [`Invocation`], the per-call view handed to before advice
//!
//! Advice is installed by replacing each named method's handler with a
//! decorator implementing the same [`Handler`] interface. The decorator
//! builds a fresh [`Invocation`] per call, so no mutable state is shared
//! between concurrent calls.

mod invocation;

pub use invocation::Invocation;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
#[cfg(feature = "telemetry")]
use tracing::trace;
use tracing::debug;

use crate::error::ProbeError;
use crate::framework::{Application, Args, CallShape, Callback, Handler, Instrumentable};

/// Advice run synchronously before every call to an advised method.
pub type BeforeAdvice = dyn Fn(&mut Invocation) + Send + Sync;

/// Applies advice to framework targets.
pub trait AdviceRegistry: Send + Sync {
    /// Resolve the application-level sub-object of a freshly constructed
    /// framework module.
    fn after_constructor(&self, target: &dyn Instrumentable) -> Option<Arc<Application>>;

    /// Install `advice` before each of `methods` on `application`.
    fn apply_before_advice(
        &self,
        application: &Application,
        methods: &[&str],
        advice: Arc<BeforeAdvice>,
    ) -> Result<(), ProbeError>;
}

/// Default advice registry.
///
/// Lenient by default: methods the application does not define are skipped.
/// A strict registry refuses to advise anything if one method is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aspect {
    strict: bool,
}

impl Aspect {
    /// Registry that skips methods missing from the application.
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Registry that fails on methods missing from the application.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Whether missing methods are an error.
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl AdviceRegistry for Aspect {
    fn after_constructor(&self, target: &dyn Instrumentable) -> Option<Arc<Application>> {
        target.application()
    }

    fn apply_before_advice(
        &self,
        application: &Application,
        methods: &[&str],
        advice: Arc<BeforeAdvice>,
    ) -> Result<(), ProbeError> {
        if self.strict {
            if let Some(missing) = methods.iter().find(|m| !application.contains(m)) {
                return Err(ProbeError::MethodNotFound(missing.to_string()));
            }
        }

        for &method in methods {
            let advice = Arc::clone(&advice);
            let decorated = application.decorate(method, |shape, inner| {
                Arc::new(AdvisedHandler {
                    method: method.to_string(),
                    shape,
                    inner,
                    advice,
                })
            });
            if decorated.is_err() {
                debug!(method = %method, "Method not defined on application, skipping");
            }
        }

        Ok(())
    }
}

/// Decorated dispatch method: runs before advice, the original handler, then
/// any after-return advice the before advice registered.
struct AdvisedHandler {
    method: String,
    shape: CallShape,
    inner: Arc<dyn Handler>,
    advice: Arc<BeforeAdvice>,
}

impl Handler for AdvisedHandler {
    fn call(&self, args: Args, callback: Option<Callback>) -> Value {
        let mut invocation = Invocation::new(self.method.as_str(), self.shape, args, callback);
        (self.advice)(&mut invocation);

        #[cfg(feature = "telemetry")]
        trace!(method = %self.method, "Dispatching advised call");

        let (args, callback, after_return) = invocation.into_parts();
        let result = self.inner.call(args, callback);
        if let Some(after_return) = after_return {
            after_return();
        }
        result
    }
}

impl fmt::Debug for AdvisedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisedHandler")
            .field("method", &self.method)
            .field("shape", &self.shape)
            .finish()
    }
}
