// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Framework-side abstractions a probe attaches to.
//!
//! A framework module (the object a host hands to probes) is anything
//! implementing [`Instrumentable`]. It may expose an [`Application`], the
//! sub-object holding the dispatch methods that probes decorate.

mod application;

pub use application::{Application, Args, CallShape, Callback, Handler};

use std::sync::Arc;

/// A target object offered to probes.
pub trait Instrumentable: Send + Sync + 'static {
    /// Resolve the object that actually exposes the dispatch methods.
    ///
    /// Returns `None` when this target has no such sub-object, in which case
    /// probes leave it untouched.
    fn application(&self) -> Option<Arc<Application>>;
}

impl Instrumentable for Application {
    // A bare application is not a framework module; probes look for the
    // module wrapping it.
    fn application(&self) -> Option<Arc<Application>> {
        None
    }
}

/// A loaded framework module, optionally carrying its application.
#[derive(Debug, Clone, Default)]
pub struct FrameworkModule {
    application: Option<Arc<Application>>,
}

impl FrameworkModule {
    /// Create a module exposing the given application.
    pub fn new(application: Arc<Application>) -> Self {
        Self {
            application: Some(application),
        }
    }

    /// Create a module with no application (nothing to instrument).
    pub fn without_application() -> Self {
        Self { application: None }
    }

    /// Wrap this module for handing to probes.
    pub fn into_target(self) -> Arc<dyn Instrumentable> {
        Arc::new(self)
    }
}

impl Instrumentable for FrameworkModule {
    fn application(&self) -> Option<Arc<Application>> {
        self.application.clone()
    }
}
