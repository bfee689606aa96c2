// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Dispatch method table for a web application.
//!
//! An [`Application`] maps method names (`get`, `post`, ...) to handlers. Each
//! method is registered with a [`CallShape`] that says how its completion is
//! observed, so advice can pick the right completion hook without inspecting
//! arguments at call time.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// Arguments passed to a dispatch method.
pub type Args = Vec<Value>;

/// Trailing completion callback. Receives the values the method completes with.
pub type Callback = Box<dyn FnOnce(Args) + Send + 'static>;

/// How a dispatch method signals completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallShape {
    /// Complete when the method returns.
    Sync,
    /// Complete when the trailing callback fires.
    Callback,
}

impl CallShape {
    /// Whether completion is deferred to a callback.
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback)
    }
}

/// A dispatch method body.
pub trait Handler: Send + Sync {
    /// Run the method with its arguments and optional trailing callback.
    fn call(&self, args: Args, callback: Option<Callback>) -> Value;
}

impl<F> Handler for F
where
    F: Fn(Args, Option<Callback>) -> Value + Send + Sync,
{
    fn call(&self, args: Args, callback: Option<Callback>) -> Value {
        self(args, callback)
    }
}

struct MethodSlot {
    shape: CallShape,
    handler: Arc<dyn Handler>,
}

/// Object exposing the named dispatch methods of a framework.
///
/// Methods are shared by every caller of the application; replacing a
/// handler through [`Application::decorate`] affects all subsequent calls.
pub struct Application {
    methods: RwLock<HashMap<String, MethodSlot>>,
}

impl Application {
    /// Create an application with no methods.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or replace) a dispatch method.
    pub fn define<H>(&self, name: impl Into<String>, shape: CallShape, handler: H) -> &Self
    where
        H: Handler + 'static,
    {
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.into(),
                MethodSlot {
                    shape,
                    handler: Arc::new(handler),
                },
            );
        self
    }

    /// Get the registered call shape of a method.
    pub fn call_shape(&self, name: &str) -> Option<CallShape> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|slot| slot.shape)
    }

    /// Check if a method is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.call_shape(name).is_some()
    }

    /// Get all registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Invoke a dispatch method.
    ///
    /// The method table lock is released before the handler runs, so
    /// handlers and callbacks may re-enter the application.
    pub fn invoke(
        &self,
        name: &str,
        args: Args,
        callback: Option<Callback>,
    ) -> Result<Value, DispatchError> {
        let handler = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|slot| Arc::clone(&slot.handler))
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_string()))?;

        Ok(handler.call(args, callback))
    }

    /// Replace a method's handler with a decorated one implementing the same
    /// [`Handler`] interface.
    pub fn decorate<D>(&self, name: &str, decorator: D) -> Result<(), DispatchError>
    where
        D: FnOnce(CallShape, Arc<dyn Handler>) -> Arc<dyn Handler>,
    {
        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
        let slot = methods
            .get_mut(name)
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_string()))?;
        slot.handler = decorator(slot.shape, Arc::clone(&slot.handler));
        Ok(())
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("methods", &self.method_names())
            .finish()
    }
}
