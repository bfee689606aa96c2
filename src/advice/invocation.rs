// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The live view of one intercepted call, handed to before advice.

use std::fmt;

use serde_json::Value;

use crate::framework::{Args, CallShape, Callback};

type Completion = Box<dyn FnOnce() + Send + 'static>;

/// One call to an advised dispatch method.
///
/// Before advice may inspect the arguments and register exactly one kind of
/// completion advice: [`around_callback`](Self::around_callback) when a
/// trailing callback is present, [`after_return`](Self::after_return)
/// otherwise.
pub struct Invocation {
    method: String,
    shape: CallShape,
    args: Args,
    callback: Option<Callback>,
    after_return: Option<Completion>,
}

impl Invocation {
    pub(crate) fn new(
        method: impl Into<String>,
        shape: CallShape,
        args: Args,
        callback: Option<Callback>,
    ) -> Self {
        Self {
            method: method.into(),
            shape,
            args,
            callback,
            after_return: None,
        }
    }

    /// Name of the dispatch method being called.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Registered call shape of the method.
    pub fn shape(&self) -> CallShape {
        self.shape
    }

    /// Actual arguments of the call.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Whether completion of this call is signalled by a trailing callback.
    ///
    /// True only for methods registered as [`CallShape::Callback`] that were
    /// invoked with a callback. A callback-shaped method called without one
    /// completes synchronously.
    pub fn find_trailing_callback(&self) -> bool {
        self.shape.is_callback() && self.callback.is_some()
    }

    /// Run `advice` when the trailing callback fires, then forward the
    /// callback arguments unchanged to the original callback.
    ///
    /// Does nothing (and drops `advice`) if the call has no trailing callback;
    /// check [`find_trailing_callback`](Self::find_trailing_callback) first.
    pub fn around_callback<F>(&mut self, advice: F)
    where
        F: FnOnce(&[Value]) + Send + 'static,
    {
        if !self.shape.is_callback() {
            return;
        }
        if let Some(original) = self.callback.take() {
            self.callback = Some(Box::new(move |values: Args| {
                advice(&values);
                original(values);
            }));
        }
    }

    /// Run `advice` once the wrapped method returns control.
    ///
    /// Registering twice chains both in registration order.
    pub fn after_return<F>(&mut self, advice: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.after_return = Some(match self.after_return.take() {
            Some(previous) => Box::new(move || {
                previous();
                advice();
            }),
            None => Box::new(advice),
        });
    }

    pub(crate) fn into_parts(self) -> (Args, Option<Callback>, Option<Completion>) {
        (self.args, self.callback, self.after_return)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method)
            .field("shape", &self.shape)
            .field("args", &self.args)
            .field("has_callback", &self.callback.is_some())
            .field("has_after_return", &self.after_return.is_some())
            .finish()
    }
}
