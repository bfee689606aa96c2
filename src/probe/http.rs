// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Probe for the HTTP routing framework.

use super::ProbeBuilder;

/// Identifier the HTTP framework module is loaded under.
pub const FRAMEWORK_NAME: &str = "express";

/// HTTP verbs and routing methods exposed by the framework's application.
pub const HTTP_DISPATCH_METHODS: &[&str] = &[
    "checkout",
    "copy",
    "delete",
    "get",
    "head",
    "lock",
    "merge",
    "mkactivity",
    "mkcol",
    "move",
    "m-search",
    "notify",
    "options",
    "patch",
    "post",
    "purge",
    "put",
    "report",
    "search",
    "subscribe",
    "trace",
    "unlock",
    "unsubscribe",
];

/// Builder for a probe intercepting every HTTP dispatch method, publishing
/// metrics under the framework name.
pub fn http_probe() -> ProbeBuilder {
    ProbeBuilder::new(FRAMEWORK_NAME).methods(HTTP_DISPATCH_METHODS.iter().copied())
}
