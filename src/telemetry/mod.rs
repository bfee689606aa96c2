// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging setup and correlation ids.
//!
//! The probe itself only emits `tracing` events and spans; installing a
//! subscriber is left to the host. [`init_telemetry`] is the subscriber the
//! bundled binary uses:
//!
//! ```rust,ignore
//! use routeprobe::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::default())?;
//! ```
//!
//! Log levels used across the crate:
//!
//! 1. **trace** for targets a probe ignores and per-call dispatch
//! 2. **debug** for skipped attaches and completed calls
//! 3. **info** for successful attaches and closed request spans
//! 4. **warn** for caller errors such as a double timer stop

mod correlation;
mod init;

pub use correlation::{CorrelationId, CorrelationIdExt};
pub use init::{init_telemetry, LogFormat, TelemetryConfig, TelemetryGuard};
