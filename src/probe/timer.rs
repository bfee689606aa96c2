// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stopwatch for one intercepted call.

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::error::ProbeError;

/// Wall-clock start instant plus monotonic elapsed time.
///
/// The start instant is reported in epoch milliseconds; the duration is
/// measured on the monotonic clock so it is never negative.
#[derive(Debug)]
pub struct Timer {
    start_time_millis: i64,
    started: Instant,
    time_delta: Option<Duration>,
}

impl Timer {
    /// Start a new timer now.
    pub fn start() -> Self {
        Self {
            start_time_millis: Utc::now().timestamp_millis(),
            started: Instant::now(),
            time_delta: None,
        }
    }

    /// Wall-clock start, in milliseconds since the Unix epoch.
    pub fn start_time_millis(&self) -> i64 {
        self.start_time_millis
    }

    /// Monotonic start instant.
    pub fn started_at(&self) -> Instant {
        self.started
    }

    /// Stop the timer and return the elapsed milliseconds.
    ///
    /// Only one completion path may stop a timer; stopping it again is an error.
    pub fn stop(&mut self) -> Result<f64, ProbeError> {
        if self.time_delta.is_some() {
            return Err(ProbeError::TimerAlreadyStopped);
        }
        let elapsed = self.started.elapsed();
        self.time_delta = Some(elapsed);
        Ok(duration_millis(elapsed))
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.time_delta.is_some()
    }

    /// Elapsed milliseconds, available once stopped.
    pub fn time_delta_millis(&self) -> Option<f64> {
        self.time_delta.map(duration_millis)
    }

    /// Elapsed time so far (or total, once stopped).
    pub fn elapsed(&self) -> Duration {
        self.time_delta.unwrap_or_else(|| self.started.elapsed())
    }
}

pub(crate) fn duration_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
