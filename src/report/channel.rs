// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Topic-addressed publish channel for telemetry records.
//!
//! Emitting is fire-and-forget: a record is accepted by the channel and
//! delivered to whoever is subscribed at that moment, if anyone.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Default number of records a lagging subscriber may fall behind by.
pub const DEFAULT_CAPACITY: usize = 10240;

/// Process-wide channel used by probes that are not given one explicitly.
pub static GLOBAL_CHANNEL: Lazy<BroadcastChannel> =
    Lazy::new(|| BroadcastChannel::new(DEFAULT_CAPACITY));

/// Destination for telemetry records.
pub trait PublishChannel: Send + Sync {
    /// Publish `record` under `topic`. Never blocks and never fails.
    fn emit(&self, topic: &str, record: Value);
}

/// A record as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Published {
    pub topic: String,
    pub record: Value,
}

/// Publish channel backed by a tokio broadcast queue.
///
/// Safe for any number of concurrent emitters. Subscribers that fall more
/// than `capacity` records behind lose the oldest ones.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    sender: broadcast::Sender<Published>,
}

impl BroadcastChannel {
    /// Create a channel buffering up to `capacity` records per subscriber.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to all records emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PublishChannel for BroadcastChannel {
    fn emit(&self, topic: &str, record: Value) {
        // No subscribers is not an error: the record was accepted.
        let _ = self.sender.send(Published {
            topic: topic.to_string(),
            record,
        });
    }
}

/// Drain every record currently queued for `receiver`, skipping over gaps
/// left by lag.
pub fn drain(receiver: &mut broadcast::Receiver<Published>) -> Vec<Published> {
    let mut records = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(published) => records.push(published),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    records
}
