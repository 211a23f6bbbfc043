// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Delivery jobs and persisted envelope metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A delivery attempt handed out to a worker, identified by `(id, seq)`.
///
/// While claimed, the job is checked out of its zone; it returns to
/// availability only through an acknowledged release or deferral, or through
/// the zone's own cleanup when the owning worker disappears.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub id: String,
    pub seq: String,
    /// Sending zone this delivery belongs to
    pub zone: String,
    /// Admission-control key, e.g. the resolved mail exchange host
    pub destination: String,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Client address the message was accepted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Interface the message entered through, e.g. "feeder" or "bounce"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_size: Option<u64>,
    /// Delivery attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// Claim token issued by the zone when the job was checked out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_token: Option<String>,
}

impl DeliveryJob {
    pub fn new(
        id: impl Into<String>,
        seq: impl Into<String>,
        zone: impl Into<String>,
        destination: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
            zone: zone.into(),
            destination: destination.into(),
            recipient: recipient.into(),
            sender: None,
            origin: None,
            interface: None,
            created: None,
            message_size: None,
            attempts: 0,
            lock_token: None,
        }
    }

    /// `"<id>.<seq>"` - the identifier confirmed back to workers after a
    /// release or deferral.
    pub fn composite_id(&self) -> String {
        format!("{}.{}", self.id, self.seq)
    }

    /// Fill in persisted envelope metadata.
    ///
    /// Fields already present on the job win; metadata never overwrites them.
    pub fn merge_meta(&mut self, meta: DeliveryMeta) {
        if self.sender.is_none() {
            self.sender = meta.sender;
        }
        if self.origin.is_none() {
            self.origin = meta.origin;
        }
        if self.interface.is_none() {
            self.interface = meta.interface;
        }
        if self.created.is_none() {
            self.created = meta.created;
        }
        if self.message_size.is_none() {
            self.message_size = meta.message_size;
        }
    }
}

/// Envelope metadata persisted by the queue backend, keyed by message id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_size: Option<u64>,
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
