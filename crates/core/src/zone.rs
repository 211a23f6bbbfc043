// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sending zone collaborator trait and registry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::delivery::DeliveryJob;
use crate::error::CoordinationError;
use crate::id::WorkerId;

/// Destination selection and delivery lifecycle for one class of outbound
/// mail.
///
/// Implementations are expected to consult the admission locker internally:
/// `next_delivery` only hands out jobs whose destination is admissible and
/// reserves the slot; release/defer free it again.
#[async_trait]
pub trait SendingZone: Send + Sync {
    fn name(&self) -> &str;

    /// Next eligible delivery for `worker`, or `None` when the zone has
    /// nothing admissible to hand out right now.
    async fn next_delivery(
        &self,
        worker: WorkerId,
    ) -> Result<Option<DeliveryJob>, CoordinationError>;

    /// Mark a checked-out delivery done (accepted or bounced).
    async fn release_delivery(&self, delivery: DeliveryJob) -> Result<(), CoordinationError>;

    /// Push a checked-out delivery back for retry after `ttl_seconds`.
    async fn defer_delivery(
        &self,
        delivery: DeliveryJob,
        ttl_seconds: u64,
    ) -> Result<(), CoordinationError>;
}

/// Name-to-zone lookup used by the coordination service.
#[derive(Default)]
pub struct ZoneRegistry {
    zones: HashMap<String, Arc<dyn SendingZone>>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone under its own name, replacing any previous entry.
    pub fn register(&mut self, zone: Arc<dyn SendingZone>) {
        self.zones.insert(zone.name().to_string(), zone);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn SendingZone>> {
        self.zones.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.zones.keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod tests;
