// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory queue store

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use mx_core::{CoordinationError, DeliveryJob, DeliveryMeta, QueueStore};

/// Queue store over in-memory maps: `(id, seq)` to delivery attempts and
/// message id to envelope metadata.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    deliveries: HashMap<(String, String), DeliveryJob>,
    meta: HashMap<String, DeliveryMeta>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a delivery attempt together with its message metadata.
    pub fn insert(&self, job: DeliveryJob, meta: DeliveryMeta) {
        let mut state = self.lock();
        state.meta.insert(job.id.clone(), meta);
        state
            .deliveries
            .insert((job.id.clone(), job.seq.clone()), job);
    }

    /// Drop a delivery attempt, returning it if present.
    pub fn remove(&self, id: &str, seq: &str) -> Option<DeliveryJob> {
        self.lock()
            .deliveries
            .remove(&(id.to_string(), seq.to_string()))
    }

    pub fn delivery_count(&self) -> usize {
        self.lock().deliveries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QueueStore for MemoryQueue {
    async fn get_meta(&self, id: &str) -> Result<Option<DeliveryMeta>, CoordinationError> {
        Ok(self.lock().meta.get(id).cloned())
    }

    async fn get_delivery(
        &self,
        id: &str,
        seq: &str,
    ) -> Result<Option<DeliveryJob>, CoordinationError> {
        Ok(self
            .lock()
            .deliveries
            .get(&(id.to_string(), seq.to_string()))
            .cloned())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
