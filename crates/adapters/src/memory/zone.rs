// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory sending zone with admission-aware selection

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use mx_core::{CoordinationError, DeliveryJob, SendingZone, SharedLocker, WorkerId};

/// A sending zone backed by an in-memory FIFO of pending deliveries.
///
/// Selection consults the shared admission locker: jobs whose destination is
/// at its connection limit are skipped, and the admissibility check plus the
/// reservation happen under one locker guard, so concurrent claims cannot
/// overshoot the limit. Claims are tracked by uuid lock token until released
/// or deferred.
pub struct MemoryZone {
    name: String,
    locker: SharedLocker,
    inner: Mutex<ZoneState>,
}

#[derive(Default)]
struct ZoneState {
    pending: VecDeque<PendingDelivery>,
    claims: HashMap<String, Claim>,
}

struct PendingDelivery {
    job: DeliveryJob,
    /// Set for deferred jobs; invisible to selection until due
    not_before: Option<DateTime<Utc>>,
}

struct Claim {
    worker: WorkerId,
    destination: String,
}

impl MemoryZone {
    pub fn new(name: impl Into<String>, locker: SharedLocker) -> Self {
        Self {
            name: name.into(),
            locker,
            inner: Mutex::new(ZoneState::default()),
        }
    }

    /// Queue a job for delivery.
    pub fn enqueue(&self, job: DeliveryJob) {
        self.lock_state().pending.push_back(PendingDelivery {
            job,
            not_before: None,
        });
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    pub fn claimed_count(&self) -> usize {
        self.lock_state().claims.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ZoneState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Retire a claim and free its admission reservation.
    fn retire_claim(
        &self,
        state: &mut ZoneState,
        delivery: &DeliveryJob,
    ) -> Result<(), CoordinationError> {
        let token = delivery
            .lock_token
            .as_deref()
            .ok_or_else(|| CoordinationError::backend("delivery is not locked"))?;
        let claim = state
            .claims
            .remove(token)
            .ok_or_else(|| CoordinationError::backend(format!("unknown delivery lock {token}")))?;

        self.locker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .release(claim.worker, &claim.destination);

        Ok(())
    }
}

#[async_trait]
impl SendingZone for MemoryZone {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_delivery(
        &self,
        worker: WorkerId,
    ) -> Result<Option<DeliveryJob>, CoordinationError> {
        let now = Utc::now();
        let mut state = self.lock_state();
        let mut locker = self.locker.lock().unwrap_or_else(|e| e.into_inner());

        let eligible = state.pending.iter().position(|pending| {
            pending.not_before.is_none_or(|due| due <= now)
                && locker.is_admissible(&pending.job.destination, &pending.job.destination)
        });
        let Some(index) = eligible else {
            return Ok(None);
        };
        let Some(pending) = state.pending.remove(index) else {
            return Ok(None);
        };
        let mut job = pending.job;

        locker.reserve(worker, &job.destination);

        let token = Uuid::new_v4().to_string();
        state.claims.insert(
            token.clone(),
            Claim {
                worker,
                destination: job.destination.clone(),
            },
        );
        job.lock_token = Some(token);

        debug!(zone = %self.name, %worker, id = %job.id, seq = %job.seq, "delivery checked out");
        Ok(Some(job))
    }

    async fn release_delivery(&self, delivery: DeliveryJob) -> Result<(), CoordinationError> {
        let mut state = self.lock_state();
        self.retire_claim(&mut state, &delivery)?;

        debug!(zone = %self.name, id = %delivery.id, seq = %delivery.seq, "delivery released");
        Ok(())
    }

    async fn defer_delivery(
        &self,
        mut delivery: DeliveryJob,
        ttl_seconds: u64,
    ) -> Result<(), CoordinationError> {
        let mut state = self.lock_state();
        self.retire_claim(&mut state, &delivery)?;

        let due = i64::try_from(ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        delivery.lock_token = None;
        delivery.attempts += 1;
        debug!(
            zone = %self.name,
            id = %delivery.id,
            seq = %delivery.seq,
            ttl_seconds,
            "delivery deferred"
        );
        state.pending.push_back(PendingDelivery {
            job: delivery,
            not_before: Some(due),
        });

        Ok(())
    }
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod tests;
