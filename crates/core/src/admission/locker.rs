// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reservation counters limiting concurrent deliveries per destination

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::rules::DestinationRules;
use crate::id::WorkerId;

/// Locker handle shared between the coordination service and zone
/// collaborators. All mutation and the admissibility sum happen under this
/// one mutex, so purge/reserve/release are serialized and rule reloads are
/// observed as a single consistent snapshot.
pub type SharedLocker = Arc<Mutex<AdmissionLocker>>;

/// Per-worker, per-destination reservation counters with an all-workers
/// admissibility check.
///
/// Counters do not expire on their own; [`AdmissionLocker::purge_worker`] on
/// worker disconnect is the only cleanup.
#[derive(Debug)]
pub struct AdmissionLocker {
    /// worker -> destination key -> active reservation count (always >= 1)
    counters: HashMap<WorkerId, HashMap<String, u32>>,
    rules: DestinationRules,
}

impl AdmissionLocker {
    pub fn new(rules: DestinationRules) -> Self {
        Self {
            counters: HashMap::new(),
            rules,
        }
    }

    /// Wrap a fresh locker in the shared handle used across connections.
    pub fn shared(rules: DestinationRules) -> SharedLocker {
        Arc::new(Mutex::new(Self::new(rules)))
    }

    /// Record one more outbound attempt by `worker` against `key`.
    ///
    /// Always succeeds; an unknown worker gets a counter table on first use.
    pub fn reserve(&mut self, worker: WorkerId, key: &str) {
        let counters = self.counters.entry(worker).or_default();
        *counters.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Drop one reservation for `(worker, key)`.
    ///
    /// Entries never persist at zero. Releasing a pair that holds no
    /// reservation is a no-op, so extra release calls are harmless.
    pub fn release(&mut self, worker: WorkerId, key: &str) {
        let Some(counters) = self.counters.get_mut(&worker) else {
            return;
        };
        let Some(count) = counters.get_mut(key) else {
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            counters.remove(key);
        }
    }

    /// Remove every reservation held by `worker` in one step.
    ///
    /// Called when the worker's connection terminates, regardless of cause.
    /// Idempotent.
    pub fn purge_worker(&mut self, worker: WorkerId) {
        if let Some(counters) = self.counters.remove(&worker) {
            if !counters.is_empty() {
                debug!(%worker, keys = counters.len(), "purged reservations of disconnected worker");
            }
        }
    }

    /// Sum of reservations for `key` across all workers.
    pub fn reservations(&self, key: &str) -> u32 {
        self.counters
            .values()
            .filter_map(|counters| counters.get(key))
            .sum()
    }

    /// Whether a new attempt at `key` is allowed under the rule matched by
    /// `hint`.
    ///
    /// Point-in-time check, not a reservation: a caller acting on `true`
    /// must [`AdmissionLocker::reserve`] while still holding the shared
    /// guard, or accept that a concurrent caller may also observe
    /// admissibility and overshoot the limit transiently.
    pub fn is_admissible(&self, key: &str, hint: &str) -> bool {
        let limits = self.rules.resolve(hint);
        self.reservations(key) < limits.max_connections
    }

    /// Replace the active rule set.
    pub fn reload_rules(&mut self, rules: DestinationRules) {
        self.rules = rules;
    }
}

#[cfg(test)]
#[path = "locker_tests.rs"]
mod tests;
