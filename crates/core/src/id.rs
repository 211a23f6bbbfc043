// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker session identity

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Opaque identity of one connected worker process.
///
/// Issued when a connection is accepted and invalidated on disconnect. Ids
/// are never reused within a daemon process, so a stale handle for a purged
/// worker can never resurrect its reservations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Monotonic issuer of worker session ids.
#[derive(Debug, Default)]
pub struct WorkerIdGen {
    next: AtomicU64,
}

impl WorkerIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next session id.
    pub fn issue(&self) -> WorkerId {
        WorkerId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
