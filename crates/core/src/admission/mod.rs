// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission control bounding simultaneous deliveries per destination
//!
//! This module provides:
//! - **AdmissionLocker** - per-worker reservation counters with an
//!   all-workers sum check against the matched rule's limit
//! - **DestinationRules** - ordered pattern-to-limit resolution with
//!   whole-value replacement on reload

pub mod locker;
pub mod rules;

pub use locker::{AdmissionLocker, SharedLocker};
pub use rules::{DestinationRules, RuleEntry, RuleError, RuleLimits};
