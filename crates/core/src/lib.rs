// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mx-core: Core library for the mx outbound delivery coordinator
//!
//! This crate provides:
//! - Admission control bounding concurrent deliveries per destination
//! - Delivery job and envelope metadata types shared across the wire
//! - Collaborator traits for sending zones and the queue backend
//! - TOML configuration loading and the error taxonomy

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod admission;
pub mod config;
pub mod delivery;
pub mod error;
pub mod id;
pub mod queue;
pub mod zone;

// Re-exports
pub use admission::locker::{AdmissionLocker, SharedLocker};
pub use admission::rules::{DestinationRules, RuleEntry, RuleError, RuleLimits};
pub use config::{AdmissionConfig, Config, ConfigError, DaemonConfig, ServerConfig};
pub use delivery::{DeliveryJob, DeliveryMeta};
pub use error::CoordinationError;
pub use id::{WorkerId, WorkerIdGen};
pub use queue::QueueStore;
pub use zone::{SendingZone, ZoneRegistry};
