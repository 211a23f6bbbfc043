// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mx-adapters: In-memory collaborator implementations for the mx
//! coordinator
//!
//! These back the standalone `mxd` binary and double as the test
//! collaborators for the daemon and workspace specs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod memory;

pub use memory::{MemoryQueue, MemoryZone};
