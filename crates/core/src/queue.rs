// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue backend collaborator trait

use async_trait::async_trait;

use crate::delivery::{DeliveryJob, DeliveryMeta};
use crate::error::CoordinationError;

/// Durable job/queue storage consumed by the coordination service.
///
/// Lookups distinguish "not found" (`Ok(None)`) from backend failure; the
/// service treats the two differently (metadata is required for a GET, an
/// unknown `(id, seq)` is terminal for a RELEASE/DEFER).
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Envelope metadata for a queued message.
    async fn get_meta(&self, id: &str) -> Result<Option<DeliveryMeta>, CoordinationError>;

    /// A specific delivery attempt by id and sequence.
    async fn get_delivery(
        &self,
        id: &str,
        seq: &str,
    ) -> Result<Option<DeliveryJob>, CoordinationError>;
}
