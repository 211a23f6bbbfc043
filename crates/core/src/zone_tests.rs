// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

struct IdleZone {
    name: String,
}

#[async_trait]
impl SendingZone for IdleZone {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_delivery(
        &self,
        _worker: WorkerId,
    ) -> Result<Option<DeliveryJob>, CoordinationError> {
        Ok(None)
    }

    async fn release_delivery(&self, _delivery: DeliveryJob) -> Result<(), CoordinationError> {
        Ok(())
    }

    async fn defer_delivery(
        &self,
        _delivery: DeliveryJob,
        _ttl_seconds: u64,
    ) -> Result<(), CoordinationError> {
        Ok(())
    }
}

#[test]
fn registry_resolves_registered_zones() {
    let mut registry = ZoneRegistry::new();
    registry.register(Arc::new(IdleZone {
        name: "default".to_string(),
    }));

    assert!(registry.resolve("default").is_some());
    assert!(registry.resolve("bounces").is_none());
}

#[test]
fn register_replaces_previous_zone_with_same_name() {
    let mut registry = ZoneRegistry::new();
    registry.register(Arc::new(IdleZone {
        name: "default".to_string(),
    }));
    registry.register(Arc::new(IdleZone {
        name: "default".to_string(),
    }));

    assert_eq!(registry.names(), vec!["default".to_string()]);
}
