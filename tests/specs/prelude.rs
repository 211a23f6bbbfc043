//! Shared fixtures for workspace specs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mx_adapters::{MemoryQueue, MemoryZone};
use mx_client::QueueClient;
use mx_core::{
    AdmissionLocker, Config, DeliveryJob, DeliveryMeta, DestinationRules, RuleLimits,
    SharedLocker, ZoneRegistry,
};
use mx_daemon::server::CoordinationService;
use mx_daemon::{lifecycle, server};

/// A running daemon on an ephemeral port with in-memory collaborators.
pub struct TestDaemon {
    pub addr: SocketAddr,
    pub service: Arc<CoordinationService>,
    pub queue: Arc<MemoryQueue>,
    pub zone: Arc<MemoryZone>,
    pub locker: SharedLocker,
    serve_task: tokio::task::JoinHandle<()>,
}

impl TestDaemon {
    /// Start with the queue attached and a default per-destination limit.
    pub async fn start() -> Self {
        Self::build(5, true).await
    }

    pub async fn start_with_limit(max_connections: u32) -> Self {
        Self::build(max_connections, true).await
    }

    /// Start listening without a queue backend attached.
    pub async fn start_unattached() -> Self {
        Self::build(5, false).await
    }

    async fn build(max_connections: u32, attach: bool) -> Self {
        let locker = AdmissionLocker::shared(DestinationRules::with_default(RuleLimits {
            max_connections,
        }));
        let zone = Arc::new(MemoryZone::new("default", locker.clone()));

        let mut zones = ZoneRegistry::new();
        zones.register(zone.clone());

        let mut config = Config::default();
        config.server.port = 0;

        let state = lifecycle::startup(&config, locker.clone(), zones)
            .await
            .expect("daemon startup");
        let addr = state.listener.local_addr().expect("listener addr");

        let queue = Arc::new(MemoryQueue::new());
        if attach {
            state.service.attach_queue(queue.clone());
        }

        let service = Arc::clone(&state.service);
        let serve_task = tokio::spawn(async move {
            server::serve(&state.listener, Arc::clone(&state.service)).await;
        });

        Self {
            addr,
            service,
            queue,
            zone,
            locker,
            serve_task,
        }
    }

    /// Seed one job into both the zone FIFO and the queue store.
    pub fn seed(&self, id: &str, destination: &str) {
        let job = DeliveryJob::new(id, "1", "default", destination, "user@example.com");
        self.queue.insert(
            job.clone(),
            DeliveryMeta {
                sender: Some("sender@example.com".to_string()),
                ..DeliveryMeta::default()
            },
        );
        self.zone.enqueue(job);
    }

    pub async fn connect(&self) -> QueueClient {
        QueueClient::connect(self.addr).await.expect("connect")
    }

    pub fn reservations(&self, key: &str) -> u32 {
        self.locker.lock().unwrap().reservations(key)
    }

    /// Wait until the reservation count for `key` drops to `expected`.
    pub async fn wait_for_reservations(&self, key: &str, expected: u32) {
        for _ in 0..100 {
            if self.reservations(key) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "reservations for {} never reached {} (still {})",
            key,
            expected,
            self.reservations(key)
        );
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        self.serve_task.abort();
    }
}
