// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination service: connection handling and request dispatch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use mx_core::{
    CoordinationError, DeliveryJob, QueueStore, SendingZone, SharedLocker, WorkerId, WorkerIdGen,
    ZoneRegistry,
};

use crate::protocol::{self, Command, InboundRequest, ProtocolError, Request, Response};

/// Shared state of the coordination service.
///
/// The service accepts connections as soon as it is listening; every request
/// fails with "Service not yet started" until a queue backend is attached.
pub struct CoordinationService {
    locker: SharedLocker,
    zones: ZoneRegistry,
    queue: Mutex<Option<Arc<dyn QueueStore>>>,
    worker_ids: WorkerIdGen,
    closing: AtomicBool,
}

impl CoordinationService {
    pub fn new(locker: SharedLocker, zones: ZoneRegistry) -> Self {
        Self {
            locker,
            zones,
            queue: Mutex::new(None),
            worker_ids: WorkerIdGen::new(),
            closing: AtomicBool::new(false),
        }
    }

    /// Attach the queue backend, making the service ready.
    pub fn attach_queue(&self, queue: Arc<dyn QueueStore>) {
        *self.queue.lock().unwrap_or_else(|e| e.into_inner()) = Some(queue);
    }

    /// Mark the service as closing; the accept loop stops on its next pass.
    pub fn begin_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    fn queue(&self) -> Option<Arc<dyn QueueStore>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Handle one worker connection until it closes.
    ///
    /// Each request runs as its own task, so responses complete out of order
    /// and are correlated purely by their `req` id. Whatever ends the
    /// connection, in-flight requests are drained before the worker's
    /// reservations are purged - a late reservation can never land after the
    /// purge.
    pub async fn handle_connection(self: Arc<Self>, stream: TcpStream) {
        let worker = self.worker_ids.issue();
        debug!(%worker, peer = ?stream.peer_addr().ok(), "worker connected");

        let (mut reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel::<Response>(64);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut inflight = JoinSet::new();
        loop {
            let frame = match protocol::read_message(&mut reader).await {
                Ok(frame) => frame,
                Err(ProtocolError::ConnectionClosed) => break,
                Err(err) => {
                    debug!(%worker, %err, "read failed, dropping connection");
                    break;
                }
            };

            match protocol::parse_request(&frame) {
                Ok(InboundRequest::Request(request)) => {
                    let service = Arc::clone(&self);
                    let tx = tx.clone();
                    inflight.spawn(async move {
                        let response = service.handle_request(worker, request).await;
                        let _ = tx.send(response).await;
                    });
                }
                Ok(InboundRequest::Unaddressed) => {
                    // Nothing to correlate a reply to
                }
                Ok(InboundRequest::Malformed { req, error }) => {
                    let _ = tx.send(Response::Error { req, error }).await;
                }
                Err(err) => {
                    debug!(%worker, %err, "unreadable frame, dropping connection");
                    break;
                }
            }
        }

        while inflight.join_next().await.is_some() {}

        self.locker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .purge_worker(worker);

        drop(tx);
        let _ = writer_task.await;
        debug!(%worker, "worker disconnected");
    }

    /// Dispatch one request, translating every failure into an error
    /// response correlated to the request id.
    pub async fn handle_request(&self, worker: WorkerId, request: Request) -> Response {
        let req = request.req;

        let Some(queue) = self.queue() else {
            return Response::Error {
                req,
                error: CoordinationError::ServiceNotReady.to_string(),
            };
        };

        let Some(zone) = self.zones.resolve(&request.zone) else {
            return Response::Error {
                req,
                error: CoordinationError::ZoneNotFound { zone: request.zone }.to_string(),
            };
        };

        match request.command {
            Command::Get => match self.find_next(queue, zone, worker).await {
                Ok(delivery) => Response::Delivery { req, delivery },
                Err(err) => Response::Error {
                    req,
                    error: err.to_string(),
                },
            },
            Command::Release { id, seq, lock } => {
                match self.release(queue, zone, &id, &seq, lock).await {
                    Ok(delivery) => Response::Done { req, delivery },
                    Err(err) => Response::Error {
                        req,
                        error: err.to_string(),
                    },
                }
            }
            Command::Defer {
                id,
                seq,
                lock,
                ttl,
            } => match self.defer(queue, zone, &id, &seq, lock, ttl).await {
                Ok(delivery) => Response::Done { req, delivery },
                Err(err) => Response::Error {
                    req,
                    error: err.to_string(),
                },
            },
        }
    }

    /// Find and check out the next delivery for `worker`, enriched with
    /// persisted metadata.
    async fn find_next(
        &self,
        queue: Arc<dyn QueueStore>,
        zone: Arc<dyn SendingZone>,
        worker: WorkerId,
    ) -> Result<Option<DeliveryJob>, CoordinationError> {
        let Some(mut delivery) = zone.next_delivery(worker).await? else {
            // Normal empty-queue condition, not an error
            return Ok(None);
        };

        // Metadata is required: a claim without its envelope is undeliverable
        let meta = queue.get_meta(&delivery.id).await?.ok_or_else(|| {
            CoordinationError::backend(format!("no metadata for message {}", delivery.id))
        })?;
        delivery.merge_meta(meta);

        Ok(Some(delivery))
    }

    /// Mark a checked-out delivery as done.
    ///
    /// The lock token is attached as supplied; whether it matches the
    /// original claim is the zone's call.
    async fn release(
        &self,
        queue: Arc<dyn QueueStore>,
        zone: Arc<dyn SendingZone>,
        id: &str,
        seq: &str,
        lock: Option<String>,
    ) -> Result<String, CoordinationError> {
        let mut delivery = self.lookup(queue, id, seq).await?;

        delivery.lock_token = lock;
        let done = delivery.composite_id();
        zone.release_delivery(delivery).await?;
        Ok(done)
    }

    /// Mark a checked-out delivery as deferred for `ttl` seconds.
    async fn defer(
        &self,
        queue: Arc<dyn QueueStore>,
        zone: Arc<dyn SendingZone>,
        id: &str,
        seq: &str,
        lock: Option<String>,
        ttl: u64,
    ) -> Result<String, CoordinationError> {
        let mut delivery = self.lookup(queue, id, seq).await?;

        delivery.lock_token = lock;
        let done = delivery.composite_id();
        zone.defer_delivery(delivery, ttl).await?;
        Ok(done)
    }

    async fn lookup(
        &self,
        queue: Arc<dyn QueueStore>,
        id: &str,
        seq: &str,
    ) -> Result<DeliveryJob, CoordinationError> {
        queue
            .get_delivery(id, seq)
            .await?
            .ok_or_else(|| CoordinationError::JobNotFound {
                id: id.to_string(),
                seq: seq.to_string(),
            })
    }
}

/// Writer half of a connection: responses from concurrently completing
/// requests are serialized onto the socket in completion order.
async fn write_responses(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Response>) {
    while let Some(response) = rx.recv().await {
        let frame = match protocol::encode(&response) {
            Ok(frame) => frame,
            Err(err) => {
                error!(%err, "failed to encode response");
                continue;
            }
        };
        if let Err(err) = protocol::write_message(&mut writer, &frame).await {
            debug!(%err, "write failed, closing connection");
            break;
        }
    }
}

/// Accept worker connections until the service is marked closing.
///
/// Accept errors after a successful start are logged and the loop keeps
/// serving; availability wins over crashing.
pub async fn serve(listener: &TcpListener, service: Arc<CoordinationService>) {
    loop {
        if service.is_closing() {
            info!("service closing, no longer accepting connections");
            return;
        }
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::spawn(Arc::clone(&service).handle_connection(stream));
            }
            Err(err) => {
                error!(%err, "failed to accept connection");
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
