// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mx-client: Worker-side client for the mx coordination service
//!
//! A worker holds one [`QueueClient`] for the lifetime of its connection and
//! issues GET/RELEASE/DEFER requests through it. Requests are multiplexed:
//! each send registers a oneshot keyed by its request id and a background
//! reader resolves them as responses arrive, in whatever order the service
//! finishes them. Dropping the client closes the connection, which is what
//! releases the worker's admission reservations on the daemon side.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::debug;

use mx_core::DeliveryJob;
use mx_daemon::protocol::{self, Command, ProtocolError, Request, Response};

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for one request/response round trip
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("MX_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Response>>>>;

/// Client for one persistent worker connection.
pub struct QueueClient {
    writer: AsyncMutex<OwnedWriteHalf>,
    pending: PendingMap,
    next_req: AtomicU64,
    reader_task: JoinHandle<()>,
}

impl QueueClient {
    /// Connect to the coordination service.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_task = tokio::spawn(read_responses(reader, Arc::clone(&pending)));

        Ok(Self {
            writer: AsyncMutex::new(writer),
            pending,
            next_req: AtomicU64::new(1),
            reader_task,
        })
    }

    /// Claim the next eligible delivery from `zone`.
    ///
    /// `Ok(None)` is the normal empty-queue outcome, not an error.
    pub async fn next_delivery(&self, zone: &str) -> Result<Option<DeliveryJob>, ClientError> {
        match self.send(zone, Command::Get).await? {
            Response::Delivery { delivery, .. } => Ok(delivery),
            Response::Error { error, .. } => Err(ClientError::Rejected(error)),
            Response::Done { .. } => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Confirm a delivery as done; returns the composite `"<id>.<seq>"`.
    pub async fn release(
        &self,
        zone: &str,
        id: &str,
        seq: &str,
        lock: Option<String>,
    ) -> Result<String, ClientError> {
        let command = Command::Release {
            id: id.to_string(),
            seq: seq.to_string(),
            lock,
        };
        match self.send(zone, command).await? {
            Response::Done { delivery, .. } => Ok(delivery),
            Response::Error { error, .. } => Err(ClientError::Rejected(error)),
            Response::Delivery { .. } => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Defer a delivery for `ttl` seconds; returns the composite id.
    pub async fn defer(
        &self,
        zone: &str,
        id: &str,
        seq: &str,
        lock: Option<String>,
        ttl: u64,
    ) -> Result<String, ClientError> {
        let command = Command::Defer {
            id: id.to_string(),
            seq: seq.to_string(),
            lock,
            ttl,
        };
        match self.send(zone, command).await? {
            Response::Done { delivery, .. } => Ok(delivery),
            Response::Error { error, .. } => Err(ClientError::Rejected(error)),
            Response::Delivery { .. } => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Send one request and await its correlated response.
    async fn send(&self, zone: &str, command: Command) -> Result<Response, ClientError> {
        if self.reader_task.is_finished() {
            return Err(ClientError::ConnectionClosed);
        }

        let req = self.next_req.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            req,
            zone: zone.to_string(),
            command,
        };

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(req, tx);

        let frame = protocol::encode(&request)?;
        {
            let mut writer = self.writer.lock().await;
            if let Err(err) = protocol::write_message(&mut *writer, &frame).await {
                self.forget(req);
                return Err(err.into());
            }
        }

        match tokio::time::timeout(timeout_ipc(), rx).await {
            Ok(Ok(response)) => Ok(response),
            // The reader dropped our sender: connection is gone
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.forget(req);
                Err(ClientError::Timeout)
            }
        }
    }

    fn forget(&self, req: u64) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&req);
    }
}

impl Drop for QueueClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Resolve pending requests as responses arrive.
async fn read_responses(mut reader: OwnedReadHalf, pending: PendingMap) {
    loop {
        let frame = match protocol::read_message(&mut reader).await {
            Ok(frame) => frame,
            Err(_) => break,
        };

        let response: Response = match protocol::decode(&frame) {
            Ok(response) => response,
            Err(err) => {
                debug!(%err, "undecodable response frame");
                continue;
            }
        };

        let sender = pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&response.req());
        match sender {
            Some(sender) => {
                let _ = sender.send(response);
            }
            None => debug!(req = response.req(), "response with no pending request"),
        }
    }

    // Connection gone: fail everything still pending
    pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
