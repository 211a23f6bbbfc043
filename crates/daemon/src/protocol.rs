// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol: length-prefixed JSON frames and request/response types

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use mx_core::DeliveryJob;

/// Maximum accepted frame payload size
pub const MAX_FRAME: usize = 4 * 1024 * 1024;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,

    #[error("Frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A request from a worker. `req` correlates the eventual response; requests
/// on one connection may complete in any order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub req: u64,
    /// Sending zone the command targets
    pub zone: String,
    #[serde(flatten)]
    pub command: Command,
}

/// Worker commands
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum Command {
    /// Claim the next eligible delivery
    Get,
    /// Confirm a checked-out delivery as done (accepted or bounced)
    Release {
        id: String,
        seq: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lock: Option<String>,
    },
    /// Push a checked-out delivery back for a later retry
    Defer {
        id: String,
        seq: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lock: Option<String>,
        /// Retry delay in seconds; accepts a JSON number or a numeric string
        #[serde(deserialize_with = "ttl_seconds")]
        ttl: u64,
    },
}

/// Responses, correlated by request id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// GET result; `None` when the zone has nothing eligible to hand out
    Delivery {
        req: u64,
        delivery: Option<DeliveryJob>,
    },
    /// RELEASE/DEFER confirmation carrying the composite `"<id>.<seq>"`
    Done { req: u64, delivery: String },
    Error { req: u64, error: String },
}

impl Response {
    /// Correlation id this response answers.
    pub fn req(&self) -> u64 {
        match self {
            Response::Delivery { req, .. }
            | Response::Done { req, .. }
            | Response::Error { req, .. } => *req,
        }
    }
}

/// Outcome of interpreting one inbound frame.
#[derive(Debug)]
pub enum InboundRequest {
    Request(Request),
    /// No `req` id: nothing to correlate a reply to, so the frame is ignored
    Unaddressed,
    /// Carries a `req` id but no usable command; answered with an explicit
    /// error response
    Malformed { req: u64, error: String },
}

/// Interpret an inbound frame as a request.
///
/// Only frames that are not valid JSON at all are a protocol error (the
/// stream is unusable at that point).
pub fn parse_request(data: &[u8]) -> Result<InboundRequest, ProtocolError> {
    let value: serde_json::Value = serde_json::from_slice(data)?;

    let Some(req) = value.get("req").and_then(serde_json::Value::as_u64) else {
        return Ok(InboundRequest::Unaddressed);
    };

    match serde_json::from_value::<Request>(value) {
        Ok(request) => Ok(InboundRequest::Request(request)),
        Err(err) => Ok(InboundRequest::Malformed {
            req,
            error: format!("unknown or malformed command: {err}"),
        }),
    }
}

/// Encode a message as JSON (no length prefix).
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

/// Decode a JSON message.
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(data)?)
}

/// Read one length-prefixed frame.
pub async fn read_message<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(eof_as_closed)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await.map_err(eof_as_closed)?;
    Ok(data)
}

/// Write one length-prefixed frame.
pub async fn write_message<W>(writer: &mut W, data: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge(data.len()));
    }
    // The MAX_FRAME check keeps the length within u32 range.
    let len = data.len() as u32;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

fn eof_as_closed(err: std::io::Error) -> ProtocolError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::ConnectionClosed
    } else {
        ProtocolError::Io(err)
    }
}

/// Accept `300` or `"300"`; anything else fails the request at the decode
/// boundary instead of silently becoming zero.
fn ttl_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(ttl) => Ok(ttl),
        Raw::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid ttl value {text:?}"))),
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
