// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the coordination service and its collaborators

use thiserror::Error;

/// Business errors surfaced to workers as per-request error responses.
///
/// None of these abort a connection or the service; they are translated into
/// an error reply correlated to the failing request.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// The service is accepting connections but no queue backend has been
    /// attached yet
    #[error("Service not yet started")]
    ServiceNotReady,

    #[error("Selected Sending Zone does not exist")]
    ZoneNotFound { zone: String },

    /// RELEASE/DEFER referenced an unknown (id, seq); terminal for the
    /// request, the worker must re-derive the job reference
    #[error("Delivery not found")]
    JobNotFound { id: String, seq: String },

    /// Opaque failure from a zone or queue collaborator
    #[error("{0}")]
    Backend(String),
}

impl CoordinationError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
