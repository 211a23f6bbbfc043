// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup and shutdown

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use mx_core::{Config, SharedLocker, ZoneRegistry};

use crate::server::CoordinationService;

/// Daemon state during operation
pub struct DaemonState {
    /// TCP listener for worker connections
    pub listener: TcpListener,
    pub service: Arc<CoordinationService>,
    // NOTE(lifetime): Held to maintain exclusive pid-file lock; released on drop
    #[allow(dead_code)]
    lock_file: Option<File>,
    pid_path: Option<PathBuf>,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire pid lock {0}: daemon already running?")]
    LockFailed(PathBuf, #[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, #[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon: acquire the pid lock, then bind the listener.
///
/// A bind failure is surfaced to the caller and nothing has been accepted at
/// that point; errors after a successful start are the accept loop's problem
/// and never propagate (see [`crate::server::serve`]).
pub async fn startup(
    config: &Config,
    locker: SharedLocker,
    zones: ZoneRegistry,
) -> Result<DaemonState, LifecycleError> {
    let lock_file = match &config.daemon.pid_file {
        Some(path) => Some(acquire_pid_lock(path)?),
        None => None,
    };

    let addr = config.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(addr.clone(), e))?;

    let service = Arc::new(CoordinationService::new(locker, zones));

    info!(%addr, "coordination service listening");

    Ok(DaemonState {
        listener,
        service,
        lock_file,
        pid_path: config.daemon.pid_file.clone(),
    })
}

impl DaemonState {
    /// Shut down: stop accepting, drop the listener, remove the pid file.
    ///
    /// Connection tasks already running finish their in-flight requests on
    /// their own; the pid lock is released when the state drops.
    pub fn shutdown(self) {
        info!("shutting down daemon");
        self.service.begin_close();
        drop(self.listener);

        if let Some(path) = &self.pid_path {
            if path.exists() {
                if let Err(err) = std::fs::remove_file(path) {
                    warn!(%err, path = %path.display(), "failed to remove pid file");
                }
            }
        }

        info!("daemon shutdown complete");
    }
}

fn acquire_pid_lock(path: &Path) -> Result<File, LifecycleError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    // Called through the trait: std has since grown an inherent method with
    // the same name and a different error type.
    FileExt::try_lock_exclusive(&file)
        .map_err(|e| LifecycleError::LockFailed(path.to_path_buf(), e))?;

    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
