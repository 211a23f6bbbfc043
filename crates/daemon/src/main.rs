// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mx queue daemon (mxd)
//!
//! Background process that terminates worker connections and coordinates
//! delivery claims with admission control.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use mx_adapters::{MemoryQueue, MemoryZone};
use mx_core::{AdmissionLocker, Config, SharedLocker, ZoneRegistry};
use mx_daemon::{lifecycle, server};

/// Default config path when none is given on the command line
const DEFAULT_CONFIG: &str = "mxd.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments: an optional config file path
    let args: Vec<String> = std::env::args().collect();
    let config_path: Option<PathBuf> = match args.get(1) {
        Some(path) => Some(PathBuf::from(path)),
        None if Path::new(DEFAULT_CONFIG).exists() => Some(PathBuf::from(DEFAULT_CONFIG)),
        None => None,
    };

    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // Set up logging
    let _log_guard = setup_logging(&config)?;

    info!("starting mxd");

    // Admission rules must compile before anything listens
    let rules = config.admission.compile()?;
    let locker = AdmissionLocker::shared(rules);

    // Wire the in-memory collaborators: one sending zone per configured
    // name, all sharing the locker, plus the queue store
    let mut zones = ZoneRegistry::new();
    for name in &config.zones {
        zones.register(Arc::new(MemoryZone::new(name.clone(), locker.clone())));
    }

    let state = match lifecycle::startup(&config, locker.clone(), zones).await {
        Ok(state) => state,
        Err(err) => {
            error!("failed to start daemon: {}", err);
            return Err(err.into());
        }
    };

    state.service.attach_queue(Arc::new(MemoryQueue::new()));

    // Set up signal handlers
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(addr = %config.server.addr(), "daemon ready");

    // Main loop: serve until a termination signal; SIGHUP reloads the
    // admission rules in place
    loop {
        tokio::select! {
            _ = server::serve(&state.listener, Arc::clone(&state.service)) => {
                break;
            }

            _ = sighup.recv() => {
                reload_rules(config_path.as_deref(), &locker);
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down...");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, shutting down...");
                break;
            }
        }
    }

    state.shutdown();
    info!("daemon stopped");
    Ok(())
}

/// Re-read the config file and swap in the recompiled admission rules.
///
/// Any failure keeps the active rules; a reload never takes the daemon down.
fn reload_rules(config_path: Option<&Path>, locker: &SharedLocker) {
    let Some(path) = config_path else {
        info!("no config file to reload");
        return;
    };

    let config = match Config::load(path) {
        Ok(config) => config,
        Err(err) => {
            error!("config reload failed, keeping active rules: {}", err);
            return;
        }
    };

    match config.admission.compile() {
        Ok(rules) => {
            locker
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .reload_rules(rules);
            info!(path = %path.display(), "admission rules reloaded");
        }
        Err(err) => {
            error!("invalid admission rules, keeping active rules: {}", err);
        }
    }
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(log_path) = &config.daemon.log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let file_name = log_path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "log_file has no file name")
    })?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(Some(guard))
}
