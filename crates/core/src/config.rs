// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration loaded from a TOML file

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::admission::rules::{DestinationRules, RuleEntry, RuleError, RuleLimits};

/// Top-level configuration. Every section has defaults, so an empty file is
/// a valid configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Sending zones the daemon serves
    #[serde(default = "default_zones")]
    pub zones: Vec<String>,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admission: AdmissionConfig::default(),
            zones: default_zones(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn default_zones() -> Vec<String> {
    vec!["default".to_string()]
}

/// Listen address of the coordination service.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    12344
}

/// Admission control section: default limits plus ordered rules.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AdmissionConfig {
    /// Limits applied when no rule matches
    #[serde(default)]
    pub default: RuleLimits,
    /// Ordered destination rules; first match wins
    #[serde(default)]
    pub limits: Vec<RuleEntry>,
}

impl AdmissionConfig {
    /// Compile the section into an active rule set.
    pub fn compile(&self) -> Result<DestinationRules, RuleError> {
        DestinationRules::compile(self.default.clone(), &self.limits)
    }
}

/// Process-level daemon settings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DaemonConfig {
    /// Pid/lock file enforcing a single daemon instance; unset disables it
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    /// Log file; logs go to stderr when unset
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
