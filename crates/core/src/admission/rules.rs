// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered destination rules resolving a delivery target to its limits

use glob::{Pattern, PatternError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection limits applied to destinations matched by one rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLimits {
    /// Maximum simultaneous outbound connections across all workers
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for RuleLimits {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

/// One configured rule: a destination pattern and the limits it carries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleEntry {
    /// Glob-style destination pattern, e.g. `*.example.com`
    pub pattern: String,
    #[serde(flatten)]
    pub limits: RuleLimits,
}

impl RuleEntry {
    pub fn new(pattern: impl Into<String>, limits: RuleLimits) -> Self {
        Self {
            pattern: pattern.into(),
            limits,
        }
    }
}

/// Rule compilation errors
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid destination pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: PatternError,
    },
}

/// Ordered destination rules with a mandatory default.
///
/// Rules are evaluated in configuration order and the first match wins; a
/// hint matching no rule resolves to the default. Reload replaces the whole
/// value, so a resolver never observes a partially-rebuilt list.
#[derive(Clone, Debug)]
pub struct DestinationRules {
    rules: Vec<(Pattern, RuleLimits)>,
    default: RuleLimits,
}

impl DestinationRules {
    /// Compile configured entries, preserving their order.
    pub fn compile(default: RuleLimits, entries: &[RuleEntry]) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            let pattern =
                Pattern::new(&entry.pattern).map_err(|source| RuleError::InvalidPattern {
                    pattern: entry.pattern.clone(),
                    source,
                })?;
            rules.push((pattern, entry.limits.clone()));
        }
        Ok(Self { rules, default })
    }

    /// Rules carrying only the default limits.
    pub fn with_default(default: RuleLimits) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    /// Resolve a destination hint to its limits.
    pub fn resolve(&self, hint: &str) -> &RuleLimits {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(hint))
            .map(|(_, limits)| limits)
            .unwrap_or(&self.default)
    }
}

impl Default for DestinationRules {
    fn default() -> Self {
        Self::with_default(RuleLimits::default())
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
