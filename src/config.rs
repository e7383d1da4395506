//! Limit rule configuration.
//!
//! Embedding applications usually construct [`Limit`]s in code; this
//! module loads named limit rules from YAML files for deployments that
//! prefer configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{FloodgateError, Result};
use crate::ratelimit::Limit;

/// A set of limit rules applied together by one limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Limit rules, evaluated together as one atomic decision
    #[serde(default)]
    pub limits: Vec<LimitRule>,
}

/// Configuration for a single limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitRule {
    /// Key prefix name; a pseudo-random prefix is generated when omitted
    #[serde(default)]
    pub name: Option<String>,

    /// Maximum count per window
    pub max: u64,

    /// Window size in milliseconds
    pub window_ms: u64,

    /// Windowing algorithm
    #[serde(default)]
    pub algorithm: WindowKind,

    /// Increment applied per call
    #[serde(default = "default_rate")]
    pub rate: u64,
}

fn default_rate() -> u64 {
    1
}

/// Windowing algorithm names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Fixed,
    Sliding,
}

impl LimitsConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limit configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse limit config: {}", e)))
    }

    /// Turn the rules into limit parameters.
    ///
    /// Validation happens when the limits are handed to
    /// [`Limiter::new`](crate::ratelimit::Limiter::new).
    pub fn to_limits(&self) -> Vec<Limit> {
        self.limits
            .iter()
            .map(|rule| {
                let mut limit = Limit::new(Duration::from_millis(rule.window_ms), rule.max)
                    .with_rate(rule.rate);
                if let Some(ref name) = rule.name {
                    limit = limit.with_name(name);
                }
                match rule.algorithm {
                    WindowKind::Fixed => limit.with_fixed_window(),
                    WindowKind::Sliding => limit.with_sliding_window(),
                }
            })
            .collect()
    }
}
