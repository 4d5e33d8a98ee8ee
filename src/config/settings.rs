// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_ERROR_CHANNEL_CAPACITY, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_STOP_TIMEOUT_MS,
};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Engine-wide runtime settings.
///
/// Loaded from a TOML file; every key is optional and falls back to the
/// built-in default.
///
/// # Example
/// ```toml
/// queue_capacity = 500
/// poll_interval_ms = 25
/// stop_timeout_ms = 1000
/// telemetry_interval_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Inbound queue capacity of every queued node
    pub queue_capacity: usize,
    /// Worker queue-pop timeout
    pub poll_interval_ms: u64,
    /// Bound on joining a worker when a node stops
    pub stop_timeout_ms: u64,
    /// Per-subscriber buffer of the error broadcast channel
    pub error_channel_capacity: usize,
    /// Publish telemetry frames at this interval while the graph runs
    pub telemetry_interval_ms: Option<u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            error_channel_capacity: DEFAULT_ERROR_CHANNEL_CAPACITY,
            telemetry_interval_ms: None,
        }
    }
}

impl EngineSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Queue capacity, never below one.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.max(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn telemetry_interval(&self) -> Option<Duration> {
        self.telemetry_interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = EngineSettings::from_toml_str("").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.queue_capacity, 1000);
        assert_eq!(settings.telemetry_interval(), None);
    }

    #[test]
    fn test_partial_override() {
        let settings = EngineSettings::from_toml_str(
            r#"
queue_capacity = 8
telemetry_interval_ms = 250
"#,
        )
        .unwrap();

        assert_eq!(settings.queue_capacity, 8);
        assert_eq!(settings.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(settings.telemetry_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let settings = EngineSettings {
            queue_capacity: 0,
            poll_interval_ms: 0,
            telemetry_interval_ms: Some(0),
            ..Default::default()
        };
        assert_eq!(settings.queue_capacity(), 1);
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));
        assert_eq!(settings.telemetry_interval(), None);
    }

    #[test]
    fn test_malformed_settings_are_rejected() {
        let result = EngineSettings::from_toml_str("queue_capacity = \"lots\"");
        assert!(matches!(result, Err(crate::errors::EngineError::Toml(_))));
    }
}
