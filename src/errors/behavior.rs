// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Failures raised inside node behaviors, and the vocabulary for silent drops.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Error returned by a node behavior callback, configure hook or action.
///
/// These never propagate back to the sender of a message. The worker catches
/// them and turns them into an error record on the broadcast channel.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BehaviorError {
    /// The node could not process a message
    #[error("{0}")]
    Failed(String),

    /// A config value was rejected by the node's own parsing
    #[error("invalid config '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    /// The behavior panicked while handling a message
    #[error("panicked: {0}")]
    Panicked(String),

    /// An action was bound to a different behavior type than the instance carries
    #[error("action '{0}' does not apply to this behavior")]
    ActionMismatch(String),
}

impl BehaviorError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Why an inbound message was discarded.
///
/// Drops are counted and traced, never surfaced as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The node is disabled
    Disabled,
    /// The inbound queue was at capacity
    QueueFull,
    /// The node drops while busy and was mid-callback
    Busy,
    /// The node has no running worker
    NotRunning,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DropReason::Disabled => "disabled",
            DropReason::QueueFull => "queue full",
            DropReason::Busy => "busy",
            DropReason::NotRunning => "not running",
        };
        f.write_str(reason)
    }
}
