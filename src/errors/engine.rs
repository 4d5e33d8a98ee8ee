// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural errors returned synchronously by engine operations.

use thiserror::Error;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned to the caller of an engine operation.
///
/// Graph-shape problems (unknown type, bad endpoint, missing node) fail the
/// mutating call. Per-message failures never show up here; they travel on the
/// error broadcast channel instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph references a node type nobody registered
    #[error("unknown node type '{0}'")]
    UnknownType(String),

    /// No node with this id exists
    #[error("node '{0}' not found")]
    NotFound(String),

    /// A node with this id already exists
    #[error("node '{0}' already exists")]
    DuplicateId(String),

    /// A connection references a missing node or an out-of-range port
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The node's type declares no action with this name
    #[error("node '{node_id}' has no action '{action}'")]
    ActionNotFound { node_id: String, action: String },

    /// The action exists but its body failed
    #[error("action '{action}' on node '{node_id}' failed: {reason}")]
    ActionFailed {
        node_id: String,
        action: String,
        reason: String,
    },

    /// The supplied config does not satisfy the node type's schema
    #[error("invalid config for node '{node_id}': {}", reasons.join("; "))]
    InvalidConfig {
        node_id: String,
        reasons: Vec<String>,
    },

    /// The node's start hook refused to start
    #[error("node '{node_id}' failed to start: {reason}")]
    StartFailed { node_id: String, reason: String },

    /// The behavior stayed locked by a callback past the stop timeout
    #[error("node '{0}' is still busy in a callback")]
    Busy(String),

    /// A workflow record was rejected before anything was built
    #[error("workflow rejected:\n{0}")]
    Workflow(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EngineError {
    pub fn invalid_endpoint(msg: impl Into<String>) -> Self {
        Self::InvalidEndpoint(msg.into())
    }
}
