// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph-level orchestration events.
//!
//! This module contains message types for logging events related to:
//! * Whole-graph start and stop
//! * Incremental redeploys
//! * Workflow record loading
//! * Instance creation/deletion and error broadcasts

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Every node in the graph was asked to start.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::engine::GraphStarted;
///
/// let msg = GraphStarted {
///     node_count: 5,
///     failed_count: 1,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct GraphStarted {
    pub node_count: usize,
    pub failed_count: usize,
}

impl Display for GraphStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph started: {} nodes, {} failed to start",
            self.node_count, self.failed_count
        )
    }
}

impl StructuredLog for GraphStarted {
    fn log(&self) {
        if self.failed_count > 0 {
            tracing::warn!(
                node_count = self.node_count,
                failed_count = self.failed_count,
                "{}", self
            );
        } else {
            tracing::info!(
                node_count = self.node_count,
                failed_count = self.failed_count,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "graph",
            span_name = name,
            node_count = self.node_count,
        )
    }
}

/// Every node in the graph was stopped.
///
/// # Log Level
/// `info!` - Important operational event
pub struct GraphStopped {
    pub node_count: usize,
    pub duration: std::time::Duration,
}

impl Display for GraphStopped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph stopped: {} nodes in {:?}",
            self.node_count, self.duration
        )
    }
}

impl StructuredLog for GraphStopped {
    fn log(&self) {
        tracing::info!(
            node_count = self.node_count,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }
}

/// An incremental change set was applied to the live graph.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::engine::IncrementalApplyCompleted;
/// use std::time::Duration;
///
/// let msg = IncrementalApplyCompleted {
///     added: 1,
///     modified: 2,
///     deleted: 0,
///     restarted: 1,
///     connections_added: 3,
///     connections_removed: 1,
///     duration: Duration::from_millis(4),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct IncrementalApplyCompleted {
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    pub restarted: usize,
    pub connections_added: usize,
    pub connections_removed: usize,
    pub duration: std::time::Duration,
}

impl Display for IncrementalApplyCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Applied changes: +{} ~{} -{} nodes ({} restarted), +{} -{} connections in {:?}",
            self.added,
            self.modified,
            self.deleted,
            self.restarted,
            self.connections_added,
            self.connections_removed,
            self.duration
        )
    }
}

impl StructuredLog for IncrementalApplyCompleted {
    fn log(&self) {
        tracing::info!(
            added = self.added,
            modified = self.modified,
            deleted = self.deleted,
            restarted = self.restarted,
            connections_added = self.connections_added,
            connections_removed = self.connections_removed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "incremental_apply",
            span_name = name,
            added = self.added,
            modified = self.modified,
            deleted = self.deleted,
        )
    }
}

/// A workflow record was loaded into an engine.
///
/// # Log Level
/// `info!` - Important operational event
pub struct WorkflowLoaded {
    pub node_count: usize,
    pub connection_count: usize,
}

impl Display for WorkflowLoaded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow loaded: {} nodes, {} connections",
            self.node_count, self.connection_count
        )
    }
}

impl StructuredLog for WorkflowLoaded {
    fn log(&self) {
        tracing::info!(
            node_count = self.node_count,
            connection_count = self.connection_count,
            "{}", self
        );
    }
}

/// # Log Level
/// `debug!` - Routine edit
pub struct NodeCreated<'a> {
    pub node_id: &'a str,
    pub node_type: &'a str,
}

impl Display for NodeCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Created node '{}' of type '{}'", self.node_id, self.node_type)
    }
}

impl StructuredLog for NodeCreated<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            node_type = self.node_type,
            "{}", self
        );
    }
}

/// # Log Level
/// `debug!` - Routine edit
pub struct NodeDeleted<'a> {
    pub node_id: &'a str,
    pub removed_connections: usize,
}

impl Display for NodeDeleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Deleted node '{}' and {} attached connections",
            self.node_id, self.removed_connections
        )
    }
}

impl StructuredLog for NodeDeleted<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            removed_connections = self.removed_connections,
            "{}", self
        );
    }
}

/// A behavior failure was fanned out to error sinks and subscribers.
///
/// # Log Level
/// `debug!` - The failure itself is already logged by the node
pub struct ErrorBroadcast<'a> {
    pub source_node_id: &'a str,
    pub sink_count: usize,
    pub subscriber_count: usize,
}

impl Display for ErrorBroadcast<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Broadcast error from '{}' to {} sinks and {} subscribers",
            self.source_node_id, self.sink_count, self.subscriber_count
        )
    }
}

impl StructuredLog for ErrorBroadcast<'_> {
    fn log(&self) {
        tracing::debug!(
            source_node_id = self.source_node_id,
            sink_count = self.sink_count,
            subscriber_count = self.subscriber_count,
            "{}", self
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_incremental_apply_display() {
        let msg = IncrementalApplyCompleted {
            added: 1,
            modified: 2,
            deleted: 3,
            restarted: 1,
            connections_added: 4,
            connections_removed: 5,
            duration: Duration::from_millis(7),
        };
        assert_eq!(
            msg.to_string(),
            "Applied changes: +1 ~2 -3 nodes (1 restarted), +4 -5 connections in 7ms"
        );
    }

    #[test]
    fn test_graph_started_display() {
        let msg = GraphStarted {
            node_count: 3,
            failed_count: 0,
        };
        assert_eq!(msg.to_string(), "Graph started: 3 nodes, 0 failed to start");
    }
}
