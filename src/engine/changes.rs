// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Diffs between two versions of a graph, for live redeploy.

use serde::Serialize;
use std::collections::HashSet;

use crate::config::{NodeRecord, WorkflowRecord};
use crate::engine::Connection;

/// A set of edits to apply to a live graph in one pass.
///
/// `modified` carries the complete new record of each changed node, not a patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub added: Vec<NodeRecord>,
    pub modified: Vec<NodeRecord>,
    pub deleted: Vec<String>,
    pub added_connections: Vec<Connection>,
    pub deleted_connections: Vec<Connection>,
}

impl ChangeSet {
    /// Compute the edits that turn `current` into `next`.
    ///
    /// Nodes are matched by id. A node whose record differs in any field is
    /// reported as modified; connections are compared as whole 4-tuples.
    pub fn between(current: &WorkflowRecord, next: &WorkflowRecord) -> Self {
        let mut changes = ChangeSet::default();

        for node in &next.nodes {
            match current.node(&node.id) {
                None => changes.added.push(node.clone()),
                Some(existing) if existing != node => changes.modified.push(node.clone()),
                Some(_) => {}
            }
        }

        let next_ids: HashSet<&str> = next.nodes.iter().map(|n| n.id.as_str()).collect();
        changes.deleted = current
            .nodes
            .iter()
            .filter(|n| !next_ids.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();

        let current_edges: HashSet<&Connection> = current.connections.iter().collect();
        let next_edges: HashSet<&Connection> = next.connections.iter().collect();
        changes.added_connections = next
            .connections
            .iter()
            .filter(|c| !current_edges.contains(c))
            .cloned()
            .collect();
        changes.deleted_connections = current
            .connections
            .iter()
            .filter(|c| !next_edges.contains(c))
            .cloned()
            .collect();

        changes
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.added_connections.is_empty()
            && self.deleted_connections.is_empty()
    }
}

/// What an incremental apply actually did.
///
/// Edge and start problems do not abort the apply; they are collected here so
/// the rest of the change set still lands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    /// Modified nodes that were stopped and started to pick up their config
    pub restarted: Vec<String>,
    /// Modified nodes whose type changed and were rebuilt
    pub replaced: Vec<String>,
    pub connections_added: usize,
    pub connections_removed: usize,
    /// `(connection, reason)` for edges that could not be added
    pub rejected_connections: Vec<(Connection, String)>,
    /// `(node id, reason)` for nodes that failed to (re)start
    pub start_failures: Vec<(String, String)>,
}

/// Outcome of starting every node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    pub started: Vec<String>,
    pub failures: Vec<(String, String)>,
}

impl StartReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
