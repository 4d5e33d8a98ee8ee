// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The mutable edge set of a live graph.
//!
//! A connection is the 4-tuple `(source, source_output, target, target_input)`
//! and is unique by that tuple. Fan-out (one output, many targets) and fan-in
//! (many sources, one input) are both legal. Edges are kept in insertion order,
//! which is also the order `send` delivers in.
//!
//! Workers read the graph on every `send`; the engine writes it on edits. A
//! `parking_lot::RwLock` guards the list and `outputs_of` copies the matching
//! edges out under the read lock, so a sender never observes a half-applied edit.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub source: String,
    pub source_output: usize,
    pub target: String,
    pub target_input: usize,
}

impl Connection {
    pub fn new(
        source: impl Into<String>,
        source_output: usize,
        target: impl Into<String>,
        target_input: usize,
    ) -> Self {
        Self {
            source: source.into(),
            source_output,
            target: target.into(),
            target_input,
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] -> {}[{}]",
            self.source, self.source_output, self.target, self.target_input
        )
    }
}

/// Answers "does this node exist, and how many ports does it have?"
///
/// Implemented by the engine over its instance table; tests use a plain map.
pub trait EndpointResolver {
    /// `(input_count, output_count)` of the node, or `None` if it does not exist.
    fn ports(&self, node_id: &str) -> Option<(usize, usize)>;
}

#[derive(Debug, Default)]
pub struct ConnectionGraph {
    edges: RwLock<Vec<Connection>>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge after checking both endpoints against `endpoints`.
    ///
    /// Returns `Ok(false)` if the exact edge already exists.
    pub fn add(&self, connection: Connection, endpoints: &dyn EndpointResolver) -> Result<bool> {
        let (_, source_outputs) = endpoints.ports(&connection.source).ok_or_else(|| {
            EngineError::invalid_endpoint(format!("source node '{}' does not exist", connection.source))
        })?;
        let (target_inputs, _) = endpoints.ports(&connection.target).ok_or_else(|| {
            EngineError::invalid_endpoint(format!("target node '{}' does not exist", connection.target))
        })?;

        if connection.source_output >= source_outputs {
            return Err(EngineError::invalid_endpoint(format!(
                "node '{}' has {} outputs, no output {}",
                connection.source, source_outputs, connection.source_output
            )));
        }
        if connection.target_input >= target_inputs {
            return Err(EngineError::invalid_endpoint(format!(
                "node '{}' has {} inputs, no input {}",
                connection.target, target_inputs, connection.target_input
            )));
        }

        let mut edges = self.edges.write();
        if edges.contains(&connection) {
            return Ok(false);
        }
        edges.push(connection);
        Ok(true)
    }

    /// Remove an edge. Removing a missing edge is a no-op.
    pub fn remove(&self, connection: &Connection) -> bool {
        let mut edges = self.edges.write();
        let before = edges.len();
        edges.retain(|edge| edge != connection);
        edges.len() != before
    }

    /// Targets of one output port, as `(target, target_input)` in delivery order.
    pub fn outputs_of(&self, node_id: &str, output: usize) -> Vec<(String, usize)> {
        self.edges
            .read()
            .iter()
            .filter(|edge| edge.source == node_id && edge.source_output == output)
            .map(|edge| (edge.target.clone(), edge.target_input))
            .collect()
    }

    /// Every edge into or out of `node_id`.
    pub fn attached_to(&self, node_id: &str) -> Vec<Connection> {
        self.edges
            .read()
            .iter()
            .filter(|edge| edge.touches(node_id))
            .cloned()
            .collect()
    }

    /// Remove every edge touching `node_id` in a single write.
    pub fn remove_all_for(&self, node_id: &str) -> Vec<Connection> {
        let mut edges = self.edges.write();
        let (removed, kept): (Vec<_>, Vec<_>) = edges.drain(..).partition(|edge| edge.touches(node_id));
        *edges = kept;
        removed
    }

    /// Drop edges leaving `node_id` from output ports `>= output_count`.
    pub fn remove_outputs_beyond(&self, node_id: &str, output_count: usize) -> Vec<Connection> {
        let mut edges = self.edges.write();
        let (removed, kept): (Vec<_>, Vec<_>) = edges
            .drain(..)
            .partition(|edge| edge.source == node_id && edge.source_output >= output_count);
        *edges = kept;
        removed
    }

    pub fn contains(&self, connection: &Connection) -> bool {
        self.edges.read().contains(connection)
    }

    pub fn snapshot(&self) -> Vec<Connection> {
        self.edges.read().clone()
    }

    pub fn len(&self) -> usize {
        self.edges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        self.edges.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Ports(HashMap<&'static str, (usize, usize)>);

    impl EndpointResolver for Ports {
        fn ports(&self, node_id: &str) -> Option<(usize, usize)> {
            self.0.get(node_id).copied()
        }
    }

    fn ports() -> Ports {
        Ports(HashMap::from([
            ("src", (0, 2)),
            ("mid", (1, 1)),
            ("a", (1, 0)),
            ("b", (1, 0)),
        ]))
    }

    #[test]
    fn test_add_validates_endpoints() {
        let graph = ConnectionGraph::new();
        let ports = ports();

        let cases = vec![
            (Connection::new("src", 0, "a", 0), true),
            (Connection::new("ghost", 0, "a", 0), false),
            (Connection::new("src", 0, "ghost", 0), false),
            (Connection::new("src", 2, "a", 0), false),
            (Connection::new("src", 0, "a", 1), false),
            (Connection::new("a", 0, "mid", 0), false),
        ];

        for (connection, ok) in cases {
            let result = graph.add(connection.clone(), &ports);
            assert_eq!(result.is_ok(), ok, "{}", connection);
            if let Err(err) = result {
                assert!(matches!(err, EngineError::InvalidEndpoint(_)));
            }
        }
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_duplicate_add_is_noop() {
        let graph = ConnectionGraph::new();
        let ports = ports();
        assert!(graph.add(Connection::new("src", 0, "a", 0), &ports).unwrap());
        assert!(!graph.add(Connection::new("src", 0, "a", 0), &ports).unwrap());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_outputs_of_preserves_insertion_order() {
        let graph = ConnectionGraph::new();
        let ports = ports();
        graph.add(Connection::new("src", 0, "b", 0), &ports).unwrap();
        graph.add(Connection::new("src", 1, "mid", 0), &ports).unwrap();
        graph.add(Connection::new("src", 0, "a", 0), &ports).unwrap();

        assert_eq!(
            graph.outputs_of("src", 0),
            vec![("b".to_string(), 0), ("a".to_string(), 0)]
        );
        assert_eq!(graph.outputs_of("src", 1), vec![("mid".to_string(), 0)]);
        assert!(graph.outputs_of("src", 5).is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let graph = ConnectionGraph::new();
        let ports = ports();
        let edge = Connection::new("src", 0, "a", 0);
        graph.add(edge.clone(), &ports).unwrap();

        assert!(graph.remove(&edge));
        assert!(!graph.remove(&edge));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_remove_all_for_node() {
        let graph = ConnectionGraph::new();
        let ports = ports();
        graph.add(Connection::new("src", 0, "mid", 0), &ports).unwrap();
        graph.add(Connection::new("mid", 0, "a", 0), &ports).unwrap();
        graph.add(Connection::new("src", 1, "b", 0), &ports).unwrap();

        let removed = graph.remove_all_for("mid");
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.snapshot(), vec![Connection::new("src", 1, "b", 0)]);
    }

    #[test]
    fn test_remove_outputs_beyond() {
        let graph = ConnectionGraph::new();
        let ports = ports();
        graph.add(Connection::new("src", 0, "a", 0), &ports).unwrap();
        graph.add(Connection::new("src", 1, "b", 0), &ports).unwrap();

        let removed = graph.remove_outputs_beyond("src", 1);
        assert_eq!(removed, vec![Connection::new("src", 1, "b", 0)]);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_connection_serializes_camel_case() {
        let value = serde_json::to_value(Connection::new("a", 1, "b", 0)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"source": "a", "sourceOutput": 1, "target": "b", "targetInput": 0})
        );
    }
}
