// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! State shared between the engine handle and every node instance.
//!
//! Node instances hold a `Weak<EngineCore>`: a running worker can route
//! messages and report errors through it, but never keeps the engine alive.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::EngineSettings;
use crate::engine::connections::{ConnectionGraph, EndpointResolver};
use crate::engine::error_channel::{ErrorChannel, ErrorRecord};
use crate::engine::node::NodeInstance;
use crate::errors::{EngineError, Result};
use crate::observability::messages::engine::ErrorBroadcast;
use crate::observability::messages::StructuredLog;
use crate::registry::NodeTypeRegistry;

/// Instance table: lookup by id, iteration in creation order.
#[derive(Default)]
pub(crate) struct NodeTable {
    order: Vec<String>,
    nodes: HashMap<String, Arc<NodeInstance>>,
}

impl NodeTable {
    pub(crate) fn get(&self, id: &str) -> Option<&Arc<NodeInstance>> {
        self.nodes.get(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub(crate) fn insert(&mut self, node: Arc<NodeInstance>) {
        let id = node.id().to_string();
        if self.nodes.insert(id.clone(), node).is_none() {
            self.order.push(id);
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Arc<NodeInstance>> {
        let removed = self.nodes.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<NodeInstance>> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.nodes.clear();
    }
}

pub(crate) struct EngineCore {
    pub(crate) settings: EngineSettings,
    pub(crate) registry: Arc<NodeTypeRegistry>,
    pub(crate) nodes: RwLock<NodeTable>,
    pub(crate) connections: ConnectionGraph,
    errors: ErrorChannel,
}

impl EngineCore {
    pub(crate) fn new(settings: EngineSettings, registry: Arc<NodeTypeRegistry>) -> Self {
        let errors = ErrorChannel::new(settings.error_channel_capacity);
        Self {
            settings,
            registry,
            nodes: RwLock::new(NodeTable::default()),
            connections: ConnectionGraph::new(),
            errors,
        }
    }

    pub(crate) fn node(&self, id: &str) -> Option<Arc<NodeInstance>> {
        self.nodes.read().get(id).cloned()
    }

    pub(crate) fn require(&self, id: &str) -> Result<Arc<NodeInstance>> {
        self.node(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Snapshot of every instance, in creation order.
    pub(crate) fn all_nodes(&self) -> Vec<Arc<NodeInstance>> {
        self.nodes.read().iter().cloned().collect()
    }

    pub(crate) fn subscribe_errors(&self) -> broadcast::Receiver<ErrorRecord> {
        self.errors.subscribe()
    }

    /// Deliver an error record to every error sink except its source, then to
    /// external subscribers.
    pub(crate) fn broadcast_error(&self, record: ErrorRecord) -> usize {
        let sinks: Vec<Arc<NodeInstance>> = self
            .nodes
            .read()
            .iter()
            .filter(|node| node.descriptor().error_sink && node.id() != record.source_node_id)
            .cloned()
            .collect();

        let message = record.to_message();
        let delivered = sinks
            .iter()
            .filter(|sink| sink.receive(message.clone(), 0))
            .count();

        let source_node_id = record.source_node_id.clone();
        let subscriber_count = self.errors.publish(record);

        ErrorBroadcast {
            source_node_id: &source_node_id,
            sink_count: delivered,
            subscriber_count,
        }
        .log();

        delivered
    }
}

impl EndpointResolver for EngineCore {
    fn ports(&self, node_id: &str) -> Option<(usize, usize)> {
        self.nodes
            .read()
            .get(node_id)
            .map(|node| (node.input_count(), node.output_count()))
    }
}
