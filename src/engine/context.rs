// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::sync::Arc;

use crate::engine::node::NodeInstance;
use crate::message::Message;
use crate::registry::ConfigMap;

/// A behavior's handle on the instance it runs in.
///
/// Handed to every callback and action. It is the only way a behavior can emit
/// messages; there is no path to call another node directly.
#[derive(Clone)]
pub struct NodeContext {
    node: Arc<NodeInstance>,
}

impl NodeContext {
    pub(crate) fn new(node: Arc<NodeInstance>) -> Self {
        Self { node }
    }

    pub fn node_id(&self) -> &str {
        self.node.id()
    }

    pub fn node_name(&self) -> String {
        self.node.name()
    }

    pub fn config(&self) -> ConfigMap {
        self.node.config()
    }

    pub fn config_value(&self, key: &str) -> Option<Value> {
        self.node.config().get(key).cloned()
    }

    /// False once the node has been asked to stop; background tasks spawned by
    /// a behavior should exit when this turns false.
    pub fn is_running(&self) -> bool {
        self.node.is_running()
    }

    pub fn output_count(&self) -> usize {
        self.node.output_count()
    }

    /// Emit on output port `output`. Returns how many targets accepted a copy.
    pub fn send(&self, message: Message, output: usize) -> usize {
        self.node.send(message, output)
    }

    /// Record a config change the behavior made to itself.
    ///
    /// The value is stored on the instance (so it shows up in listings and
    /// exports) without calling `configure` again.
    pub fn update_config(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.node.store_config_value(key.into(), value.into());
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("node_id", &self.node.id())
            .finish()
    }
}
