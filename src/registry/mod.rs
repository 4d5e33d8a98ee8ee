// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node type registry.
//!
//! Maps a type name to its immutable [`NodeTypeDescriptor`]. The registry knows
//! nothing about discovery: whatever loads node types (for the built-ins,
//! [`crate::nodes::register_builtin_types`]) calls [`NodeTypeRegistry::register`].
//!
//! Listing preserves registration order, which is what an editor palette shows.
//! Re-registering a name swaps the descriptor atomically and keeps its slot;
//! instances already created keep the `Arc` to the descriptor they were built with.

mod descriptor;
mod schema;

pub use descriptor::{
    BusyPolicy, DescriptorBuilder, DescriptorSummary, DispatchMode, NodeAction, NodeFactory,
    NodeTypeDescriptor, VisualInfo,
};
pub use schema::{ConfigMap, ConfigSchema, FieldConstraints, FieldDescriptor, FieldKind, Visibility};

// Node modules build their descriptors and configure results from one import path
pub use crate::traits::Reconfigured;

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{EngineError, Result};
use crate::observability::messages::registry::NodeTypeRegistered;
use crate::observability::messages::StructuredLog;

#[derive(Default)]
struct RegistryInner {
    order: Vec<String>,
    types: HashMap<String, Arc<NodeTypeDescriptor>>,
}

#[derive(Default)]
pub struct NodeTypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any existing one with the same name.
    pub fn register(&self, descriptor: NodeTypeDescriptor) -> Arc<NodeTypeDescriptor> {
        let descriptor = Arc::new(descriptor);
        let type_name = descriptor.type_name.clone();

        let replaced = {
            let mut inner = self.inner.write();
            let replaced = inner
                .types
                .insert(type_name.clone(), Arc::clone(&descriptor))
                .is_some();
            if !replaced {
                inner.order.push(type_name.clone());
            }
            replaced
        };

        NodeTypeRegistered {
            type_name: &type_name,
            replaced,
        }
        .log();

        descriptor
    }

    pub fn lookup(&self, type_name: &str) -> Result<Arc<NodeTypeDescriptor>> {
        self.inner
            .read()
            .types
            .get(type_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.inner.read().types.contains_key(type_name)
    }

    /// Snapshot of every registered descriptor, in registration order.
    pub fn list(&self) -> Vec<Arc<NodeTypeDescriptor>> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| inner.types.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::testing::{new_log, Recorder};

    fn descriptor(name: &str, outputs: usize) -> NodeTypeDescriptor {
        Recorder::new(&new_log())
            .descriptor(name, BusyPolicy::Queue)
            .outputs(outputs)
            .build()
    }

    #[test]
    fn test_lookup_unknown_type() {
        let registry = NodeTypeRegistry::new();
        let err = registry.lookup("nope").unwrap_err();
        assert!(matches!(err, EngineError::UnknownType(name) if name == "nope"));
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let registry = NodeTypeRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(descriptor(name, 1));
        }

        let names: Vec<String> = registry.list().iter().map(|d| d.type_name.clone()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_reregister_replaces_in_place() {
        let registry = NodeTypeRegistry::new();
        registry.register(descriptor("a", 1));
        registry.register(descriptor("b", 1));
        let held = registry.lookup("a").unwrap();

        registry.register(descriptor("a", 4));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list()[0].output_count, 4);
        assert_eq!(registry.lookup("a").unwrap().output_count, 4);
        // Holders of the old descriptor are unaffected
        assert_eq!(held.output_count, 1);
    }
}
