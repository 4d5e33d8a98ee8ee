// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation of workflow records.
//!
//! A record is checked before anything is built from it, so a bad record never
//! leaves a half-constructed graph behind. Checks accumulate: the caller gets
//! every problem at once rather than fixing them one by one.
//!
//! # Checks
//!
//! 1. **Non-empty ids**: every node record has an id
//! 2. **Uniqueness**: no two node records share an id
//! 3. **Reference validation**: every connection endpoint names a node in the record
//! 4. **Edge uniqueness**: a connection 4-tuple appears at most once
//!
//! Port ranges and node types are not checked here; they depend on the
//! registry and on each node's config, and are enforced by the engine.
//!
//! Cycles are legal. A live dataflow graph may feed a node's output back into
//! its own input.
//!
//! # Example
//!
//! ```rust
//! use the_switchyard::config::{validate_workflow, NodeRecord, WorkflowRecord};
//! use the_switchyard::engine::Connection;
//! use the_switchyard::errors::ValidationError;
//!
//! let record = WorkflowRecord {
//!     nodes: vec![NodeRecord::new("a", "inject")],
//!     connections: vec![Connection::new("a", 0, "missing", 0)],
//! };
//!
//! match validate_workflow(&record) {
//!     Ok(()) => println!("Workflow is valid"),
//!     Err(errors) => {
//!         for error in errors {
//!             if let ValidationError::DanglingConnection { missing_node, .. } = &error {
//!                 eprintln!("Unknown node '{}'", missing_node);
//!             }
//!         }
//!     }
//! }
//! ```

use std::collections::HashSet;

use crate::config::WorkflowRecord;
use crate::errors::ValidationError;

/// Validate a workflow record, returning every problem found.
///
/// # Returns
///
/// * `Ok(())` - The record can be handed to `Engine::load_workflow`
/// * `Err(Vec<ValidationError>)` - All validation errors found
pub fn validate_workflow(record: &WorkflowRecord) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(id_errors) = validate_node_ids(record) {
        errors.extend(id_errors);
    }

    if let Err(reference_errors) = validate_connection_references(record) {
        errors.extend(reference_errors);
    }

    if let Err(duplicate_errors) = validate_unique_connections(record) {
        errors.extend(duplicate_errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_node_ids(record: &WorkflowRecord) -> Result<(), Vec<ValidationError>> {
    let mut seen_ids = HashSet::new();
    let mut errors = Vec::new();

    for (index, node) in record.nodes.iter().enumerate() {
        if node.id.is_empty() {
            errors.push(ValidationError::EmptyNodeId { index });
            continue;
        }
        if !seen_ids.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Every connection must name existing nodes at both ends.
///
/// A connection with both ends missing produces two errors.
fn validate_connection_references(record: &WorkflowRecord) -> Result<(), Vec<ValidationError>> {
    let node_ids: HashSet<&str> = record.nodes.iter().map(|node| node.id.as_str()).collect();
    let mut errors = Vec::new();

    for connection in &record.connections {
        for endpoint in [&connection.source, &connection.target] {
            if !node_ids.contains(endpoint.as_str()) {
                errors.push(ValidationError::DanglingConnection {
                    source: connection.source.clone(),
                    target: connection.target.clone(),
                    missing_node: endpoint.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_unique_connections(record: &WorkflowRecord) -> Result<(), Vec<ValidationError>> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for connection in &record.connections {
        if !seen.insert(connection) {
            errors.push(ValidationError::DuplicateConnection {
                source: connection.source.clone(),
                source_output: connection.source_output,
                target: connection.target.clone(),
                target_input: connection.target_input,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
