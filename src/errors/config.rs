// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors found while validating a workflow record before it is loaded
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two node records share the same id
    DuplicateNodeId {
        /// The duplicated node id
        node_id: String,
    },
    /// A connection references a node id that has no record
    DanglingConnection {
        /// Source node of the offending connection
        source: String,
        /// Target node of the offending connection
        target: String,
        /// The endpoint that could not be resolved
        missing_node: String,
    },
    /// A node record has an empty id
    EmptyNodeId {
        /// Position of the record in the node list
        index: usize,
    },
    /// The same connection appears more than once
    DuplicateConnection {
        source: String,
        source_output: usize,
        target: String,
        target_input: usize,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateNodeId { node_id } => {
                write!(f, "Duplicate node ID: '{}'", node_id)
            }
            ValidationError::DanglingConnection {
                source,
                target,
                missing_node,
            } => {
                write!(
                    f,
                    "Connection '{}' -> '{}' references node '{}' which does not exist",
                    source, target, missing_node
                )
            }
            ValidationError::EmptyNodeId { index } => {
                write!(f, "Node record at position {} has an empty id", index)
            }
            ValidationError::DuplicateConnection {
                source,
                source_output,
                target,
                target_input,
            } => {
                write!(
                    f,
                    "Duplicate connection: {}[{}] -> {}[{}]",
                    source, source_output, target, target_input
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}
