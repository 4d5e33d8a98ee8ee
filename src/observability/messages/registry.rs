// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for node type registration.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};

/// A node type descriptor was registered, or replaced an earlier one.
///
/// # Log Level
/// `debug!` for a new type, `info!` when an existing type is replaced
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::registry::NodeTypeRegistered;
///
/// let msg = NodeTypeRegistered {
///     type_name: "switch",
///     replaced: false,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct NodeTypeRegistered<'a> {
    pub type_name: &'a str,
    pub replaced: bool,
}

impl Display for NodeTypeRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.replaced {
            write!(f, "Replaced node type '{}'", self.type_name)
        } else {
            write!(f, "Registered node type '{}'", self.type_name)
        }
    }
}

impl StructuredLog for NodeTypeRegistered<'_> {
    fn log(&self) {
        if self.replaced {
            tracing::info!(type_name = self.type_name, replaced = true, "{}", self);
        } else {
            tracing::debug!(type_name = self.type_name, replaced = false, "{}", self);
        }
    }
}
