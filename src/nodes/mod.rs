// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in node types.
//!
//! The engine treats these like any other externally loaded type: they are
//! only reachable through the registry once [`register_builtin_types`] runs.

pub mod catch;
pub mod debug;
pub mod delay;
pub mod inject;
pub mod switch;

#[cfg(test)]
pub(crate) mod testing;

use crate::registry::NodeTypeRegistry;

/// Register every built-in type, in palette order.
pub fn register_builtin_types(registry: &NodeTypeRegistry) {
    registry.register(inject::descriptor());
    registry.register(switch::descriptor());
    registry.register(delay::descriptor());
    registry.register(debug::descriptor());
    registry.register(catch::descriptor());
}
