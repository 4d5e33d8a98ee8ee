// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! # Organization
//!
//! * `engine` - graph lifecycle and orchestration events
//! * `node` - per-instance lifecycle, failures and drops
//! * `registry` - node type registration
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_switchyard::observability::messages::engine::GraphStarted;
//! use the_switchyard::observability::messages::StructuredLog;
//!
//! let msg = GraphStarted {
//!     node_count: 5,
//!     failed_count: 0,
//! };
//!
//! msg.log();
//! tracing::info!("{}", msg);
//! ```

use tracing::Span;

pub mod engine;
pub mod node;
pub mod registry;

/// A log event that knows its own level and structured fields.
pub trait StructuredLog: std::fmt::Display {
    /// Emit the event at its designated level.
    fn log(&self);

    /// Build a span carrying the same fields, for wrapping longer-lived work.
    fn span(&self, _name: &str) -> Span {
        Span::none()
    }
}
