// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every recurring diagnostic event in the engine is a small struct with a
//! `Display` implementation and a [`messages::StructuredLog`] implementation.
//! This keeps log wording in one place and lets each event attach typed fields
//! instead of interpolating everything into the message text.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::engine` - graph lifecycle, redeploys, workflow loading, error broadcasts
//! * `messages::node` - node instance lifecycle, behavior failures and drops
//! * `messages::registry` - node type registration
//!
//! # Usage
//!
//! ```rust
//! use the_switchyard::observability::messages::StructuredLog;
//! use the_switchyard::observability::messages::node::NodeStarted;
//!
//! let msg = NodeStarted {
//!     node_id: "n1",
//!     node_type: "switch",
//!     queue_capacity: 1000,
//! };
//!
//! msg.log();
//! ```
//!
//! Drops caused by backpressure or disabled nodes are expected behavior and are
//! only ever logged at `trace!`.

pub mod messages;
