// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for node instance lifecycle and processing events.
//!
//! This module contains message types for logging events related to:
//! * Worker start/stop, including workers that fail to stop in time
//! * Behavior failures caught at the worker boundary
//! * Messages dropped by the disabled gate, busy policy or full queues
//! * Reconfiguration

use crate::errors::DropReason;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A node's worker was spawned.
///
/// # Log Level
/// `debug!` - Routine lifecycle event
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::node::NodeStarted;
///
/// let msg = NodeStarted {
///     node_id: "n1",
///     node_type: "delay",
///     queue_capacity: 1000,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct NodeStarted<'a> {
    pub node_id: &'a str,
    pub node_type: &'a str,
    pub queue_capacity: usize,
}

impl Display for NodeStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' ({}) started with queue capacity {}",
            self.node_id, self.node_type, self.queue_capacity
        )
    }
}

impl StructuredLog for NodeStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            node_type = self.node_type,
            queue_capacity = self.queue_capacity,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "node_worker",
            span_name = name,
            node_id = self.node_id,
            node_type = self.node_type,
        )
    }
}

/// # Log Level
/// `debug!` - Routine lifecycle event
pub struct NodeStopped<'a> {
    pub node_id: &'a str,
    pub processed: u64,
}

impl Display for NodeStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' stopped after processing {} messages",
            self.node_id, self.processed
        )
    }
}

impl StructuredLog for NodeStopped<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            processed = self.processed,
            "{}", self
        );
    }
}

/// The worker did not finish within the stop bound and was left running detached.
///
/// # Log Level
/// `error!` - A leaked worker requires attention
pub struct NodeStopTimedOut<'a> {
    pub node_id: &'a str,
    pub timeout: std::time::Duration,
}

impl Display for NodeStopTimedOut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' worker did not stop within {:?}; leaving it detached",
            self.node_id, self.timeout
        )
    }
}

impl StructuredLog for NodeStopTimedOut<'_> {
    fn log(&self) {
        tracing::error!(
            node_id = self.node_id,
            timeout_ms = self.timeout.as_millis() as u64,
            "{}", self
        );
    }
}

/// A second `start` on a running node.
///
/// # Log Level
/// `debug!`
pub struct NodeAlreadyRunning<'a> {
    pub node_id: &'a str,
}

impl Display for NodeAlreadyRunning<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' is already running", self.node_id)
    }
}

impl StructuredLog for NodeAlreadyRunning<'_> {
    fn log(&self) {
        tracing::debug!(node_id = self.node_id, "{}", self);
    }
}

/// `start` gave up because an earlier worker still holds the behavior.
///
/// # Log Level
/// `warn!` - The node stays stopped until its stuck callback returns
pub struct NodeStartRefused<'a> {
    pub node_id: &'a str,
    pub reason: &'a str,
}

impl Display for NodeStartRefused<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' not started: {}", self.node_id, self.reason)
    }
}

impl StructuredLog for NodeStartRefused<'_> {
    fn log(&self) {
        tracing::warn!(node_id = self.node_id, reason = self.reason, "{}", self);
    }
}

/// A behavior callback returned an error or panicked.
///
/// # Log Level
/// `warn!` - The node keeps running; the error is also broadcast
///
/// # Example
/// ```
/// use the_switchyard::observability::messages::node::BehaviorFailed;
///
/// let msg = BehaviorFailed {
///     node_id: "parser",
///     phase: "input",
///     error: "unexpected token",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct BehaviorFailed<'a> {
    pub node_id: &'a str,
    /// `input`, `start` or `action`
    pub phase: &'a str,
    pub error: &'a str,
}

impl Display for BehaviorFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' failed during {}: {}",
            self.node_id, self.phase, self.error
        )
    }
}

impl StructuredLog for BehaviorFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            node_id = self.node_id,
            phase = self.phase,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "behavior_failed",
            span_name = name,
            node_id = self.node_id,
            phase = self.phase,
        )
    }
}

/// # Log Level
/// `trace!` - Drops are expected under load and must not flood the logs
pub struct MessageDropped<'a> {
    pub node_id: &'a str,
    pub reason: DropReason,
}

impl Display for MessageDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' dropped a message: {}", self.node_id, self.reason)
    }
}

impl StructuredLog for MessageDropped<'_> {
    fn log(&self) {
        tracing::trace!(
            node_id = self.node_id,
            reason = %self.reason,
            "{}", self
        );
    }
}

/// # Log Level
/// `debug!`
pub struct NodeReconfigured<'a> {
    pub node_id: &'a str,
    pub output_count: usize,
}

impl Display for NodeReconfigured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' reconfigured with {} outputs",
            self.node_id, self.output_count
        )
    }
}

impl StructuredLog for NodeReconfigured<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            output_count = self.output_count,
            "{}", self
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_dropped_display() {
        let msg = MessageDropped {
            node_id: "sink",
            reason: DropReason::QueueFull,
        };
        assert_eq!(msg.to_string(), "Node 'sink' dropped a message: queue full");
    }

    #[test]
    fn test_behavior_failed_display() {
        let msg = BehaviorFailed {
            node_id: "n1",
            phase: "input",
            error: "boom",
        };
        assert_eq!(msg.to_string(), "Node 'n1' failed during input: boom");
    }
}
