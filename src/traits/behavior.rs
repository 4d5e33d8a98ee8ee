// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::any::Any;

use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::message::Message;
use crate::registry::ConfigMap;

/// What a behavior reports back after accepting a new config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconfigured {
    /// New number of output ports, for types whose fan-out follows their config
    pub output_count: Option<usize>,
}

impl Reconfigured {
    pub fn outputs(count: usize) -> Self {
        Self {
            output_count: Some(count),
        }
    }
}

/// The per-instance logic of a node type.
///
/// One boxed behavior lives inside every node instance. The engine serializes
/// all calls into it through a node-local lock, so implementations can keep
/// plain mutable state without their own synchronization.
#[async_trait]
pub trait NodeBehavior: Send {
    /// Handle one inbound message that arrived on `input`.
    ///
    /// Returning `Err` (or panicking) does not stop the worker; the failure is
    /// turned into an error record and the next message is processed.
    async fn on_input(
        &mut self,
        ctx: &NodeContext,
        message: Message,
        input: usize,
    ) -> Result<(), BehaviorError>;

    /// Accept the full, schema-validated config.
    ///
    /// Called at creation and on every reconfigure, while stopped or running.
    /// Must be idempotent.
    fn configure(&mut self, _config: &ConfigMap) -> Result<Reconfigured, BehaviorError> {
        Ok(Reconfigured::default())
    }

    /// Called once when the node transitions to `Running`.
    async fn on_start(&mut self, _ctx: &NodeContext) -> Result<(), BehaviorError> {
        Ok(())
    }

    /// Called once after the worker has been joined.
    async fn on_stop(&mut self, _ctx: &NodeContext) {}

    fn name(&self) -> &'static str;

    /// Expose the concrete behavior to actions registered for its type.
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}
