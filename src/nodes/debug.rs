// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `debug`: a sink that logs what it receives and keeps the latest messages.
//!
//! Uses direct dispatch: every message runs on its own task without passing
//! through a queue, so a debug node never applies backpressure and has no
//! capacity bound. Use it for inspection, not for high-rate streams. History
//! follows handling order, which under load can differ from arrival order.

use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::VecDeque;

use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::message::Message;
use crate::registry::{
    BusyPolicy, ConfigMap, DispatchMode, FieldDescriptor, FieldKind, NodeAction, NodeTypeDescriptor,
    Reconfigured, VisualInfo,
};
use crate::traits::NodeBehavior;

pub const TYPE_NAME: &str = "debug";

const DEFAULT_CAPACITY: usize = 100;

pub fn descriptor() -> NodeTypeDescriptor {
    NodeTypeDescriptor::builder(TYPE_NAME, BusyPolicy::Queue, || Box::new(DebugNode::default()))
        .visual(VisualInfo::new("Debug", "output").color("#87a980").icon("bug"))
        .inputs(1)
        .outputs(0)
        .dispatch(DispatchMode::Direct)
        .field(FieldDescriptor::new("active", FieldKind::Boolean, true))
        .field(FieldDescriptor::new("property", FieldKind::Text, "payload"))
        .field(
            FieldDescriptor::new("capacity", FieldKind::Number, DEFAULT_CAPACITY as u64)
                .range(Some(1.0), Some(10_000.0)),
        )
        .action(NodeAction::on_behavior::<DebugNode, _>("clear", false, |node, _ctx, _arg| {
            let cleared = node.history.len();
            node.history.clear();
            Ok(Some(Value::from(cleared)))
        }))
        .action(NodeAction::on_behavior::<DebugNode, _>("toggle", false, |node, ctx, _arg| {
            node.active = !node.active;
            ctx.update_config("active", node.active);
            Ok(Some(Value::Bool(node.active)))
        }))
        .action(NodeAction::on_behavior::<DebugNode, _>("messages", false, |node, _ctx, _arg| {
            let messages = node.history.iter().map(Message::to_value).collect();
            Ok(Some(Value::Array(messages)))
        }))
        .build()
}

#[derive(Debug)]
pub struct DebugNode {
    active: bool,
    property: String,
    capacity: usize,
    history: VecDeque<Message>,
}

impl Default for DebugNode {
    fn default() -> Self {
        Self {
            active: true,
            property: "payload".to_string(),
            capacity: DEFAULT_CAPACITY,
            history: VecDeque::new(),
        }
    }
}

impl DebugNode {
    fn record(&mut self, message: Message) {
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(message);
    }
}

#[async_trait]
impl NodeBehavior for DebugNode {
    async fn on_input(&mut self, ctx: &NodeContext, message: Message, _input: usize) -> Result<(), BehaviorError> {
        if !self.active {
            return Ok(());
        }
        let shown = message.property(&self.property).unwrap_or(Value::Null);
        tracing::info!(
            node_id = ctx.node_id(),
            topic = %message.topic,
            queue_length = ?message.meta.queue_length,
            "{}", shown
        );
        self.record(message);
        Ok(())
    }

    fn configure(&mut self, config: &ConfigMap) -> Result<Reconfigured, BehaviorError> {
        self.active = config.get("active").and_then(Value::as_bool).unwrap_or(true);
        self.property = config
            .get("property")
            .and_then(Value::as_str)
            .unwrap_or("payload")
            .to_string();
        self.capacity = config
            .get("capacity")
            .and_then(Value::as_u64)
            .map(|c| c.max(1) as usize)
            .unwrap_or(DEFAULT_CAPACITY);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        Ok(Reconfigured::default())
    }

    fn name(&self) -> &'static str {
        TYPE_NAME
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_bounded() {
        let mut node = DebugNode {
            capacity: 2,
            ..Default::default()
        };
        for i in 0..5 {
            node.record(Message::new(i));
        }
        let kept: Vec<Value> = node.history.iter().map(|m| m.payload.clone()).collect();
        assert_eq!(kept, vec![Value::from(3), Value::from(4)]);
    }

    #[test]
    fn test_descriptor_declares_actions() {
        let descriptor = descriptor();
        let names: Vec<&str> = descriptor.actions().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["clear", "toggle", "messages"]);
        assert_eq!(descriptor.dispatch, DispatchMode::Direct);
    }
}
