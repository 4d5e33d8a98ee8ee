// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `catch`: an error sink that turns broadcast error records back into messages.
//!
//! It has no inputs; the engine delivers every error record to it directly.
//! An optional `scope` limits it to errors raised by the listed node ids.

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::message::Message;
use crate::registry::{
    BusyPolicy, ConfigMap, FieldDescriptor, FieldKind, NodeTypeDescriptor, Reconfigured, VisualInfo,
};
use crate::traits::NodeBehavior;

pub const TYPE_NAME: &str = "catch";

pub fn descriptor() -> NodeTypeDescriptor {
    NodeTypeDescriptor::builder(TYPE_NAME, BusyPolicy::Queue, || Box::new(CatchNode::default()))
        .visual(VisualInfo::new("Catch", "input").color("#e49191").icon("alert"))
        .inputs(0)
        .outputs(1)
        .error_sink()
        .field(FieldDescriptor::new("scope", FieldKind::List, Value::Array(Vec::new())))
        .build()
}

#[derive(Debug, Default)]
pub struct CatchNode {
    scope: Vec<String>,
}

impl CatchNode {
    fn in_scope(&self, message: &Message) -> bool {
        if self.scope.is_empty() {
            return true;
        }
        message
            .property("payload.sourceNodeId")
            .and_then(|id| id.as_str().map(|id| self.scope.iter().any(|s| s == id)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl NodeBehavior for CatchNode {
    async fn on_input(&mut self, ctx: &NodeContext, message: Message, _input: usize) -> Result<(), BehaviorError> {
        if self.in_scope(&message) {
            ctx.send(message, 0);
        }
        Ok(())
    }

    fn configure(&mut self, config: &ConfigMap) -> Result<Reconfigured, BehaviorError> {
        self.scope = match config.get("scope") {
            Some(Value::Array(ids)) => ids
                .iter()
                .map(|id| {
                    id.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| BehaviorError::invalid_config("scope", "node ids must be strings"))
                })
                .collect::<Result<_, _>>()?,
            _ => Vec::new(),
        };
        Ok(Reconfigured::default())
    }

    fn name(&self) -> &'static str {
        TYPE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ErrorRecord;
    use serde_json::json;

    #[test]
    fn test_scope_filter() {
        let mut node = CatchNode::default();
        let from_a = ErrorRecord::new("a", "A", "boom").to_message();
        let from_b = ErrorRecord::new("b", "B", "boom").to_message();

        assert!(node.in_scope(&from_a));

        node.configure(json!({"scope": ["a"]}).as_object().unwrap()).unwrap();
        assert!(node.in_scope(&from_a));
        assert!(!node.in_scope(&from_b));
    }

    #[test]
    fn test_scope_rejects_non_string_ids() {
        let mut node = CatchNode::default();
        let result = node.configure(json!({"scope": [1]}).as_object().unwrap());
        assert!(result.is_err());
    }
}
