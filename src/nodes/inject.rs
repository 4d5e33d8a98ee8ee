// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `inject`: a source node that emits a configured message on demand or on a timer.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::message::Message;
use crate::registry::{
    BusyPolicy, ConfigMap, FieldDescriptor, FieldKind, NodeAction, NodeTypeDescriptor, Reconfigured,
    VisualInfo,
};
use crate::traits::NodeBehavior;

pub const TYPE_NAME: &str = "inject";

pub fn descriptor() -> NodeTypeDescriptor {
    NodeTypeDescriptor::builder(TYPE_NAME, BusyPolicy::Queue, || Box::new(InjectNode::default()))
        .visual(VisualInfo::new("Inject", "input").color("#a6bbcf").icon("arrow-right"))
        .inputs(0)
        .outputs(1)
        .field(FieldDescriptor::new("payload", FieldKind::Json, Value::Null))
        .field(FieldDescriptor::new("topic", FieldKind::Text, ""))
        .field(FieldDescriptor::new("repeat_ms", FieldKind::Number, 0).range(Some(0.0), None))
        .restart_on("repeat_ms")
        .action(NodeAction::new("inject", true, |ctx, payload| {
            let delivered = ctx.send(build_message(&ctx.config(), payload), 0);
            Ok(Some(Value::from(delivered)))
        }))
        .build()
}

/// Build the configured message; `payload` overrides the configured payload.
fn build_message(config: &ConfigMap, payload: Option<Value>) -> Message {
    let payload = payload
        .or_else(|| config.get("payload").cloned())
        .unwrap_or(Value::Null);
    let topic = config.get("topic").and_then(Value::as_str).unwrap_or_default();
    Message::new(payload).with_topic(topic)
}

#[derive(Default)]
pub struct InjectNode {
    repeat: Option<Duration>,
    ticker: Option<CancellationToken>,
}

#[async_trait]
impl NodeBehavior for InjectNode {
    /// Any inbound message acts as a trigger.
    async fn on_input(&mut self, ctx: &NodeContext, _message: Message, _input: usize) -> Result<(), BehaviorError> {
        ctx.send(build_message(&ctx.config(), None), 0);
        Ok(())
    }

    fn configure(&mut self, config: &ConfigMap) -> Result<Reconfigured, BehaviorError> {
        let repeat_ms = config.get("repeat_ms").and_then(Value::as_u64).unwrap_or(0);
        self.repeat = (repeat_ms > 0).then(|| Duration::from_millis(repeat_ms));
        Ok(Reconfigured::default())
    }

    async fn on_start(&mut self, ctx: &NodeContext) -> Result<(), BehaviorError> {
        let Some(period) = self.repeat else {
            return Ok(());
        };
        let cancel = CancellationToken::new();
        let ticker_cancel = cancel.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = ticker_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if !ctx.is_running() {
                            break;
                        }
                        ctx.send(build_message(&ctx.config(), None), 0);
                    }
                }
            }
        });
        self.ticker = Some(cancel);
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &NodeContext) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn name(&self) -> &'static str {
        TYPE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_message_from_config() {
        let config = json!({"payload": {"n": 1}, "topic": "t"}).as_object().cloned().unwrap();

        let msg = build_message(&config, None);
        assert_eq!(msg.payload, json!({"n": 1}));
        assert_eq!(msg.topic, "t");

        let overridden = build_message(&config, Some(json!(7)));
        assert_eq!(overridden.payload, json!(7));
    }

    #[test]
    fn test_configure_repeat() {
        let mut node = InjectNode::default();
        let config = json!({"repeat_ms": 250}).as_object().cloned().unwrap();
        node.configure(&config).unwrap();
        assert_eq!(node.repeat, Some(Duration::from_millis(250)));

        let config = json!({"repeat_ms": 0}).as_object().cloned().unwrap();
        node.configure(&config).unwrap();
        assert_eq!(node.repeat, None);
    }
}
