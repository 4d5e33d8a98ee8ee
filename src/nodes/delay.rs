// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `delay`: holds each message for `delay_ms`, then forwards it.
//!
//! Drops anything that arrives while a message is being held, which makes it a
//! simple rate limiter: at most one message per `delay_ms` gets through.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::message::Message;
use crate::registry::{
    BusyPolicy, ConfigMap, FieldDescriptor, FieldKind, NodeTypeDescriptor, Reconfigured, VisualInfo,
};
use crate::traits::NodeBehavior;

pub const TYPE_NAME: &str = "delay";

pub fn descriptor() -> NodeTypeDescriptor {
    NodeTypeDescriptor::builder(TYPE_NAME, BusyPolicy::DropWhileBusy, || Box::new(DelayNode::default()))
        .visual(VisualInfo::new("Delay", "function").color("#e6e0f8").icon("timer"))
        .inputs(1)
        .outputs(1)
        .field(
            FieldDescriptor::new("delay_ms", FieldKind::Number, 1000)
                .range(Some(0.0), Some(3_600_000.0))
                .required(),
        )
        .build()
}

#[derive(Debug, Default)]
pub struct DelayNode {
    delay: Duration,
}

#[async_trait]
impl NodeBehavior for DelayNode {
    async fn on_input(&mut self, ctx: &NodeContext, message: Message, _input: usize) -> Result<(), BehaviorError> {
        tokio::time::sleep(self.delay).await;
        ctx.send(message, 0);
        Ok(())
    }

    fn configure(&mut self, config: &ConfigMap) -> Result<Reconfigured, BehaviorError> {
        let delay_ms = config
            .get("delay_ms")
            .and_then(Value::as_f64)
            .ok_or_else(|| BehaviorError::invalid_config("delay_ms", "expected a number"))?;
        self.delay = Duration::from_millis(delay_ms as u64);
        Ok(Reconfigured::default())
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
    fn test_configure_reads_delay() {
        let mut node = DelayNode::default();
        node.configure(json!({"delay_ms": 250}).as_object().unwrap()).unwrap();
        assert_eq!(node.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_delay_drops_while_busy() {
        let descriptor = descriptor();
        assert_eq!(descriptor.busy_policy, BusyPolicy::DropWhileBusy);

        let schema = &descriptor.config_schema;
        assert!(schema.validate(&schema.with_defaults(&ConfigMap::new())).is_ok());
        let too_long = schema.with_defaults(json!({"delay_ms": 4_000_000}).as_object().unwrap());
        assert!(schema.validate(&too_long).is_err());
    }
}
