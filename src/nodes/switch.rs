// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! `switch`: routes each message to the outputs whose rule matches.
//!
//! There is one output port per rule, so the port count follows the config.
//! Shrinking the rule list drops the connections of the removed ports.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;

use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::message::Message;
use crate::registry::{
    BusyPolicy, ConfigMap, FieldDescriptor, FieldKind, NodeTypeDescriptor, Reconfigured, VisualInfo,
};
use crate::traits::NodeBehavior;

pub const TYPE_NAME: &str = "switch";

pub fn descriptor() -> NodeTypeDescriptor {
    NodeTypeDescriptor::builder(TYPE_NAME, BusyPolicy::Queue, || Box::new(SwitchNode::default()))
        .visual(VisualInfo::new("Switch", "function").color("#e2d96e").icon("switch"))
        .inputs(1)
        .outputs(0)
        .field(FieldDescriptor::new("property", FieldKind::Text, "payload").required())
        .field(FieldDescriptor::new("rules", FieldKind::List, Value::Array(Vec::new())))
        .field(FieldDescriptor::new("check_all", FieldKind::Boolean, true))
        .build()
}

/// One routing rule, e.g. `{"op": "gt", "value": 10}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Rule {
    Eq { value: Value },
    Neq { value: Value },
    Lt { value: Value },
    Gt { value: Value },
    Contains { value: Value },
    /// Matches when no earlier rule matched
    Else,
}

impl Rule {
    fn matches(&self, actual: Option<&Value>, earlier_match: bool) -> bool {
        match self {
            Rule::Else => !earlier_match,
            Rule::Eq { value } => actual.is_some_and(|a| loosely_equal(a, value)),
            Rule::Neq { value } => !actual.is_some_and(|a| loosely_equal(a, value)),
            Rule::Lt { value } => actual.and_then(|a| compare(a, value)) == Some(Ordering::Less),
            Rule::Gt { value } => actual.and_then(|a| compare(a, value)) == Some(Ordering::Greater),
            Rule::Contains { value } => match (actual, value) {
                (Some(Value::String(haystack)), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Some(Value::Array(items)), needle) => items.contains(needle),
                _ => false,
            },
        }
    }
}

/// Numbers compare by value (so `1` equals `1.0`); everything else structurally.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub struct SwitchNode {
    property: String,
    rules: Vec<Rule>,
    check_all: bool,
}

impl SwitchNode {
    /// Output ports the message should go to, in rule order.
    fn route(&self, message: &Message) -> Vec<usize> {
        let actual = message.property(&self.property);
        let mut matched = Vec::new();
        for (port, rule) in self.rules.iter().enumerate() {
            if rule.matches(actual.as_ref(), !matched.is_empty()) {
                matched.push(port);
                if !self.check_all {
                    break;
                }
            }
        }
        matched
    }
}

#[async_trait]
impl NodeBehavior for SwitchNode {
    async fn on_input(&mut self, ctx: &NodeContext, message: Message, _input: usize) -> Result<(), BehaviorError> {
        for port in self.route(&message) {
            ctx.send(message.clone(), port);
        }
        Ok(())
    }

    fn configure(&mut self, config: &ConfigMap) -> Result<Reconfigured, BehaviorError> {
        let rules = match config.get("rules") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value::<Vec<Rule>>(raw.clone())
                .map_err(|e| BehaviorError::invalid_config("rules", e.to_string()))?,
        };

        self.property = config
            .get("property")
            .and_then(Value::as_str)
            .unwrap_or("payload")
            .to_string();
        self.check_all = config.get("check_all").and_then(Value::as_bool).unwrap_or(true);
        self.rules = rules;
        Ok(Reconfigured::outputs(self.rules.len()))
    }

    fn name(&self) -> &'static str {
        TYPE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn switch(config: Value) -> SwitchNode {
        let mut node = SwitchNode::default();
        node.configure(config.as_object().unwrap()).unwrap();
        node
    }

    #[test]
    fn test_output_count_follows_rules() {
        let mut node = SwitchNode::default();
        let config = json!({"rules": [{"op": "eq", "value": 1}, {"op": "gt", "value": 5}, {"op": "else"}]});
        let reconfigured = node.configure(config.as_object().unwrap()).unwrap();
        assert_eq!(reconfigured.output_count, Some(3));
    }

    #[test]
    fn test_bad_rules_are_rejected() {
        let mut node = SwitchNode::default();
        let config = json!({"rules": [{"op": "between"}]});
        let err = node.configure(config.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, BehaviorError::InvalidConfig { key, .. } if key == "rules"));
    }

    #[test]
    fn test_routing_table() {
        let rules = json!([
            {"op": "lt", "value": 10},
            {"op": "gt", "value": 5},
            {"op": "eq", "value": 7.0},
            {"op": "else"}
        ]);

        let check_all = switch(json!({"rules": rules, "check_all": true}));
        let first_only = switch(json!({"rules": rules, "check_all": false}));

        let cases = vec![
            (json!(7), vec![0, 1, 2], vec![0]),
            (json!(3), vec![0], vec![0]),
            (json!(20), vec![1], vec![1]),
            (json!("text"), vec![3], vec![3]),
        ];

        for (payload, all, first) in cases {
            let msg = Message::new(payload.clone());
            assert_eq!(check_all.route(&msg), all, "check_all payload {}", payload);
            assert_eq!(first_only.route(&msg), first, "first-only payload {}", payload);
        }
    }

    #[test]
    fn test_contains_and_property_path() {
        let node = switch(json!({
            "property": "payload.tags",
            "rules": [{"op": "contains", "value": "hot"}, {"op": "neq", "value": null}]
        }));

        let hot = Message::new(json!({"tags": ["cold", "hot"]}));
        assert_eq!(node.route(&hot), vec![0, 1]);

        let missing = Message::new(json!({}));
        assert_eq!(node.route(&missing), vec![1]);
    }

    #[test]
    fn test_topic_routing() {
        let node = switch(json!({
            "property": "topic",
            "rules": [{"op": "eq", "value": "alerts"}, {"op": "contains", "value": "log"}]
        }));
        assert_eq!(node.route(&Message::new(1).with_topic("alerts")), vec![0]);
        assert_eq!(node.route(&Message::new(1).with_topic("syslog")), vec![1]);
    }
}
