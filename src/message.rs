// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The unit of data that flows along connections.
//!
//! A `Message` is an arbitrarily nested record. Nodes treat it as immutable by
//! convention: fan-out hands every target its own deep copy (`Clone` on
//! `serde_json::Value` copies the whole tree), so a target mutating its copy
//! can never be observed by a sibling.
//!
//! The engine owns the `meta` block. `emit_timestamp` is stamped when a node
//! sends, `queue_length` and `age_seconds` when the target receives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Engine-populated metadata carried alongside every message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMeta {
    /// Depth of the target's queue observed when the message arrived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<usize>,
    /// Seconds between emission and arrival
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<f64>,
    /// When the message was last sent by a node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique per originating injection; preserved as the message is forwarded
    pub id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub meta: MessageMeta,
    /// Any additional fields a node chose to attach
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a message with a fresh id and an empty topic.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: String::new(),
            payload: payload.into(),
            meta: MessageMeta::default(),
            extra: Map::new(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Resolve a dotted property path such as `payload.reading.value`.
    ///
    /// `payload`, `topic` and `id` address the fixed fields; anything else is
    /// looked up in `extra`. Array elements are addressed by index.
    pub fn property(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;
        let root = match head {
            "payload" => self.payload.clone(),
            "topic" => Value::String(self.topic.clone()),
            "id" => Value::String(self.id.clone()),
            other => self.extra.get(other)?.clone(),
        };

        segments.try_fold(root, |current, segment| match current {
            Value::Object(mut map) => map.remove(segment),
            Value::Array(mut items) => {
                let index = segment.parse::<usize>().ok()?;
                if index < items.len() {
                    Some(items.swap_remove(index))
                } else {
                    None
                }
            }
            _ => None,
        })
    }

    /// Stamp the arrival metadata onto this copy.
    pub(crate) fn stamp_arrival(&mut self, queue_length: usize, now: DateTime<Utc>) {
        self.meta.queue_length = Some(queue_length);
        self.meta.age_seconds = self.meta.emit_timestamp.map(|emitted| {
            let age = now.signed_duration_since(emitted);
            (age.num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0).max(0.0)
        });
    }

    pub(crate) fn stamp_emit(&mut self, now: DateTime<Utc>) {
        self.meta.emit_timestamp = Some(now);
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message_has_unique_id() {
        let a = Message::new(1);
        let b = Message::new(1);
        assert_ne!(a.id, b.id);
        assert_eq!(a.topic, "");
    }

    #[test]
    fn test_clone_is_deep() {
        let original = Message::new(json!({"nested": {"values": [1, 2, 3]}}));
        let mut copy = original.clone();
        copy.payload["nested"]["values"][0] = json!(99);

        assert_eq!(original.payload["nested"]["values"][0], json!(1));
        assert_eq!(copy.payload["nested"]["values"][0], json!(99));
    }

    #[test]
    fn test_property_paths() {
        let msg = Message::new(json!({"reading": {"value": 42, "tags": ["a", "b"]}}))
            .with_topic("sensors")
            .with_field("source", json!({"host": "edge-1"}));

        let cases = vec![
            ("payload.reading.value", Some(json!(42))),
            ("payload.reading.tags.1", Some(json!("b"))),
            ("payload.reading.tags.7", None),
            ("topic", Some(json!("sensors"))),
            ("source.host", Some(json!("edge-1"))),
            ("missing", None),
            ("payload.reading.value.deeper", None),
        ];

        for (path, expected) in cases {
            assert_eq!(msg.property(path), expected, "path: {}", path);
        }
    }

    #[test]
    fn test_stamp_arrival_computes_age() {
        let mut msg = Message::new("x");
        let emitted = Utc::now();
        msg.stamp_emit(emitted);
        msg.stamp_arrival(3, emitted + chrono::Duration::milliseconds(1500));

        assert_eq!(msg.meta.queue_length, Some(3));
        let age = msg.meta.age_seconds.unwrap();
        assert!((age - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_stamp_arrival_without_emit_leaves_age_empty() {
        let mut msg = Message::new("x");
        msg.stamp_arrival(0, Utc::now());
        assert_eq!(msg.meta.queue_length, Some(0));
        assert!(msg.meta.age_seconds.is_none());
    }

    #[test]
    fn test_serialized_shape_flattens_extra_fields() {
        let msg = Message::new(10).with_topic("t").with_field("retain", true);
        let value = msg.to_value();

        assert_eq!(value["payload"], json!(10));
        assert_eq!(value["topic"], json!("t"));
        assert_eq!(value["retain"], json!(true));

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }
}
