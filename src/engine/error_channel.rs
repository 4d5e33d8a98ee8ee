// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Side channel for behavior failures.
//!
//! Errors are not graph edges. A failure anywhere is delivered to every error
//! sink instance in the table and to every external subscriber of the
//! broadcast channel, independent of how the graph is wired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub source_node_id: String,
    pub source_node_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(
        source_node_id: impl Into<String>,
        source_node_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_node_id: source_node_id.into(),
            source_node_name: source_node_name.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// The message handed to error sink nodes: the record is the payload.
    pub fn to_message(&self) -> Message {
        let payload = serde_json::to_value(self).unwrap_or_default();
        Message::new(payload).with_topic("error")
    }
}

pub(crate) struct ErrorChannel {
    sender: broadcast::Sender<ErrorRecord>,
}

impl ErrorChannel {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ErrorRecord> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers that will see the record.
    pub(crate) fn publish(&self, record: ErrorRecord) -> usize {
        self.sender.send(record).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_message_shape() {
        let record = ErrorRecord::new("n1", "Parser", "bad input");
        let msg = record.to_message();

        assert_eq!(msg.topic, "error");
        assert_eq!(msg.payload["sourceNodeId"], "n1");
        assert_eq!(msg.payload["sourceNodeName"], "Parser");
        assert_eq!(msg.payload["message"], "bad input");
        assert!(msg.payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_harmless() {
        let channel = ErrorChannel::new(4);
        assert_eq!(channel.publish(ErrorRecord::new("a", "a", "x")), 0);

        let mut rx = channel.subscribe();
        assert_eq!(channel.publish(ErrorRecord::new("a", "a", "y")), 1);
        assert_eq!(rx.recv().await.unwrap().message, "y");
    }
}
