// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-node counters and the periodic telemetry frames built from them.
//!
//! `NodeTelemetry` is a point-in-time snapshot. The reporter task turns two
//! consecutive snapshots into a throughput figure and publishes a
//! `TelemetryFrame` on a broadcast channel for whoever is listening.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Weak;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::engine::node::LifecycleState;
use crate::engine::runtime::EngineCore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTelemetry {
    pub node_id: String,
    pub name: String,
    pub node_type: String,
    pub state: LifecycleState,
    pub enabled: bool,
    pub queue_depth: usize,
    /// Zero for direct-dispatch nodes, which have no queue
    pub queue_capacity: usize,
    /// Dropped because the queue was full or the node was busy
    pub dropped: u64,
    pub disabled_drops: u64,
    pub idle_drops: u64,
    pub processed: u64,
    pub failures: u64,
    pub processing: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeThroughput {
    #[serde(flatten)]
    pub telemetry: NodeTelemetry,
    /// Messages processed per second since the previous frame
    pub throughput: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryFrame {
    pub timestamp: DateTime<Utc>,
    pub nodes: Vec<NodeThroughput>,
}

/// Turns successive snapshots into frames.
#[derive(Default)]
struct ThroughputTracker {
    previous: HashMap<String, u64>,
    last_tick: Option<Instant>,
}

impl ThroughputTracker {
    fn frame(&mut self, snapshot: Vec<NodeTelemetry>, now: Instant) -> TelemetryFrame {
        let elapsed = self
            .last_tick
            .map(|last| now.duration_since(last))
            .unwrap_or_default();
        self.last_tick = Some(now);

        let mut current = HashMap::with_capacity(snapshot.len());
        let nodes = snapshot
            .into_iter()
            .map(|telemetry| {
                let before = self.previous.get(&telemetry.node_id).copied().unwrap_or(0);
                let delta = telemetry.processed.saturating_sub(before);
                let throughput = if elapsed.is_zero() {
                    0.0
                } else {
                    delta as f64 / elapsed.as_secs_f64()
                };
                current.insert(telemetry.node_id.clone(), telemetry.processed);
                NodeThroughput {
                    telemetry,
                    throughput,
                }
            })
            .collect();
        self.previous = current;

        TelemetryFrame {
            timestamp: Utc::now(),
            nodes,
        }
    }
}

pub(crate) fn snapshot(core: &EngineCore) -> Vec<NodeTelemetry> {
    core.all_nodes().iter().map(|node| node.telemetry()).collect()
}

/// Publish a frame every `interval` until cancelled or the engine is gone.
pub(crate) fn spawn_reporter(
    core: Weak<EngineCore>,
    interval: Duration,
    frames: broadcast::Sender<TelemetryFrame>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut tracker = ThroughputTracker::default();
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(core) = core.upgrade() else { break };
                    let frame = tracker.frame(snapshot(&core), Instant::now());
                    // No subscribers is fine; frames are fire-and-forget
                    let _ = frames.send(frame);
                }
            }
        }
    });
}
