// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Live execution engine.
//!
//! * `node` - node instances, their bounded queues and workers
//! * `connections` - the mutable connection graph
//! * `orchestrator` - the [`Engine`] that owns both and applies edits
//! * `error_channel` - side channel for behavior failures
//! * `telemetry` - per-node counters and periodic frames
//! * `changes` - change sets for incremental redeploy

pub mod changes;
pub mod connections;
mod context;
pub mod error_channel;
pub mod node;
pub mod orchestrator;
mod runtime;
pub mod telemetry;

pub use changes::{ApplyReport, ChangeSet, StartReport};
pub use connections::{Connection, ConnectionGraph, EndpointResolver};
pub use context::NodeContext;
pub use error_channel::ErrorRecord;
pub use node::{LifecycleState, NodeInstance};
pub use orchestrator::{Engine, GraphState, NodeSnapshot};
pub use telemetry::{NodeTelemetry, NodeThroughput, TelemetryFrame};
