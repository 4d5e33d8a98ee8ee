// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The engine: the only component allowed to create or destroy node instances
//! and to mutate the connection graph.
//!
//! ## Graph state
//!
//! The graph as a whole is `Stopped` or `Running`. Edits are legal in both
//! states; a node created while the graph runs is started immediately.
//!
//! ## Edit serialization
//!
//! Every structural edit takes the engine's edit lock (`tokio::sync::Mutex`)
//! so that, for example, a `connect` can never race the deletion of one of its
//! endpoints. Message delivery never takes this lock; workers only read the
//! instance table and connection graph through their own short-lived locks.
//!
//! ## Incremental redeploy
//!
//! `apply_incremental_changes` validates the node-level parts of a change set
//! up front (types, ids, schemas) and then applies it in an order that never
//! leaves a dangling edge mid-apply:
//!
//! 1. deleted connections
//! 2. deleted nodes (with every edge still attached to them)
//! 3. modified nodes: reconfigured in place, restarted only when a key the type
//!    lists in `restart_on` changed, rebuilt when the type itself changed
//! 4. added nodes
//! 5. added connections
//!
//! Nodes not named in the change set are not touched and keep running.

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::consts::TELEMETRY_CHANNEL_CAPACITY;
use crate::config::{validate_workflow, EngineSettings, NodeRecord, Position, WorkflowRecord};
use crate::engine::changes::{ApplyReport, ChangeSet, StartReport};
use crate::engine::connections::Connection;
use crate::engine::error_channel::ErrorRecord;
use crate::engine::node::{LifecycleState, NodeInstance};
use crate::engine::runtime::EngineCore;
use crate::engine::telemetry::{self, NodeTelemetry, TelemetryFrame};
use crate::errors::{EngineError, Result, ValidationError};
use crate::message::Message;
use crate::nodes::register_builtin_types;
use crate::observability::messages::engine::{
    GraphStarted, GraphStopped, IncrementalApplyCompleted, NodeCreated, NodeDeleted, WorkflowLoaded,
};
use crate::observability::messages::StructuredLog;
use crate::registry::{ConfigMap, DescriptorSummary, NodeTypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    Stopped,
    Running,
}

/// Listing entry for a live node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub config: ConfigMap,
    pub enabled: bool,
    pub state: LifecycleState,
    pub input_count: usize,
    pub output_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl NodeSnapshot {
    fn of(node: &NodeInstance) -> Self {
        Self {
            id: node.id().to_string(),
            node_type: node.node_type().to_string(),
            name: node.name(),
            config: node.config(),
            enabled: node.is_enabled(),
            state: node.state(),
            input_count: node.input_count(),
            output_count: node.output_count(),
            position: node.position(),
        }
    }
}

pub struct Engine {
    core: Arc<EngineCore>,
    edits: tokio::sync::Mutex<()>,
    state: Mutex<GraphState>,
    frames: broadcast::Sender<TelemetryFrame>,
    reporter: Mutex<Option<CancellationToken>>,
}

impl Engine {
    pub fn new(settings: EngineSettings, registry: Arc<NodeTypeRegistry>) -> Self {
        let (frames, _) = broadcast::channel(TELEMETRY_CHANNEL_CAPACITY);
        Self {
            core: Arc::new(EngineCore::new(settings, registry)),
            edits: tokio::sync::Mutex::new(()),
            state: Mutex::new(GraphState::Stopped),
            frames,
            reporter: Mutex::new(None),
        }
    }

    /// An engine whose registry holds the built-in node types.
    pub fn with_builtin_types(settings: EngineSettings) -> Self {
        let registry = Arc::new(NodeTypeRegistry::new());
        register_builtin_types(&registry);
        Self::new(settings, registry)
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.core.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.core.settings
    }

    pub fn graph_state(&self) -> GraphState {
        *self.state.lock()
    }

    fn is_running(&self) -> bool {
        self.graph_state() == GraphState::Running
    }

    // ----- node lifecycle -------------------------------------------------

    /// Create a node of `type_name`. A missing id is generated.
    ///
    /// Missing config keys take their schema defaults. If the graph is running
    /// the node is started before this returns. When that start fails the node
    /// stays in the table, stopped, and the call returns `StartFailed` carrying
    /// its id.
    pub async fn create_node(
        &self,
        type_name: &str,
        id: Option<&str>,
        config: Option<ConfigMap>,
    ) -> Result<String> {
        let _edits = self.edits.lock().await;
        let config = config.unwrap_or_default();
        let node = self.create_locked(type_name, id.map(str::to_string), &config).await?;
        if self.is_running() {
            node.start().await?;
        }
        Ok(node.id().to_string())
    }

    /// Create a node from a workflow record, including name, enabled flag and position.
    pub async fn create_node_from_record(&self, record: &NodeRecord) -> Result<String> {
        let _edits = self.edits.lock().await;
        let node = self
            .create_locked(&record.node_type, Some(record.id.clone()), &record.config)
            .await?;
        apply_record_fields(&node, record);
        if self.is_running() {
            node.start().await?;
        }
        Ok(node.id().to_string())
    }

    /// Stop the node if it runs, remove every edge attached to it, then remove it.
    pub async fn delete_node(&self, id: &str) -> Result<()> {
        let _edits = self.edits.lock().await;
        self.delete_locked(id).await.map(|_| ())
    }

    pub async fn start_node(&self, id: &str) -> Result<()> {
        let node = self.core.require(id)?;
        node.start().await
    }

    pub async fn stop_node(&self, id: &str) -> Result<()> {
        let node = self.core.require(id)?;
        node.stop().await;
        Ok(())
    }

    /// Start every node independently; one failing does not block the rest.
    pub async fn start_all(&self) -> StartReport {
        let _edits = self.edits.lock().await;
        let nodes = self.core.all_nodes();

        let outcomes = join_all(nodes.iter().map(|node| async move {
            (node.id().to_string(), node.start().await)
        }))
        .await;

        let mut report = StartReport::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.started.push(id),
                Err(error) => report.failures.push((id, error.to_string())),
            }
        }

        *self.state.lock() = GraphState::Running;
        self.start_reporter();

        GraphStarted {
            node_count: nodes.len(),
            failed_count: report.failures.len(),
        }
        .log();
        report
    }

    pub async fn stop_all(&self) {
        let _edits = self.edits.lock().await;
        self.stop_all_locked().await;
    }

    async fn stop_all_locked(&self) {
        let started_at = Instant::now();
        if let Some(cancel) = self.reporter.lock().take() {
            cancel.cancel();
        }

        let nodes = self.core.all_nodes();
        join_all(nodes.iter().map(|node| node.stop())).await;
        *self.state.lock() = GraphState::Stopped;

        GraphStopped {
            node_count: nodes.len(),
            duration: started_at.elapsed(),
        }
        .log();
    }

    /// Stop everything and empty the graph.
    pub async fn shutdown(&self) {
        let _edits = self.edits.lock().await;
        self.stop_all_locked().await;
        self.core.connections.clear();
        self.core.nodes.write().clear();
    }

    // ----- wiring ---------------------------------------------------------

    /// Add an edge. Returns `Ok(false)` if it already existed.
    pub async fn connect(&self, connection: Connection) -> Result<bool> {
        let _edits = self.edits.lock().await;
        self.core.connections.add(connection, self.core.as_ref())
    }

    /// Remove an edge. Removing a missing edge is not an error.
    pub async fn disconnect(&self, connection: &Connection) -> bool {
        let _edits = self.edits.lock().await;
        self.core.connections.remove(connection)
    }

    pub fn outputs_of(&self, id: &str, output: usize) -> Result<Vec<(String, usize)>> {
        self.core.require(id)?;
        Ok(self.core.connections.outputs_of(id, output))
    }

    pub fn list_connections(&self) -> Vec<Connection> {
        self.core.connections.snapshot()
    }

    // ----- configuration --------------------------------------------------

    pub fn get_config(&self, id: &str) -> Result<ConfigMap> {
        Ok(self.core.require(id)?.config())
    }

    /// Merge `patch` into the node's config.
    ///
    /// Restarts a running node when a `restart_on` key changed. If the node's
    /// output count shrinks, edges leaving the removed ports are dropped.
    pub async fn set_config(&self, id: &str, patch: ConfigMap) -> Result<()> {
        let _edits = self.edits.lock().await;
        let node = self.core.require(id)?;
        let mut candidate = node.config();
        for (key, value) in patch {
            candidate.insert(key, value);
        }
        self.reconfigure_locked(&node, &candidate).await.map(|_| ())
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        self.core.require(id)?.set_enabled(enabled);
        Ok(())
    }

    pub fn rename_node(&self, id: &str, name: impl Into<String>) -> Result<()> {
        self.core.require(id)?.set_name(name);
        Ok(())
    }

    // ----- messages and actions -------------------------------------------

    /// Emit `message` on a node's output port as if the node had sent it.
    pub fn inject(&self, id: &str, output: usize, message: Message) -> Result<usize> {
        let node = self.core.require(id)?;
        if output >= node.output_count() {
            return Err(EngineError::invalid_endpoint(format!(
                "node '{}' has {} outputs, no output {}",
                id,
                node.output_count(),
                output
            )));
        }
        Ok(node.send(message, output))
    }

    /// Hand `message` straight to a node's `receive` on input port `input`.
    pub fn deliver(&self, id: &str, input: usize, message: Message) -> Result<bool> {
        let node = self.core.require(id)?;
        Ok(node.receive(message, input))
    }

    pub async fn invoke_action(
        &self,
        id: &str,
        action: &str,
        argument: Option<Value>,
    ) -> Result<Option<Value>> {
        let node = self.core.require(id)?;
        let handler = node
            .descriptor()
            .action(action)
            .cloned()
            .ok_or_else(|| EngineError::ActionNotFound {
                node_id: id.to_string(),
                action: action.to_string(),
            })?;

        node.invoke_action(&handler, argument)
            .await
            .map_err(|error| EngineError::ActionFailed {
                node_id: id.to_string(),
                action: action.to_string(),
                reason: error.to_string(),
            })
    }

    // ----- errors and telemetry -------------------------------------------

    /// Push an error record to every error sink node and every subscriber.
    pub fn broadcast_error(&self, record: ErrorRecord) -> usize {
        self.core.broadcast_error(record)
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorRecord> {
        self.core.subscribe_errors()
    }

    /// Frames arrive only while the graph runs and `telemetry_interval_ms` is set.
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryFrame> {
        self.frames.subscribe()
    }

    pub fn telemetry(&self) -> Vec<NodeTelemetry> {
        telemetry::snapshot(&self.core)
    }

    pub fn node_telemetry(&self, id: &str) -> Result<NodeTelemetry> {
        Ok(self.core.require(id)?.telemetry())
    }

    fn start_reporter(&self) {
        let Some(interval) = self.core.settings.telemetry_interval() else {
            return;
        };
        let mut reporter = self.reporter.lock();
        if reporter.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        telemetry::spawn_reporter(
            Arc::downgrade(&self.core),
            interval,
            self.frames.clone(),
            cancel.clone(),
        );
        *reporter = Some(cancel);
    }

    // ----- introspection --------------------------------------------------

    pub fn list_types(&self) -> Vec<DescriptorSummary> {
        self.core
            .registry
            .list()
            .iter()
            .map(|descriptor| descriptor.summary())
            .collect()
    }

    pub fn list_nodes(&self) -> Vec<NodeSnapshot> {
        self.core
            .all_nodes()
            .iter()
            .map(|node| NodeSnapshot::of(node.as_ref()))
            .collect()
    }

    pub fn node(&self, id: &str) -> Result<NodeSnapshot> {
        let node = self.core.require(id)?;
        Ok(NodeSnapshot::of(node.as_ref()))
    }

    pub fn node_state(&self, id: &str) -> Result<LifecycleState> {
        Ok(self.core.require(id)?.state())
    }

    pub fn node_count(&self) -> usize {
        self.core.nodes.read().len()
    }

    // ----- workflow records -----------------------------------------------

    /// Build every node and connection of `record` into this engine.
    ///
    /// Nothing is built unless the record validates, every type is registered
    /// and no id collides. If a later step fails (a schema violation or an
    /// out-of-range port) every node created so far is removed again.
    pub async fn load_workflow(&self, record: &WorkflowRecord) -> Result<()> {
        validate_workflow(record).map_err(workflow_error)?;

        let _edits = self.edits.lock().await;
        for node in &record.nodes {
            self.core.registry.lookup(&node.node_type)?;
            if self.core.nodes.read().contains(&node.id) {
                return Err(EngineError::DuplicateId(node.id.clone()));
            }
        }

        let mut created: Vec<Arc<NodeInstance>> = Vec::with_capacity(record.nodes.len());
        let built: Result<()> = async {
            for node_record in &record.nodes {
                let node = self
                    .create_locked(
                        &node_record.node_type,
                        Some(node_record.id.clone()),
                        &node_record.config,
                    )
                    .await?;
                apply_record_fields(&node, node_record);
                created.push(node);
            }
            for connection in &record.connections {
                self.core
                    .connections
                    .add(connection.clone(), self.core.as_ref())?;
            }
            Ok::<(), EngineError>(())
        }
        .await;

        if let Err(error) = built {
            for node in created.iter().rev() {
                let _ = self.delete_locked(node.id()).await;
            }
            return Err(error);
        }

        if self.is_running() {
            join_all(created.iter().map(|node| node.start())).await;
        }

        WorkflowLoaded {
            node_count: record.nodes.len(),
            connection_count: record.connections.len(),
        }
        .log();
        Ok(())
    }

    /// Produce the workflow record of the live graph.
    pub fn export_workflow(&self) -> WorkflowRecord {
        let nodes = self
            .core
            .all_nodes()
            .iter()
            .map(|node| NodeRecord {
                id: node.id().to_string(),
                node_type: node.node_type().to_string(),
                name: node.name(),
                config: node.config(),
                enabled: node.is_enabled(),
                position: node.position(),
            })
            .collect();

        WorkflowRecord {
            nodes,
            connections: self.core.connections.snapshot(),
        }
    }

    /// Move the live graph to `next` with the smallest set of edits.
    pub async fn redeploy(&self, next: &WorkflowRecord) -> Result<ApplyReport> {
        validate_workflow(next).map_err(workflow_error)?;
        let changes = ChangeSet::between(&self.export_workflow(), next);
        self.apply_incremental_changes(changes).await
    }

    pub async fn apply_incremental_changes(&self, changes: ChangeSet) -> Result<ApplyReport> {
        let _edits = self.edits.lock().await;
        let started_at = Instant::now();
        self.prevalidate(&changes)?;

        let running = self.is_running();
        let mut report = ApplyReport::default();

        for connection in &changes.deleted_connections {
            if self.core.connections.remove(connection) {
                report.connections_removed += 1;
            }
        }

        for id in &changes.deleted {
            report.connections_removed += self.delete_locked(id).await?;
            report.deleted.push(id.clone());
        }

        for record in &changes.modified {
            let node = self.core.require(&record.id)?;
            if node.node_type() != record.node_type {
                self.replace_locked(&node, record, running, &mut report).await?;
                report.replaced.push(record.id.clone());
            } else {
                let candidate = node.descriptor().config_schema.with_defaults(&record.config);
                if self.reconfigure_locked(&node, &candidate).await? {
                    report.restarted.push(record.id.clone());
                }
                apply_record_fields(&node, record);
            }
            report.modified.push(record.id.clone());
        }

        for record in &changes.added {
            let node = self
                .create_locked(&record.node_type, Some(record.id.clone()), &record.config)
                .await?;
            apply_record_fields(&node, record);
            if running {
                if let Err(error) = node.start().await {
                    report.start_failures.push((record.id.clone(), error.to_string()));
                }
            }
            report.added.push(record.id.clone());
        }

        for connection in changes.added_connections {
            match self.core.connections.add(connection.clone(), self.core.as_ref()) {
                Ok(true) => report.connections_added += 1,
                Ok(false) => {}
                Err(error) => report.rejected_connections.push((connection, error.to_string())),
            }
        }

        IncrementalApplyCompleted {
            added: report.added.len(),
            modified: report.modified.len(),
            deleted: report.deleted.len(),
            restarted: report.restarted.len(),
            connections_added: report.connections_added,
            connections_removed: report.connections_removed,
            duration: started_at.elapsed(),
        }
        .log();
        Ok(report)
    }

    /// Reject a change set before touching the graph if any node-level part of it is invalid.
    ///
    /// Each added or modified config also goes through `configure` on a scratch behavior.
    fn prevalidate(&self, changes: &ChangeSet) -> Result<()> {
        let nodes = self.core.nodes.read();
        let deleted: HashSet<&str> = changes.deleted.iter().map(String::as_str).collect();

        for id in &changes.deleted {
            if !nodes.contains(id) {
                return Err(EngineError::NotFound(id.clone()));
            }
        }
        for record in &changes.modified {
            if !nodes.contains(&record.id) || deleted.contains(record.id.as_str()) {
                return Err(EngineError::NotFound(record.id.clone()));
            }
        }

        let mut added_ids = HashSet::new();
        for record in &changes.added {
            let taken = nodes.contains(&record.id) && !deleted.contains(record.id.as_str());
            if taken || !added_ids.insert(record.id.as_str()) {
                return Err(EngineError::DuplicateId(record.id.clone()));
            }
        }

        for record in changes.added.iter().chain(&changes.modified) {
            let descriptor = self.core.registry.lookup(&record.node_type)?;
            let candidate = descriptor.config_schema.with_defaults(&record.config);
            descriptor
                .config_schema
                .validate(&candidate)
                .map_err(|reasons| EngineError::InvalidConfig {
                    node_id: record.id.clone(),
                    reasons,
                })?;
            // The node's own parsing can still reject a schema-valid config
            descriptor
                .create_behavior()
                .configure(&candidate)
                .map_err(|error| EngineError::InvalidConfig {
                    node_id: record.id.clone(),
                    reasons: vec![error.to_string()],
                })?;
        }
        Ok(())
    }

    // ----- helpers; callers hold the edit lock ----------------------------

    async fn create_locked(
        &self,
        type_name: &str,
        id: Option<String>,
        config: &ConfigMap,
    ) -> Result<Arc<NodeInstance>> {
        let descriptor = self.core.registry.lookup(type_name)?;
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        if self.core.nodes.read().contains(&id) {
            return Err(EngineError::DuplicateId(id));
        }

        let node = NodeInstance::new(
            id,
            descriptor,
            self.core.settings.clone(),
            Arc::downgrade(&self.core),
        );
        node.replace_config(config).await?;
        self.core.nodes.write().insert(Arc::clone(&node));

        NodeCreated {
            node_id: node.id(),
            node_type: type_name,
        }
        .log();
        Ok(node)
    }

    /// Returns how many connections were removed with the node.
    async fn delete_locked(&self, id: &str) -> Result<usize> {
        let node = self.core.require(id)?;
        node.stop().await;
        let removed = self.core.connections.remove_all_for(id);
        self.core.nodes.write().remove(id);

        NodeDeleted {
            node_id: id,
            removed_connections: removed.len(),
        }
        .log();
        Ok(removed.len())
    }

    /// Apply a complete new config. Returns whether the node was restarted.
    async fn reconfigure_locked(&self, node: &Arc<NodeInstance>, candidate: &ConfigMap) -> Result<bool> {
        let descriptor = Arc::clone(node.descriptor());
        descriptor
            .config_schema
            .validate(candidate)
            .map_err(|reasons| EngineError::InvalidConfig {
                node_id: node.id().to_string(),
                reasons,
            })?;

        let previous = node.config();
        let restart = node.is_running()
            && changed_keys(&previous, candidate).any(|key| descriptor.requires_restart(key));

        if restart {
            node.stop().await;
        }
        let applied = node.replace_config(candidate).await;
        if restart {
            node.start().await?;
        }
        let (before, after) = applied?;

        if after < before {
            self.core.connections.remove_outputs_beyond(node.id(), after);
        }
        Ok(restart)
    }

    /// Rebuild a node whose type changed, keeping its id and surviving edges.
    async fn replace_locked(
        &self,
        node: &Arc<NodeInstance>,
        record: &NodeRecord,
        running: bool,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let edges = self.core.connections.attached_to(node.id());
        self.delete_locked(node.id()).await?;

        let replacement = self
            .create_locked(&record.node_type, Some(record.id.clone()), &record.config)
            .await?;
        apply_record_fields(&replacement, record);

        for edge in edges {
            if let Err(error) = self.core.connections.add(edge.clone(), self.core.as_ref()) {
                report.rejected_connections.push((edge, error.to_string()));
            }
        }

        if running {
            if let Err(error) = replacement.start().await {
                report.start_failures.push((record.id.clone(), error.to_string()));
            }
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(cancel) = self.reporter.lock().take() {
            cancel.cancel();
        }
        for node in self.core.all_nodes() {
            node.cancel_worker();
        }
    }
}

fn apply_record_fields(node: &NodeInstance, record: &NodeRecord) {
    if !record.name.is_empty() {
        node.set_name(record.name.clone());
    }
    node.set_enabled(record.enabled);
    node.set_position(record.position);
}

/// Keys whose value differs between two configs, including added and removed keys.
fn changed_keys<'a>(before: &'a ConfigMap, after: &'a ConfigMap) -> impl Iterator<Item = &'a String> {
    let changed_or_removed = before
        .iter()
        .filter(move |(key, value)| after.get(*key) != Some(*value))
        .map(|(key, _)| key);
    let added = after.keys().filter(move |key| !before.contains_key(*key));
    changed_or_removed.chain(added)
}

fn workflow_error(errors: Vec<ValidationError>) -> EngineError {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    EngineError::Workflow(messages.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_changed_keys() {
        let before = config(json!({"a": 1, "b": 2, "c": 3}));
        let after = config(json!({"a": 1, "b": 5, "d": 4}));

        let mut keys: Vec<&String> = changed_keys(&before, &after).collect();
        keys.sort();
        assert_eq!(keys, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_snapshot_serializes_type_key() {
        let snapshot = NodeSnapshot {
            id: "n1".to_string(),
            node_type: "debug".to_string(),
            name: "Debug".to_string(),
            config: ConfigMap::new(),
            enabled: true,
            state: LifecycleState::Stopped,
            input_count: 1,
            output_count: 0,
            position: None,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["type"], "debug");
        assert_eq!(value["outputCount"], 0);
        assert!(value.get("position").is_none());
    }
}
