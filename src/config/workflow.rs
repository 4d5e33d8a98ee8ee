// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::engine::Connection;
use crate::errors::{EngineError, Result};
use crate::registry::ConfigMap;

/// Serializable description of a whole graph.
///
/// This is the record an editor saves and the engine rebuilds a live graph
/// from. Exporting a live graph and loading the result into a fresh engine
/// yields the same nodes and connections.
///
/// # Example
/// ```yaml
/// nodes:
///   - id: tick
///     type: inject
///     name: Tick
///     config:
///       payload: 10
///       topic: t
///     position: { x: 120, y: 80 }
///   - id: log
///     type: debug
/// connections:
///   - source: tick
///     sourceOutput: 0
///     target: log
///     targetInput: 0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// One node of a workflow record.
///
/// `position` is editor metadata; the engine stores it but never reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

fn enabled_by_default() -> bool {
    true
}

impl NodeRecord {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: String::new(),
            config: ConfigMap::new(),
            enabled: true,
            position: None,
        }
    }

    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordFormat {
    Yaml,
    Json,
}

impl RecordFormat {
    /// `.json` is JSON; everything else is treated as YAML.
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RecordFormat::Json,
            _ => RecordFormat::Yaml,
        }
    }
}

impl WorkflowRecord {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn node(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Load a workflow record from a YAML or JSON file (chosen by extension).
pub fn load_workflow<P: AsRef<Path>>(path: P) -> Result<WorkflowRecord> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    match RecordFormat::from_path(path) {
        RecordFormat::Json => WorkflowRecord::from_json_str(&content),
        RecordFormat::Yaml => WorkflowRecord::from_yaml_str(&content),
    }
}

/// Load a workflow record and validate its structure.
///
/// Rejects duplicate node ids and connections that reference missing nodes.
/// Whether the referenced node types exist is checked later, against the
/// registry of the engine the record is loaded into.
pub fn load_and_validate_workflow<P: AsRef<Path>>(path: P) -> Result<WorkflowRecord> {
    let record = load_workflow(path)?;

    if let Err(validation_errors) = crate::config::validate_workflow(&record) {
        let error_messages: Vec<String> = validation_errors.iter().map(|e| e.to_string()).collect();
        return Err(EngineError::Workflow(error_messages.join("\n")));
    }

    Ok(record)
}

/// Save a workflow record as YAML or JSON (chosen by extension).
pub fn save_workflow<P: AsRef<Path>>(record: &WorkflowRecord, path: P) -> Result<()> {
    let path = path.as_ref();
    let content = match RecordFormat::from_path(path) {
        RecordFormat::Json => record.to_json_string()?,
        RecordFormat::Yaml => record.to_yaml_string()?,
    };
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_basic_workflow() {
        let yaml = r#"
nodes:
  - id: tick
    type: inject
    config:
      payload: 10
  - id: log
    type: debug
    enabled: false
    position: { x: 1.5, y: 2 }
connections:
  - source: tick
    sourceOutput: 0
    target: log
    targetInput: 0
"#;

        let record = WorkflowRecord::from_yaml_str(yaml).unwrap();
        assert_eq!(record.nodes.len(), 2);
        assert_eq!(record.nodes[0].node_type, "inject");
        assert!(record.nodes[0].enabled);
        assert_eq!(record.nodes[0].config["payload"], json!(10));
        assert!(!record.nodes[1].enabled);
        assert_eq!(record.nodes[1].position, Some(Position { x: 1.5, y: 2.0 }));
        assert_eq!(record.connections, vec![Connection::new("tick", 0, "log", 0)]);
    }

    #[test]
    fn parse_json_workflow_uses_camel_case_edges() {
        let content = r#"{
            "nodes": [{"id": "a", "type": "inject"}, {"id": "b", "type": "debug"}],
            "connections": [{"source": "a", "sourceOutput": 0, "target": "b", "targetInput": 0}]
        }"#;

        let record = WorkflowRecord::from_json_str(content).unwrap();
        assert_eq!(record.connections[0].target, "b");
        assert_eq!(record.node("a").unwrap().name, "");
    }

    #[test]
    fn test_record_format_by_extension() {
        let cases = vec![
            ("flow.json", RecordFormat::Json),
            ("flow.JSON", RecordFormat::Json),
            ("flow.yaml", RecordFormat::Yaml),
            ("flow.yml", RecordFormat::Yaml),
            ("flow", RecordFormat::Yaml),
        ];
        for (path, expected) in cases {
            assert_eq!(RecordFormat::from_path(Path::new(path)), expected, "{}", path);
        }
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let result = WorkflowRecord::from_yaml_str("nodes:\n  - id: a\n");
        assert!(matches!(result, Err(EngineError::Yaml(_))));
    }
}
