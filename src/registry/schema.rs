// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration schemas attached to node type descriptors.
//!
//! A schema is an ordered list of field descriptors. The editor uses it to
//! render a form; the engine uses it to fill in defaults at creation and to
//! reject bad values before a behavior ever sees them.
//!
//! Fields can carry a visibility predicate referencing another field's value
//! (`visible_when`). A hidden field is not validated, since the editor would not
//! have shown it to the user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value config record of a node instance.
pub type ConfigMap = Map<String, Value>;

/// The UI widget a field is edited with, which also implies its value shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    /// One of `constraints.options`
    Select,
    List,
    /// Any JSON value
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraints {
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
}

/// Show a field only while another field holds a given value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    pub field: String,
    pub equals: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub constraints: FieldConstraints,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<Visibility>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            default: default.into(),
            constraints: FieldConstraints::default(),
            visible_when: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.constraints.required = true;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints.min = min;
        self.constraints.max = max;
        self
    }

    pub fn options<I, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraints.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn visible_when(mut self, field: impl Into<String>, equals: impl Into<Value>) -> Self {
        self.visible_when = Some(Visibility {
            field: field.into(),
            equals: equals.into(),
        });
        self
    }

    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let value = match value {
            None | Some(Value::Null) if self.constraints.required => {
                return Err(format!("'{}' is required", self.name));
            }
            None | Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };

        let shape_ok = match self.kind {
            FieldKind::Text => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::List => value.is_array(),
            FieldKind::Select | FieldKind::Json => true,
        };
        if !shape_ok {
            return Err(format!("'{}' must be a {:?} value, got {}", self.name, self.kind, value));
        }

        if let Some(number) = value.as_f64() {
            if let Some(min) = self.constraints.min {
                if number < min {
                    return Err(format!("'{}' must be >= {}, got {}", self.name, min, number));
                }
            }
            if let Some(max) = self.constraints.max {
                if number > max {
                    return Err(format!("'{}' must be <= {}, got {}", self.name, max, number));
                }
            }
        }

        if !self.constraints.options.is_empty() && !self.constraints.options.contains(value) {
            return Err(format!("'{}' must be one of {:?}, got {}", self.name, self.constraints.options, value));
        }

        Ok(())
    }
}

/// Ordered field list describing a node type's config record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub fields: Vec<FieldDescriptor>,
}

impl ConfigSchema {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Default value of every field.
    pub fn defaults(&self) -> ConfigMap {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect()
    }

    /// Overlay `config` on the schema defaults.
    pub fn with_defaults(&self, config: &ConfigMap) -> ConfigMap {
        let mut merged = self.defaults();
        for (key, value) in config {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    pub fn is_visible(&self, field: &FieldDescriptor, config: &ConfigMap) -> bool {
        match &field.visible_when {
            None => true,
            Some(predicate) => config.get(&predicate.field) == Some(&predicate.equals),
        }
    }

    /// Check every visible field; returns all violations, not just the first.
    ///
    /// Keys not described by the schema are allowed through untouched.
    pub fn validate(&self, config: &ConfigMap) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .fields
            .iter()
            .filter(|field| self.is_visible(field, config))
            .filter_map(|field| field.check(config.get(&field.name)).err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
