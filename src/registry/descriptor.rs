// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Immutable description of a node type.
//!
//! A descriptor bundles everything the engine needs to know about a type:
//! palette metadata, config schema, default port counts, queueing policy, the
//! factory that builds a fresh behavior, and the explicit action table used by
//! editor buttons. Descriptors are shared as `Arc<NodeTypeDescriptor>` and never
//! mutated after construction.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::registry::schema::{ConfigSchema, FieldDescriptor};
use crate::traits::NodeBehavior;

/// What a node does with an inbound message while its worker is mid-callback.
///
/// There is deliberately no `Default`: every type states its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Enqueue up to the queue capacity
    Queue,
    /// Discard (and count) anything that arrives while processing
    DropWhileBusy,
}

/// How inbound messages reach the behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Bounded queue drained by the node's own worker
    #[default]
    Queued,
    /// Each message runs on a freshly spawned task with no queue and no bound.
    /// Intended for sinks where latency matters more than backpressure.
    ///
    /// Tasks race for the behavior lock, so messages may be handled out of
    /// arrival order. Use `Queued` when a node must see them in order.
    Direct,
}

/// Palette/editor presentation data. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualInfo {
    pub label: String,
    pub category: String,
    pub color: String,
    pub icon: String,
}

impl VisualInfo {
    pub fn new(label: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}

/// Builds a fresh, unconfigured behavior for a new instance.
pub type NodeFactory = Arc<dyn Fn() -> Box<dyn NodeBehavior> + Send + Sync>;

type ActionFn = dyn Fn(&mut dyn NodeBehavior, &NodeContext, Option<Value>) -> Result<Option<Value>, BehaviorError>
    + Send
    + Sync;

/// A named zero/one-argument operation an editor can trigger on an instance.
#[derive(Clone)]
pub struct NodeAction {
    pub name: String,
    pub takes_argument: bool,
    run: Arc<ActionFn>,
}

impl NodeAction {
    /// An action that only needs the node's context (config, send, identity).
    pub fn new<F>(name: impl Into<String>, takes_argument: bool, run: F) -> Self
    where
        F: Fn(&NodeContext, Option<Value>) -> Result<Option<Value>, BehaviorError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            takes_argument,
            run: Arc::new(move |_behavior, ctx, arg| run(ctx, arg)),
        }
    }

    /// An action that operates on the concrete behavior type `B`.
    ///
    /// `B` must return `Some(self)` from `as_any_mut`.
    pub fn on_behavior<B, F>(name: impl Into<String>, takes_argument: bool, run: F) -> Self
    where
        B: NodeBehavior + 'static,
        F: Fn(&mut B, &NodeContext, Option<Value>) -> Result<Option<Value>, BehaviorError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let action_name = name.clone();
        Self {
            name,
            takes_argument,
            run: Arc::new(move |behavior, ctx, arg| {
                let concrete = behavior
                    .as_any_mut()
                    .and_then(|any| any.downcast_mut::<B>())
                    .ok_or_else(|| BehaviorError::ActionMismatch(action_name.clone()))?;
                run(concrete, ctx, arg)
            }),
        }
    }

    pub(crate) fn invoke(
        &self,
        behavior: &mut dyn NodeBehavior,
        ctx: &NodeContext,
        arg: Option<Value>,
    ) -> Result<Option<Value>, BehaviorError> {
        (self.run)(behavior, ctx, arg)
    }
}

impl fmt::Debug for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeAction")
            .field("name", &self.name)
            .field("takes_argument", &self.takes_argument)
            .finish()
    }
}

pub struct NodeTypeDescriptor {
    pub type_name: String,
    pub visual: VisualInfo,
    pub config_schema: ConfigSchema,
    pub input_count: usize,
    pub output_count: usize,
    pub busy_policy: BusyPolicy,
    pub dispatch: DispatchMode,
    /// Config keys whose change only takes effect after a restart
    pub restart_on: Vec<String>,
    /// Instances receive every broadcast error record
    pub error_sink: bool,
    actions: Vec<NodeAction>,
    factory: NodeFactory,
}

impl NodeTypeDescriptor {
    /// Start describing a type. The busy policy is required up front.
    pub fn builder<F>(type_name: impl Into<String>, busy_policy: BusyPolicy, factory: F) -> DescriptorBuilder
    where
        F: Fn() -> Box<dyn NodeBehavior> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        DescriptorBuilder {
            descriptor: NodeTypeDescriptor {
                visual: VisualInfo::new(type_name.clone(), "general"),
                type_name,
                config_schema: ConfigSchema::default(),
                input_count: 1,
                output_count: 1,
                busy_policy,
                dispatch: DispatchMode::Queued,
                restart_on: Vec::new(),
                error_sink: false,
                actions: Vec::new(),
                factory: Arc::new(factory),
            },
        }
    }

    pub fn create_behavior(&self) -> Box<dyn NodeBehavior> {
        (self.factory)()
    }

    pub fn action(&self, name: &str) -> Option<&NodeAction> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn actions(&self) -> &[NodeAction] {
        &self.actions
    }

    pub fn requires_restart(&self, changed_key: &str) -> bool {
        self.restart_on.iter().any(|k| k == changed_key)
    }

    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            type_name: self.type_name.clone(),
            visual: self.visual.clone(),
            config_schema: self.config_schema.clone(),
            input_count: self.input_count,
            output_count: self.output_count,
            busy_policy: self.busy_policy,
            dispatch: self.dispatch,
            restart_on: self.restart_on.clone(),
            error_sink: self.error_sink,
            actions: self.actions.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

impl fmt::Debug for NodeTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeDescriptor")
            .field("type_name", &self.type_name)
            .field("input_count", &self.input_count)
            .field("output_count", &self.output_count)
            .field("busy_policy", &self.busy_policy)
            .field("dispatch", &self.dispatch)
            .field("error_sink", &self.error_sink)
            .field("actions", &self.actions)
            .finish()
    }
}

/// Serializable view of a descriptor for palette/API listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorSummary {
    pub type_name: String,
    pub visual: VisualInfo,
    pub config_schema: ConfigSchema,
    pub input_count: usize,
    pub output_count: usize,
    pub busy_policy: BusyPolicy,
    pub dispatch: DispatchMode,
    pub restart_on: Vec<String>,
    pub error_sink: bool,
    pub actions: Vec<String>,
}

pub struct DescriptorBuilder {
    descriptor: NodeTypeDescriptor,
}

impl DescriptorBuilder {
    pub fn visual(mut self, visual: VisualInfo) -> Self {
        self.descriptor.visual = visual;
        self
    }

    pub fn inputs(mut self, count: usize) -> Self {
        self.descriptor.input_count = count;
        self
    }

    pub fn outputs(mut self, count: usize) -> Self {
        self.descriptor.output_count = count;
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.descriptor.config_schema.fields.push(field);
        self
    }

    pub fn dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.descriptor.dispatch = dispatch;
        self
    }

    pub fn restart_on(mut self, key: impl Into<String>) -> Self {
        self.descriptor.restart_on.push(key.into());
        self
    }

    pub fn error_sink(mut self) -> Self {
        self.descriptor.error_sink = true;
        self
    }

    /// Register an action; a later action with the same name replaces it.
    pub fn action(mut self, action: NodeAction) -> Self {
        self.descriptor.actions.retain(|a| a.name != action.name);
        self.descriptor.actions.push(action);
        self
    }

    pub fn build(self) -> NodeTypeDescriptor {
        self.descriptor
    }
}
