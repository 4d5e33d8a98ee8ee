// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A live node instance and its worker.
//!
//! Every queued instance owns a bounded `tokio::sync::mpsc` channel and, while
//! running, exactly one worker task draining it. `receive` is the only inbound
//! entry point and never blocks: a full queue, a disabled node or a busy
//! drop-while-busy node discards the message and bumps a counter.
//!
//! The behavior sits behind a node-local `tokio::sync::Mutex`. Message
//! processing, `configure` and actions all take it, so a behavior never sees two
//! calls at once. Everything except message processing waits at most the stop
//! timeout for it. Errors and panics raised by a callback are caught at the
//! worker boundary and broadcast; the worker keeps going.
//!
//! Stopping cancels the worker's token and joins it with a bounded wait. A
//! worker stuck inside a callback past that bound is logged and left detached.
//! The next `start` waits the same bound for that worker to exit and fails
//! with `StartFailed` if it is still stuck; `configure` fails with `Busy`.

use chrono::Utc;
use futures_util::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::{EngineSettings, Position};
use crate::engine::context::NodeContext;
use crate::engine::error_channel::ErrorRecord;
use crate::engine::runtime::EngineCore;
use crate::engine::telemetry::NodeTelemetry;
use crate::errors::{BehaviorError, DropReason, EngineError, Result};
use crate::message::Message;
use crate::observability::messages::node::{
    BehaviorFailed, MessageDropped, NodeAlreadyRunning, NodeReconfigured, NodeStartRefused,
    NodeStarted, NodeStopTimedOut, NodeStopped,
};
use crate::observability::messages::StructuredLog;
use crate::registry::{BusyPolicy, ConfigMap, DispatchMode, NodeAction, NodeTypeDescriptor};
use crate::traits::NodeBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Lock-free counters read by telemetry.
#[derive(Debug, Default)]
pub(crate) struct NodeCounters {
    /// Backpressure drops: full queue or busy
    pub(crate) dropped: AtomicU64,
    pub(crate) disabled_drops: AtomicU64,
    /// Arrivals while the node had no worker
    pub(crate) idle_drops: AtomicU64,
    /// Messages handed to the behavior, whether or not it succeeded
    pub(crate) processed: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) processing: AtomicBool,
}

struct Delivery {
    message: Message,
    input: usize,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct NodeInstance {
    id: String,
    descriptor: Arc<NodeTypeDescriptor>,
    settings: EngineSettings,
    name: RwLock<String>,
    position: RwLock<Option<Position>>,
    config: RwLock<ConfigMap>,
    enabled: AtomicBool,
    output_count: AtomicUsize,
    state: Mutex<LifecycleState>,
    behavior: tokio::sync::Mutex<Box<dyn NodeBehavior>>,
    inbox: RwLock<Option<mpsc::Sender<Delivery>>>,
    running: AtomicBool,
    worker: Mutex<Option<Worker>>,
    /// Worker left behind by a stop that timed out
    detached: Mutex<Option<JoinHandle<()>>>,
    pub(crate) counters: NodeCounters,
    core: Weak<EngineCore>,
}

impl NodeInstance {
    pub(crate) fn new(
        id: String,
        descriptor: Arc<NodeTypeDescriptor>,
        settings: EngineSettings,
        core: Weak<EngineCore>,
    ) -> Arc<Self> {
        let behavior = descriptor.create_behavior();
        Arc::new(Self {
            name: RwLock::new(descriptor.visual.label.clone()),
            output_count: AtomicUsize::new(descriptor.output_count),
            config: RwLock::new(descriptor.config_schema.defaults()),
            id,
            settings,
            position: RwLock::new(None),
            enabled: AtomicBool::new(true),
            state: Mutex::new(LifecycleState::Stopped),
            behavior: tokio::sync::Mutex::new(behavior),
            inbox: RwLock::new(None),
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
            detached: Mutex::new(None),
            counters: NodeCounters::default(),
            core,
            descriptor,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn descriptor(&self) -> &Arc<NodeTypeDescriptor> {
        &self.descriptor
    }

    pub fn node_type(&self) -> &str {
        &self.descriptor.type_name
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    pub fn position(&self) -> Option<Position> {
        *self.position.read()
    }

    pub(crate) fn set_position(&self, position: Option<Position>) {
        *self.position.write() = position;
    }

    pub fn config(&self) -> ConfigMap {
        self.config.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn input_count(&self) -> usize {
        self.descriptor.input_count
    }

    pub fn output_count(&self) -> usize {
        self.output_count.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_processing(&self) -> bool {
        self.counters.processing.load(Ordering::Acquire)
    }

    pub(crate) fn core(&self) -> Option<Arc<EngineCore>> {
        self.core.upgrade()
    }

    fn queue_depth(&self) -> usize {
        self.inbox
            .read()
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    fn drop_message(&self, reason: DropReason) -> bool {
        let counter = match reason {
            DropReason::Disabled => &self.counters.disabled_drops,
            DropReason::NotRunning => &self.counters.idle_drops,
            DropReason::QueueFull | DropReason::Busy => &self.counters.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        MessageDropped {
            node_id: &self.id,
            reason,
        }
        .log();
        false
    }

    /// Accept a message on input port `input`. Never blocks.
    ///
    /// Returns whether the message was accepted for processing.
    pub fn receive(self: &Arc<Self>, mut message: Message, input: usize) -> bool {
        if !self.is_enabled() {
            return self.drop_message(DropReason::Disabled);
        }

        match self.descriptor.dispatch {
            DispatchMode::Direct => {
                if !self.is_running() {
                    return self.drop_message(DropReason::NotRunning);
                }
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    return self.drop_message(DropReason::NotRunning);
                };
                message.stamp_arrival(0, Utc::now());
                let node = Arc::clone(self);
                runtime.spawn(async move { node.process(message, input).await });
                true
            }
            DispatchMode::Queued => {
                let Some(sender) = self.inbox.read().clone() else {
                    return self.drop_message(DropReason::NotRunning);
                };
                let queue_length = sender.max_capacity() - sender.capacity();

                if self.descriptor.busy_policy == BusyPolicy::DropWhileBusy
                    && (self.is_processing() || queue_length > 0)
                {
                    return self.drop_message(DropReason::Busy);
                }

                message.stamp_arrival(queue_length, Utc::now());
                match sender.try_send(Delivery { message, input }) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => self.drop_message(DropReason::QueueFull),
                    Err(TrySendError::Closed(_)) => self.drop_message(DropReason::NotRunning),
                }
            }
        }
    }

    /// Deliver a copy of `message` to every target of output port `output`.
    ///
    /// The edge list is snapshotted once; edits made during delivery apply to
    /// the next send. Returns how many targets accepted their copy.
    pub fn send(&self, mut message: Message, output: usize) -> usize {
        let Some(core) = self.core() else {
            return 0;
        };
        let targets = core.connections.outputs_of(&self.id, output);
        if targets.is_empty() {
            return 0;
        }

        message.stamp_emit(Utc::now());
        targets
            .into_iter()
            .filter_map(|(target_id, input)| core.node(&target_id).map(|node| (node, input)))
            .filter(|(node, input)| node.receive(message.clone(), *input))
            .count()
    }

    async fn process(self: &Arc<Self>, message: Message, input: usize) {
        let ctx = NodeContext::new(Arc::clone(self));
        let mut behavior = self.behavior.lock().await;

        self.counters.processing.store(true, Ordering::Release);
        let outcome = AssertUnwindSafe(behavior.on_input(&ctx, message, input))
            .catch_unwind()
            .await;
        self.counters.processing.store(false, Ordering::Release);
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        drop(behavior);

        if let Err(error) = flatten_outcome(outcome) {
            self.report_failure("input", &error);
        }
    }

    fn report_failure(&self, phase: &str, error: &BehaviorError) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        let text = error.to_string();
        BehaviorFailed {
            node_id: &self.id,
            phase,
            error: &text,
        }
        .log();

        if let Some(core) = self.core() {
            core.broadcast_error(ErrorRecord::new(self.id.clone(), self.name(), text));
        }
    }

    /// Transition `Stopped -> Running` and spawn the worker.
    ///
    /// Calling this on a node that is not stopped is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Stopped {
                NodeAlreadyRunning { node_id: &self.id }.log();
                return Ok(());
            }
            *state = LifecycleState::Starting;
        }

        if !self.reap_detached_worker().await {
            return Err(self.abort_start("previous worker is still stuck in a callback"));
        }

        let ctx = NodeContext::new(Arc::clone(self));
        let Ok(mut behavior) =
            tokio::time::timeout(self.settings.stop_timeout(), self.behavior.lock()).await
        else {
            return Err(self.abort_start("behavior is still locked by a callback"));
        };
        let hook = AssertUnwindSafe(behavior.on_start(&ctx)).catch_unwind().await;
        drop(behavior);
        if let Err(error) = flatten_outcome(hook) {
            *self.state.lock() = LifecycleState::Stopped;
            self.report_failure("start", &error);
            return Err(EngineError::StartFailed {
                node_id: self.id.clone(),
                reason: error.to_string(),
            });
        }

        let started = NodeStarted {
            node_id: &self.id,
            node_type: self.node_type(),
            queue_capacity: self.settings.queue_capacity(),
        };

        if self.descriptor.dispatch == DispatchMode::Queued {
            let (tx, rx) = mpsc::channel(self.settings.queue_capacity());
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(
                run_worker(
                    Arc::clone(self),
                    rx,
                    cancel.clone(),
                    self.settings.poll_interval(),
                )
                .instrument(started.span("worker")),
            );
            *self.inbox.write() = Some(tx);
            *self.worker.lock() = Some(Worker { cancel, handle });
        }

        self.running.store(true, Ordering::Release);
        *self.state.lock() = LifecycleState::Running;
        started.log();
        Ok(())
    }

    /// Wait up to the stop timeout for a worker left behind by an earlier stop.
    ///
    /// Returns false if it is still running; the handle is kept for the next try.
    async fn reap_detached_worker(&self) -> bool {
        let Some(mut handle) = self.detached.lock().take() else {
            return true;
        };
        if tokio::time::timeout(self.settings.stop_timeout(), &mut handle)
            .await
            .is_ok()
        {
            return true;
        }
        *self.detached.lock() = Some(handle);
        false
    }

    fn abort_start(&self, reason: &str) -> EngineError {
        *self.state.lock() = LifecycleState::Stopped;
        NodeStartRefused {
            node_id: &self.id,
            reason,
        }
        .log();
        EngineError::StartFailed {
            node_id: self.id.clone(),
            reason: reason.to_string(),
        }
    }

    /// Stop the worker, waiting at most the configured stop timeout.
    ///
    /// Safe to call on a stopped node. Messages still queued are discarded.
    pub async fn stop(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Running {
                return;
            }
            *state = LifecycleState::Stopping;
        }

        self.running.store(false, Ordering::Release);
        self.inbox.write().take();
        let worker = self.worker.lock().take();

        let timeout = self.settings.stop_timeout();
        let mut joined = true;
        if let Some(mut worker) = worker {
            worker.cancel.cancel();
            if tokio::time::timeout(timeout, &mut worker.handle).await.is_err() {
                joined = false;
                *self.detached.lock() = Some(worker.handle);
                NodeStopTimedOut {
                    node_id: &self.id,
                    timeout,
                }
                .log();
            }
        }

        if joined {
            let ctx = NodeContext::new(Arc::clone(self));
            match tokio::time::timeout(timeout, self.behavior.lock()).await {
                Ok(mut behavior) => behavior.on_stop(&ctx).await,
                Err(_) => NodeStopTimedOut {
                    node_id: &self.id,
                    timeout,
                }
                .log(),
            }
        }

        *self.state.lock() = LifecycleState::Stopped;
        NodeStopped {
            node_id: &self.id,
            processed: self.counters.processed.load(Ordering::Relaxed),
        }
        .log();
    }

    /// Signal the worker to exit without waiting for it. Used when the engine is dropped.
    pub(crate) fn cancel_worker(&self) {
        self.running.store(false, Ordering::Release);
        self.inbox.write().take();
        if let Some(worker) = self.worker.lock().as_ref() {
            worker.cancel.cancel();
        }
    }

    /// Merge `patch` into the current config and apply it.
    ///
    /// Returns the output count before and after.
    pub async fn configure(self: &Arc<Self>, patch: &ConfigMap) -> Result<(usize, usize)> {
        let mut merged = self.config();
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
        self.apply_config(merged).await
    }

    /// Replace the whole config, filling missing keys from schema defaults.
    pub(crate) async fn replace_config(self: &Arc<Self>, config: &ConfigMap) -> Result<(usize, usize)> {
        let merged = self.descriptor.config_schema.with_defaults(config);
        self.apply_config(merged).await
    }

    async fn apply_config(self: &Arc<Self>, config: ConfigMap) -> Result<(usize, usize)> {
        self.descriptor
            .config_schema
            .validate(&config)
            .map_err(|reasons| EngineError::InvalidConfig {
                node_id: self.id.clone(),
                reasons,
            })?;

        let Ok(mut behavior) =
            tokio::time::timeout(self.settings.stop_timeout(), self.behavior.lock()).await
        else {
            return Err(EngineError::Busy(self.id.clone()));
        };
        let reconfigured = behavior
            .configure(&config)
            .map_err(|error| EngineError::InvalidConfig {
                node_id: self.id.clone(),
                reasons: vec![error.to_string()],
            })?;

        let before = self.output_count();
        let after = reconfigured.output_count.unwrap_or(before);
        self.output_count.store(after, Ordering::Release);
        *self.config.write() = config;
        drop(behavior);

        NodeReconfigured {
            node_id: &self.id,
            output_count: after,
        }
        .log();
        Ok((before, after))
    }

    /// Record a config value the behavior changed on its own (e.g. a toggle action).
    pub(crate) fn store_config_value(&self, key: String, value: serde_json::Value) {
        self.config.write().insert(key, value);
    }

    pub(crate) async fn invoke_action(
        self: &Arc<Self>,
        action: &NodeAction,
        argument: Option<serde_json::Value>,
    ) -> std::result::Result<Option<serde_json::Value>, BehaviorError> {
        let ctx = NodeContext::new(Arc::clone(self));
        let Ok(mut behavior) =
            tokio::time::timeout(self.settings.stop_timeout(), self.behavior.lock()).await
        else {
            return Err(BehaviorError::failed("behavior is still busy in a callback"));
        };
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            action.invoke(&mut **behavior, &ctx, argument)
        }));
        drop(behavior);

        let result = flatten_outcome(outcome);
        if let Err(error) = &result {
            let text = error.to_string();
            BehaviorFailed {
                node_id: &self.id,
                phase: "action",
                error: &text,
            }
            .log();
        }
        result
    }

    pub fn telemetry(&self) -> NodeTelemetry {
        let queued = self.descriptor.dispatch == DispatchMode::Queued;
        NodeTelemetry {
            node_id: self.id.clone(),
            name: self.name(),
            node_type: self.node_type().to_string(),
            state: self.state(),
            enabled: self.is_enabled(),
            queue_depth: self.queue_depth(),
            queue_capacity: if queued { self.settings.queue_capacity() } else { 0 },
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            disabled_drops: self.counters.disabled_drops.load(Ordering::Relaxed),
            idle_drops: self.counters.idle_drops.load(Ordering::Relaxed),
            processed: self.counters.processed.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            processing: self.is_processing(),
        }
    }
}

async fn run_worker(
    node: Arc<NodeInstance>,
    mut inbox: mpsc::Receiver<Delivery>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout(poll_interval, inbox.recv()) => match next {
                Ok(Some(delivery)) => node.process(delivery.message, delivery.input).await,
                Ok(None) => break,
                // Poll timeout: loop to re-check the stop signal
                Err(_) => continue,
            },
        }
    }
}

fn flatten_outcome<T>(
    outcome: std::result::Result<std::result::Result<T, BehaviorError>, Box<dyn Any + Send>>,
) -> std::result::Result<T, BehaviorError> {
    match outcome {
        Ok(result) => result,
        Err(panic) => Err(BehaviorError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_extraction() {
        let from_str: Box<dyn Any + Send> = Box::new("static text");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned text"));
        let other: Box<dyn Any + Send> = Box::new(42_u8);

        assert_eq!(panic_message(from_str.as_ref()), "static text");
        assert_eq!(panic_message(from_string.as_ref()), "owned text");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }

    #[test]
    fn test_flatten_outcome() {
        let ok: std::result::Result<std::result::Result<u8, BehaviorError>, Box<dyn Any + Send>> =
            Ok(Ok(1));
        assert_eq!(flatten_outcome(ok), Ok(1));

        let panicked: std::result::Result<std::result::Result<u8, BehaviorError>, Box<dyn Any + Send>> =
            Err(Box::new("boom"));
        assert_eq!(
            flatten_outcome(panicked),
            Err(BehaviorError::Panicked("boom".to_string()))
        );
    }
}
