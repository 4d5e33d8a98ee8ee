// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test-only node behaviors and helpers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::EngineSettings;
use crate::engine::NodeContext;
use crate::errors::BehaviorError;
use crate::message::Message;
use crate::registry::{BusyPolicy, DescriptorBuilder, NodeTypeDescriptor};
use crate::traits::NodeBehavior;

#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub node_id: String,
    pub input: usize,
    pub message: Message,
}

pub(crate) type Log = Arc<Mutex<Vec<Received>>>;

pub(crate) fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Configurable test behavior: records what it receives and can block, fail,
/// panic, mutate its copy or forward it.
#[derive(Clone)]
pub(crate) struct Recorder {
    log: Log,
    gate: Option<Arc<Semaphore>>,
    fail_on: Option<usize>,
    panic_on: Option<usize>,
    mutate: bool,
    forward: bool,
    refuse_start: bool,
    seen: usize,
}

impl Recorder {
    pub(crate) fn new(log: &Log) -> Self {
        Self {
            log: Arc::clone(log),
            gate: None,
            fail_on: None,
            panic_on: None,
            mutate: false,
            forward: false,
            refuse_start: false,
            seen: 0,
        }
    }

    /// Block each message until the test adds a permit.
    pub(crate) fn gated(mut self, gate: &Arc<Semaphore>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }

    /// Fail the n-th message (1-based).
    pub(crate) fn failing_on(mut self, n: usize) -> Self {
        self.fail_on = Some(n);
        self
    }

    pub(crate) fn panicking_on(mut self, n: usize) -> Self {
        self.panic_on = Some(n);
        self
    }

    /// Scribble on the payload before recording it.
    pub(crate) fn mutating(mut self) -> Self {
        self.mutate = true;
        self
    }

    pub(crate) fn forwarding(mut self) -> Self {
        self.forward = true;
        self
    }

    /// Make `on_start` return an error.
    pub(crate) fn failing_start(mut self) -> Self {
        self.refuse_start = true;
        self
    }

    pub(crate) fn descriptor(self, type_name: &str, busy_policy: BusyPolicy) -> DescriptorBuilder {
        NodeTypeDescriptor::builder(type_name, busy_policy, move || Box::new(self.clone()))
    }
}

#[async_trait]
impl NodeBehavior for Recorder {
    async fn on_input(&mut self, ctx: &NodeContext, mut message: Message, input: usize) -> Result<(), BehaviorError> {
        self.seen += 1;
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| BehaviorError::failed(e.to_string()))?
                .forget();
        }
        if self.panic_on == Some(self.seen) {
            panic!("recorder panicked on message {}", self.seen);
        }
        if self.fail_on == Some(self.seen) {
            return Err(BehaviorError::failed(format!("recorder failed on message {}", self.seen)));
        }
        if self.mutate {
            message.payload = serde_json::json!({"mutated_by": ctx.node_id()});
        }
        self.log.lock().push(Received {
            node_id: ctx.node_id().to_string(),
            input,
            message: message.clone(),
        });
        if self.forward {
            ctx.send(message, 0);
        }
        Ok(())
    }

    async fn on_start(&mut self, _ctx: &NodeContext) -> Result<(), BehaviorError> {
        if self.refuse_start {
            return Err(BehaviorError::failed("recorder refused to start"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Settings tuned for fast tests.
pub(crate) fn fast_settings() -> EngineSettings {
    EngineSettings {
        poll_interval_ms: 5,
        stop_timeout_ms: 500,
        ..Default::default()
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub(crate) async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `future` with a generous upper bound so a hung test fails instead of stalling.
pub(crate) async fn within<T>(future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(Duration::from_secs(10), future).await {
        Ok(value) => value,
        Err(_) => panic!("test operation timed out"),
    }
}
