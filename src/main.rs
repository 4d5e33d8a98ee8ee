// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context};
use std::env;
use std::time::Duration;
use the_switchyard::config::{load_and_validate_workflow, EngineSettings};
use the_switchyard::engine::Engine;
use the_switchyard::nodes::inject;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_RUN_SECONDS: u64 = 5;

fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [--settings <settings.toml>] <workflow.yaml|json> [run_seconds]\n\
         Example: {program} demos/threshold-alerts.yaml 3"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let settings = match args.iter().position(|a| a == "--settings") {
        Some(index) => {
            let Some(path) = args.get(index + 1).cloned() else {
                bail!(usage(&program));
            };
            args.drain(index..=index + 1);
            EngineSettings::load(&path).with_context(|| format!("loading settings from {path}"))?
        }
        None => EngineSettings::default(),
    };

    let Some(workflow_path) = args.first() else {
        bail!(usage(&program));
    };
    let run_for = match args.get(1) {
        Some(raw) => raw.parse::<u64>().context("run_seconds must be a whole number")?,
        None => DEFAULT_RUN_SECONDS,
    };

    let workflow = load_and_validate_workflow(workflow_path)
        .with_context(|| format!("loading workflow {workflow_path}"))?;

    let engine = Engine::with_builtin_types(settings);
    engine.load_workflow(&workflow).await?;

    let mut errors = engine.subscribe_errors();
    tokio::spawn(async move {
        while let Ok(record) = errors.recv().await {
            tracing::warn!(source = %record.source_node_id, "{}", record.message);
        }
    });

    let report = engine.start_all().await;
    for (node_id, reason) in &report.failures {
        tracing::error!(node_id = %node_id, "failed to start: {}", reason);
    }

    // Fire every inject node once so the graph has something to do
    for node in engine.list_nodes() {
        if node.node_type == inject::TYPE_NAME {
            if let Err(e) = engine.invoke_action(&node.id, "inject", None).await {
                tracing::warn!("{}", e);
            }
        }
    }

    tokio::time::sleep(Duration::from_secs(run_for)).await;

    for stats in engine.telemetry() {
        tracing::info!(
            node_id = %stats.node_id,
            node_type = %stats.node_type,
            processed = stats.processed,
            dropped = stats.dropped,
            failures = stats.failures,
            "node summary"
        );
    }

    engine.stop_all().await;
    Ok(())
}
