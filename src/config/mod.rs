// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod settings;
mod validation;
mod workflow;

pub mod consts;

pub use settings::EngineSettings;
pub use validation::validate_workflow;
pub use workflow::{
    load_and_validate_workflow, load_workflow, save_workflow, NodeRecord, Position, WorkflowRecord,
};
