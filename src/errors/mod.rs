// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod behavior;
mod config;
mod engine;

pub use behavior::{BehaviorError, DropReason};
pub use config::ValidationError;
pub use engine::{EngineError, Result};
