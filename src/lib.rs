// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;        // settings + workflow records
pub mod engine;        // live graph, workers, redeploy
pub mod errors;        // error handling
pub mod message;       // the value that flows along edges
pub mod nodes;         // built-in node types
pub mod observability; // structured log messages
pub mod registry;      // node type descriptors
pub mod traits;        // node behavior contract
