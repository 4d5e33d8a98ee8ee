// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod behavior;

pub use behavior::{NodeBehavior, Reconfigured};
