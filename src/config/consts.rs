// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default inbound queue capacity per node
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
/// How long a worker waits on its queue before re-checking the stop signal
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
/// Upper bound on joining a worker during `stop`
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 2000;
/// Buffered error records per subscriber before the slowest one starts lagging
pub const DEFAULT_ERROR_CHANNEL_CAPACITY: usize = 256;
/// Buffered telemetry frames per subscriber
pub const TELEMETRY_CHANNEL_CAPACITY: usize = 16;
