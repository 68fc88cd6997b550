// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025-2026 JR Morton

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber, logging to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. "info" or
/// "auditfeed=debug") is used. Calling this twice is harmless.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
