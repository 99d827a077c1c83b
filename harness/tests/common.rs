//! # DockHarness Integration Test Common Helpers
//!
//! File: harness/tests/common.rs
//!
//! Shared helpers for the integration test crates in `harness/tests/`.
//!

// Each test crate uses a different subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

pub use assert_cmd::Command;
use dockharness::core::config::EngineConfig;
use dockharness::{connect_engine, ContainerEngine};

/// Image used by the daemon-backed tests. Small, and listens on a port.
pub const TEST_IMAGE: &str = "redis";
pub const TEST_TAG: &str = "7-alpine";

/// An `assert_cmd::Command` for the compiled `dockharness` binary.
pub fn dockharness_cmd() -> Command {
    Command::cargo_bin("dockharness").expect("Failed to find dockharness binary for testing")
}

/// Connects to the local daemon with default settings.
pub async fn engine() -> Arc<dyn ContainerEngine> {
    connect_engine(&EngineConfig::default())
        .await
        .expect("Docker daemon not reachable")
}

pub fn no_env() -> HashMap<String, String> {
    HashMap::new()
}
