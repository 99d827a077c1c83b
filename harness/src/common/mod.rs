//! # DockHarness Common Utilities Module (`common`)
//!
//! File: harness/src/common/mod.rs
//!
//! Shared building blocks used by the library API and the CLI commands.
//!

/// Container engine access and the container lifecycle.
pub mod docker;
/// Host-side network helpers (free port discovery).
pub mod network;
