//! # DockHarness Network Utilities Module (`common::network`)
//!
//! File: harness/src/common/network/mod.rs
//!
//! Host-side network helpers. Currently this is the free port probe used when
//! a container port is requested with "any" as its host port.
//!
//! - **`discovery`**: `PortSource` trait and the kernel-backed `SystemPortSource`.
//!

/// Free TCP port discovery.
pub mod discovery;
