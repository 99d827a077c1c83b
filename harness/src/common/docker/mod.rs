//! # DockHarness Docker Module (`common::docker`)
//!
//! File: harness/src/common/docker/mod.rs
//!
//! ## Overview
//!
//! Everything that talks to the container engine. Higher layers hold an
//! `Arc<dyn ContainerEngine>`; only `engine` and `connect` know about bollard's
//! client type.
//!
//! - **`engine`**: the `ContainerEngine` seam and its bollard-backed `DockerEngine`.
//! - **`connect`**: builds a client from `EngineConfig` and verifies it with a ping.
//! - **`images`**: image existence, pull with verification, deletion.
//! - **`ports`**: turns a requested port map into exposed ports and host bindings.
//! - **`state`**: running checks and container lookups by name or id.
//! - **`collision`**: clears a container name before creation.
//! - **`descriptor`**: `ContainerDescriptor`, the requested configuration.
//! - **`lifecycle`**: `Container`, which starts, stops, kills and cleans up.
//!

pub mod collision;
pub mod connect;
pub mod descriptor;
pub mod engine;
pub mod images;
pub mod lifecycle;
pub mod ports;
pub mod state;

#[cfg(test)]
pub(crate) mod fake;

pub use descriptor::ContainerDescriptor;
pub use engine::{ContainerEngine, DockerEngine};
pub use lifecycle::{Container, LifecycleOptions, Phase};
