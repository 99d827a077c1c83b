//! # DockHarness
//!
//! File: harness/src/lib.rs
//!
//! ## Overview
//!
//! Disposable Docker containers for integration tests. Describe a container
//! with a `ContainerDescriptor`, bind it to an engine as a `Container`, then
//! `start` it, read the host ports it was given, and `cleanup` when done:
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use dockharness::{connect_engine, load_config, Container, ContainerDescriptor, LifecycleOptions};
//!
//! # async fn example() -> dockharness::Result<()> {
//! let config = load_config()?;
//! let engine = connect_engine(&config.engine).await?;
//! let redis = Container::new(
//!     engine,
//!     ContainerDescriptor::new("it-redis", "redis", "7", HashMap::new(), HashMap::new()).expose("6379"),
//! )
//! .with_options(LifecycleOptions::from(&config.lifecycle));
//!
//! let ports = redis.start().await?;
//! // ... run tests against localhost:{ports["6379"]} ...
//! redis.stop(config.lifecycle.stop_wait_secs).await?;
//! redis.cleanup().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The `dockharness` binary wraps the same API for manual use.
//!

pub mod common;
pub mod core;

pub use crate::common::docker::connect::connect_engine;
pub use crate::common::docker::{
    Container, ContainerDescriptor, ContainerEngine, DockerEngine, LifecycleOptions, Phase,
};
pub use crate::core::config::{load_config, CollisionPolicy, HarnessConfig, LateStopErrorPolicy};
pub use crate::core::error::{HarnessError, Result};
