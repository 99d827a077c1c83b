//! # DockHarness Docker Connection Helper
//!
//! File: harness/src/common/docker/connect.rs
//!
//! ## Overview
//!
//! Establishes the connection to the Docker daemon and hands it out as an
//! injectable engine (`Arc<dyn ContainerEngine>`). Connection settings come
//! from `core::config::EngineConfig`: an explicit unix socket when one is
//! configured, otherwise bollard's local defaults (which honour `DOCKER_HOST`).
//!
//! ```rust,no_run
//! use dockharness::common::docker::connect::connect_engine;
//! use dockharness::core::config::EngineConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = connect_engine(&EngineConfig::default()).await?;
//! let running = engine.list_containers(false).await?;
//! println!("{} running containers", running.len());
//! # Ok(())
//! # }
//! ```
//!
use crate::core::config::EngineConfig;
use crate::core::error::{HarnessError, Result};
use anyhow::{anyhow, Context};
use bollard::Docker;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::engine::{ContainerEngine, DockerEngine};

/// Connects to the Docker daemon described by `config`.
///
/// # Errors
///
/// Returns `HarnessError::DockerApi` if the client cannot be constructed, with
/// context suggesting the daemon may not be running. Bollard connects lazily,
/// so an unreachable daemon usually surfaces on the first request instead.
#[instrument(skip(config), fields(socket = ?config.socket))]
pub async fn connect_docker(config: &EngineConfig) -> Result<Docker> {
    let docker = match &config.socket {
        Some(socket) => {
            debug!("Connecting to Docker via socket {}", socket);
            Docker::connect_with_socket(socket, config.timeout_secs, bollard::API_DEFAULT_VERSION)
        }
        None => {
            debug!("Connecting to Docker with local defaults");
            Docker::connect_with_local_defaults()
                .map(|docker| docker.with_timeout(std::time::Duration::from_secs(config.timeout_secs)))
        }
    };
    docker
        .map_err(|e| anyhow!(HarnessError::DockerApi { source: e }))
        .context("Failed to connect to Docker daemon. Is it running and accessible?")
}

/// Connects and wraps the client as a shareable engine.
pub async fn connect_engine(config: &EngineConfig) -> Result<Arc<dyn ContainerEngine>> {
    let docker = connect_docker(config).await?;
    Ok(Arc::new(DockerEngine::new(docker)))
}
