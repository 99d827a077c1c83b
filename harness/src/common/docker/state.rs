//! # DockHarness Docker State Querying
//!
//! File: harness/src/common/docker/state.rs
//!
//! ## Overview
//!
//! Read-only queries against the engine: is a container running, which
//! container holds a given name, which named volumes a container has mounted.
//!
//! - **`container_running`**: inspects by id; a 404 is `Ok(false)` since the
//!   container may have been removed out-of-band.
//! - **`find_by_name`** / **`find_by_id`**: scan a container listing. Engine
//!   names carry a leading `/`, which is ignored when comparing.
//! - **`mounted_volumes`**: named volumes of a listed container. Bind mounts
//!   carry no volume name and are skipped.
//!
use crate::core::error::{is_not_found, HarnessError, Result};
use anyhow::{anyhow, Context};
use bollard::models::{ContainerInspectResponse, ContainerSummary, MountPoint};
use tracing::{debug, error, instrument};

use super::engine::ContainerEngine;

/// Checks whether the container with `id` exists and is running.
///
/// # Errors
///
/// `HarnessError::DockerApi` if inspection fails for a reason other than 404.
#[instrument(skip(engine), fields(container = %id))]
pub async fn container_running(engine: &dyn ContainerEngine, id: &str) -> Result<bool> {
    match engine.inspect_container(id).await {
        Ok(details) => {
            let is_running = details
                .state
                .is_some_and(|s| s.running.unwrap_or(false));
            debug!("Container '{}' running status: {}", id, is_running);
            Ok(is_running)
        }
        Err(e) if is_not_found(&e) => {
            debug!("Container '{}' not found, thus not running.", id);
            Ok(false)
        }
        Err(e) => {
            error!("Error checking running status for container '{}': {:?}", id, e);
            Err(anyhow!(HarnessError::DockerApi { source: e }))
                .with_context(|| format!("Failed to inspect container '{}'", id))
        }
    }
}

/// Lists containers, wrapping engine errors.
pub async fn list_containers(
    engine: &dyn ContainerEngine,
    all: bool,
) -> Result<Vec<ContainerSummary>> {
    engine.list_containers(all).await.map_err(|e| {
        error!("Failed to list containers: {:?}", e);
        anyhow!(HarnessError::DockerApi { source: e }).context("Failed to list containers")
    })
}

/// True when `summary` carries exactly `name`.
pub fn has_name(summary: &ContainerSummary, name: &str) -> bool {
    summary
        .names
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
}

/// Finds the container, running or stopped, whose name is exactly `name`.
#[instrument(skip(engine))]
pub async fn find_by_name(
    engine: &dyn ContainerEngine,
    name: &str,
) -> Result<Option<ContainerSummary>> {
    let containers = list_containers(engine, true).await?;
    Ok(containers.into_iter().find(|c| has_name(c, name)))
}

/// Finds the container, running or stopped, with identity `id`.
pub async fn find_by_id(engine: &dyn ContainerEngine, id: &str) -> Result<Option<ContainerSummary>> {
    let containers = list_containers(engine, true).await?;
    Ok(containers
        .into_iter()
        .find(|c| c.id.as_deref() == Some(id)))
}

/// Names of the volumes mounted into a listed container, in mount order.
pub fn mounted_volumes(summary: &ContainerSummary) -> Vec<String> {
    named_mounts(summary.mounts.as_deref())
}

/// Same as `mounted_volumes`, for an inspected container. Volumes exist from
/// create time, so this works before the container was ever started.
pub fn inspected_volumes(details: &ContainerInspectResponse) -> Vec<String> {
    named_mounts(details.mounts.as_deref())
}

fn named_mounts(mounts: Option<&[MountPoint]>) -> Vec<String> {
    mounts
        .unwrap_or_default()
        .iter()
        .filter_map(|m| m.name.clone())
        .filter(|n| !n.is_empty())
        .collect()
}

/// True when a listed container reports the `running` state.
pub fn summary_running(summary: &ContainerSummary) -> bool {
    summary.state.as_deref() == Some("running")
}
