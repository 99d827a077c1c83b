//! # DockHarness Name Collision Handling
//!
//! File: harness/src/common/docker/collision.rs
//!
//! ## Overview
//!
//! Test suites reuse fixed container names across runs. When an earlier run
//! crashed before cleaning up, its container still holds the name and every
//! later `create` would fail with a conflict. Before creating a named
//! container, `resolve_name_collision` looks for a holder of that name among
//! all containers, stopped ones included, and applies the `CollisionPolicy`:
//!
//! - `Destroy`: kill the holder if it is running, remove it, then force-remove
//!   each of its named volumes. **This destroys the container no matter who
//!   owns it**, including one belonging to another process on a shared daemon.
//! - `Fail`: return `HarnessError::NameConflict` and leave it alone.
//!
//! The first failure during teardown aborts and is returned; the new container
//! is then not created.
//!
use crate::core::config::CollisionPolicy;
use crate::core::error::{is_conflict, is_not_found, HarnessError, Result};
use anyhow::{anyhow, Context};
use bollard::models::ContainerSummary;
use tracing::{debug, error, info, instrument, warn};

use super::engine::ContainerEngine;
use super::state::{find_by_name, mounted_volumes, summary_running};

/// Clears `name` for a new container according to `policy`.
///
/// Returns the id of the destroyed container, if there was one.
#[instrument(skip(engine))]
pub async fn resolve_name_collision(
    engine: &dyn ContainerEngine,
    name: &str,
    policy: CollisionPolicy,
) -> Result<Option<String>> {
    let Some(existing) = find_by_name(engine, name).await? else {
        debug!("No existing container named '{}'.", name);
        return Ok(None);
    };
    let id = existing.id.clone().unwrap_or_default();
    match policy {
        CollisionPolicy::Fail => {
            warn!("Container name '{}' is taken by '{}'.", name, id);
            Err(anyhow!(HarnessError::NameConflict {
                name: name.to_string(),
                id,
            }))
        }
        CollisionPolicy::Destroy => {
            warn!(
                "Destroying existing container '{}' ({}) to reuse its name.",
                name, id
            );
            destroy_container(engine, &existing)
                .await
                .with_context(|| format!("Failed to clear container name '{}'", name))?;
            Ok(Some(id))
        }
    }
}

/// Destroys the container called `name`, if any, regardless of policy.
///
/// Returns whether a container was found.
pub async fn destroy_named(engine: &dyn ContainerEngine, name: &str) -> Result<bool> {
    Ok(resolve_name_collision(engine, name, CollisionPolicy::Destroy)
        .await?
        .is_some())
}

/// Kills (if running) and removes a listed container, then force-removes its
/// named volumes.
async fn destroy_container(engine: &dyn ContainerEngine, container: &ContainerSummary) -> Result<()> {
    let id = container.id.as_deref().unwrap_or_default();
    let volumes = mounted_volumes(container);

    if summary_running(container) {
        info!("Killing container '{}'...", id);
        match engine.kill_container(id, "SIGKILL").await {
            Ok(()) => {}
            // Exited between listing and kill.
            Err(e) if is_conflict(&e) => debug!("Container '{}' already stopped.", id),
            Err(e) => {
                error!("Failed to kill container '{}': {:?}", id, e);
                return Err(anyhow!(HarnessError::DockerApi { source: e }))
                    .with_context(|| format!("Failed to kill container '{}'", id));
            }
        }
    }

    info!("Removing container '{}'...", id);
    match engine.remove_container(id).await {
        Ok(()) => {}
        Err(e) if is_not_found(&e) => debug!("Container '{}' already removed.", id),
        Err(e) => {
            error!("Failed to remove container '{}': {:?}", id, e);
            return Err(anyhow!(HarnessError::DockerApi { source: e }))
                .with_context(|| format!("Failed to remove container '{}'", id));
        }
    }

    for volume in &volumes {
        info!("Removing volume '{}'...", volume);
        engine.remove_volume(volume, true).await.map_err(|e| {
            error!("Failed to remove volume '{}': {:?}", volume, e);
            anyhow!(HarnessError::DockerApi { source: e })
                .context(format!("Failed to remove volume '{}'", volume))
        })?;
    }
    Ok(())
}
