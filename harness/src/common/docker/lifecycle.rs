//! # DockHarness Container Lifecycle
//!
//! File: harness/src/common/docker/lifecycle.rs
//!
//! ## Overview
//!
//! `Container` drives one `ContainerDescriptor` through its life on the
//! engine: start, stop (graceful with kill escalation), kill, and cleanup of
//! the container plus every named volume it mounted. All operations on one
//! `Container` serialize on an internal `tokio::sync::Mutex`, so a `Container`
//! can be shared across tasks behind an `Arc`.
//!
//! ## Phases
//!
//! ```text
//! Unstarted ──start──▶ Created ──▶ Running ──stop/kill──▶ Stopped
//!     │                   │           │                      │
//!     └──────────────── cleanup ──────┴──────────────────────┴──▶ Removed
//! ```
//!
//! - `start` on a running container is a no-op returning the recorded ports.
//! - `start` on a stopped one removes that container and its volumes, then
//!   creates a fresh one (new identity, new free ports).
//! - `start` after `cleanup` fails with `HarnessError::DescriptorRemoved`.
//! - `start` that fails after creation keeps the identity, so `cleanup` can
//!   still reclaim the half-built container.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use dockharness::{connect_engine, Container, ContainerDescriptor};
//! use dockharness::core::config::EngineConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = connect_engine(&EngineConfig::default()).await?;
//! let descriptor = ContainerDescriptor::new("it-test", "postgres", "16", HashMap::new(), HashMap::new())
//!     .expose("5432")
//!     .env_var("POSTGRES_PASSWORD", "secret");
//! let container = Container::new(engine, descriptor);
//!
//! let ports = container.start().await?;
//! println!("postgres listening on localhost:{}", ports["5432"]);
//!
//! container.stop(10).await?;
//! container.cleanup().await?;
//! # Ok(())
//! # }
//! ```
//!
use crate::common::network::discovery::{PortSource, SystemPortSource};
use crate::core::config::{CollisionPolicy, LateStopErrorPolicy, LifecycleConfig};
use crate::core::error::{is_conflict, is_not_found, HarnessError, Result};
use anyhow::{anyhow, Context};
use bollard::container::Config;
use bollard::models::HostConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

use super::collision::resolve_name_collision;
use super::descriptor::ContainerDescriptor;
use super::engine::ContainerEngine;
use super::images;
use super::ports::plan_ports;
use super::state::{container_running, find_by_id, inspected_volumes, mounted_volumes};

/// How long a killed container may take to be reported as stopped.
const KILL_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);
const KILL_SETTLE_INTERVAL: Duration = Duration::from_millis(100);
/// Poll interval of `wait_until_running` / `wait_until_stopped`.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Behaviour switches for a `Container`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub collision_policy: CollisionPolicy,
    pub late_stop_errors: LateStopErrorPolicy,
    /// Host address every port binding is published on.
    pub bind_address: String,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self::from(&LifecycleConfig::default())
    }
}

impl From<&LifecycleConfig> for LifecycleOptions {
    fn from(config: &LifecycleConfig) -> Self {
        Self {
            collision_policy: config.collision_policy,
            late_stop_errors: config.late_stop_errors,
            bind_address: config.bind_address.clone(),
        }
    }
}

/// Where a `Container` is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unstarted,
    /// Created on the engine but not (yet) started.
    Created,
    Running,
    Stopped,
    /// Cleaned up. Terminal.
    Removed,
}

struct RuntimeState {
    id: String,
    resolved_ports: HashMap<String, String>,
    volumes: Vec<String>,
    phase: Phase,
}

/// A descriptor bound to an engine, plus what the engine told us about it.
pub struct Container {
    engine: Arc<dyn ContainerEngine>,
    port_source: Arc<dyn PortSource>,
    descriptor: ContainerDescriptor,
    options: LifecycleOptions,
    state: Mutex<RuntimeState>,
}

impl Container {
    /// Binds `descriptor` to `engine` with default options. No engine calls
    /// are made until `start`.
    pub fn new(engine: Arc<dyn ContainerEngine>, descriptor: ContainerDescriptor) -> Self {
        let requested_ports = descriptor.ports().clone();
        Self {
            engine,
            port_source: Arc::new(SystemPortSource),
            descriptor,
            options: LifecycleOptions::default(),
            state: Mutex::new(RuntimeState {
                id: String::new(),
                resolved_ports: requested_ports,
                volumes: Vec::new(),
                phase: Phase::Unstarted,
            }),
        }
    }

    pub fn with_options(mut self, options: LifecycleOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the free port probe.
    pub fn with_port_source(mut self, port_source: Arc<dyn PortSource>) -> Self {
        self.port_source = port_source;
        self
    }

    pub fn descriptor(&self) -> &ContainerDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> Option<&str> {
        self.descriptor.name()
    }

    pub fn image_reference(&self) -> String {
        self.descriptor.image_reference()
    }

    /// Engine identity of the current container; empty before the first
    /// successful create.
    pub async fn container_id(&self) -> String {
        self.state.lock().await.id.clone()
    }

    /// Container port → host port as resolved by the last successful `start`.
    ///
    /// Until then the keys are the requested ones and the values are the
    /// unresolved request (`""` for "any free port").
    pub async fn ports(&self) -> HashMap<String, String> {
        self.state.lock().await.resolved_ports.clone()
    }

    /// Named volumes recorded since create and not yet removed.
    pub async fn volumes(&self) -> Vec<String> {
        self.state.lock().await.volumes.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    /// Whether the container exists on the engine and is running.
    ///
    /// False before `start` and after out-of-band removal. Waits for any
    /// in-flight operation on this `Container` to finish.
    pub async fn is_running(&self) -> Result<bool> {
        let state = self.state.lock().await;
        self.running(&state).await
    }

    async fn running(&self, state: &RuntimeState) -> Result<bool> {
        if state.id.is_empty() {
            return Ok(false);
        }
        container_running(self.engine.as_ref(), &state.id).await
    }

    /// Starts the container, creating it (and pulling its image) as needed.
    ///
    /// Returns the resolved port map, keyed like the descriptor's.
    ///
    /// # Errors
    ///
    /// - `HarnessError::DescriptorRemoved` after `cleanup`.
    /// - `HarnessError::NameConflict` under `CollisionPolicy::Fail`.
    /// - `HarnessError::ImagePullVerification` when the image cannot be had.
    /// - `HarnessError::ContainerVanished` when the started container is not
    ///   listed afterwards.
    /// - `HarnessError::DockerApi` for any other engine failure.
    #[instrument(skip(self), fields(image = %self.descriptor.image_reference()))]
    pub async fn start(&self) -> Result<HashMap<String, String>> {
        let mut state = self.state.lock().await;
        if state.phase == Phase::Removed {
            return Err(anyhow!(HarnessError::DescriptorRemoved));
        }
        if self.running(&state).await? {
            debug!("Container '{}' already running.", state.id);
            state.phase = Phase::Running;
            return Ok(state.resolved_ports.clone());
        }
        if !state.id.is_empty() {
            self.discard_previous(&mut state).await?;
        }

        let engine = self.engine.as_ref();
        if let Some(name) = self.descriptor.name() {
            resolve_name_collision(engine, name, self.options.collision_policy).await?;
        }

        let reference = self.descriptor.image_reference();
        images::ensure_image(engine, self.descriptor.image(), self.descriptor.tag())
            .await
            .with_context(|| format!("Failed to obtain image '{}'", reference))?;

        let plan = plan_ports(
            self.descriptor.ports(),
            self.port_source.as_ref(),
            &self.options.bind_address,
        )?;
        let config = Config {
            image: Some(reference.clone()),
            env: Some(self.descriptor.env_list()),
            exposed_ports: Some(plan.exposed_ports),
            host_config: Some(HostConfig {
                port_bindings: Some(plan.port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        info!("Creating container from '{}'...", reference);
        let created = engine
            .create_container(self.descriptor.name(), config)
            .await
            .map_err(|e| {
                error!("Failed to create container from '{}': {:?}", reference, e);
                anyhow!(HarnessError::DockerApi { source: e })
                    .context(format!("Failed to create container from '{}'", reference))
            })?;
        for warning in &created.warnings {
            warn!("Engine warning for '{}': {}", created.id, warning);
        }
        state.id = created.id;
        state.phase = Phase::Created;
        let id = state.id.clone();
        // Image-declared volumes exist from here on, started or not.
        self.refresh_volumes(&mut state).await?;

        info!("Starting container '{}'...", id);
        if let Err(e) = engine.start_container(&id).await {
            error!(
                "Container '{}' was created but failed to start; cleanup will remove it: {:?}",
                id, e
            );
            return Err(anyhow!(HarnessError::DockerApi { source: e }))
                .with_context(|| format!("Failed to start container '{}'", id));
        }
        state.phase = Phase::Running;
        state.resolved_ports = plan.resolved;

        let summary = find_by_id(engine, &id)
            .await?
            .ok_or_else(|| anyhow!(HarnessError::ContainerVanished { id: id.clone() }))?;
        for volume in mounted_volumes(&summary) {
            if !state.volumes.contains(&volume) {
                state.volumes.push(volume);
            }
        }
        debug!("Container '{}' mounts volumes {:?}", id, state.volumes);

        info!("Container '{}' started.", id);
        Ok(state.resolved_ports.clone())
    }

    /// Removes the stopped container left from a previous `start`.
    async fn discard_previous(&self, state: &mut RuntimeState) -> Result<()> {
        info!("Replacing stopped container '{}'.", state.id);
        self.refresh_volumes(state).await?;
        self.remove_container(&state.id).await?;
        self.remove_volumes(state).await?;
        state.id.clear();
        state.resolved_ports = self.descriptor.ports().clone();
        state.phase = Phase::Unstarted;
        Ok(())
    }

    /// Stops the container, asking nicely for up to `wait_secs` seconds first.
    ///
    /// With `wait_secs <= 0` the container is killed straight away. If a
    /// graceful stop leaves it running, it is killed. A stopped or missing
    /// container is not an error.
    ///
    /// # Errors
    ///
    /// - `HarnessError::DidNotStop` if the container survives the kill.
    /// - `HarnessError::DockerApi` for engine failures, except a graceful stop
    ///   error arriving at or after the deadline under
    ///   `LateStopErrorPolicy::Suppress`.
    #[instrument(skip(self), fields(image = %self.descriptor.image_reference()))]
    pub async fn stop(&self, wait_secs: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        self.stop_locked(&mut state, wait_secs).await
    }

    /// Stops the container with SIGKILL and no grace period.
    pub async fn kill(&self) -> Result<()> {
        self.stop(-1).await
    }

    async fn stop_locked(&self, state: &mut RuntimeState, wait_secs: i64) -> Result<()> {
        if !self.running(state).await? {
            debug!("Container '{}' is not running; nothing to stop.", state.id);
            if state.phase == Phase::Running {
                state.phase = Phase::Stopped;
            }
            return Ok(());
        }
        let id = state.id.clone();
        let engine = self.engine.as_ref();

        if wait_secs > 0 {
            info!("Stopping container '{}' (up to {}s)...", id, wait_secs);
            let deadline = Duration::from_secs(wait_secs.unsigned_abs());
            let started = Instant::now();
            match engine.stop_container(&id, wait_secs).await {
                Ok(()) => {}
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 304, ..
                }) => debug!("Container '{}' was already stopped.", id),
                Err(e) => {
                    let elapsed = started.elapsed();
                    if self.options.late_stop_errors == LateStopErrorPolicy::Suppress
                        && elapsed >= deadline
                    {
                        warn!(
                            "Ignoring stop error for '{}' after {:?} (deadline {:?}): {}",
                            id, elapsed, deadline, e
                        );
                    } else {
                        error!("Failed to stop container '{}': {:?}", id, e);
                        return Err(anyhow!(HarnessError::DockerApi { source: e }))
                            .with_context(|| format!("Failed to stop container '{}'", id));
                    }
                }
            }
            if !self.running(state).await? {
                info!("Container '{}' stopped.", id);
                state.phase = Phase::Stopped;
                return Ok(());
            }
            warn!("Container '{}' still running after graceful stop; killing.", id);
        }

        info!("Killing container '{}'...", id);
        match engine.kill_container(&id, "SIGKILL").await {
            Ok(()) => {}
            Err(e) if is_conflict(&e) => debug!("Container '{}' exited before the kill.", id),
            Err(e) => {
                error!("Failed to kill container '{}': {:?}", id, e);
                return Err(anyhow!(HarnessError::DockerApi { source: e }))
                    .with_context(|| format!("Failed to kill container '{}'", id));
            }
        }

        let settle_deadline = Instant::now() + KILL_SETTLE_TIMEOUT;
        loop {
            if !self.running(state).await? {
                info!("Container '{}' killed.", id);
                state.phase = Phase::Stopped;
                return Ok(());
            }
            if Instant::now() >= settle_deadline {
                error!("Container '{}' still running after SIGKILL.", id);
                return Err(anyhow!(HarnessError::DidNotStop { id }));
            }
            sleep(KILL_SETTLE_INTERVAL).await;
        }
    }

    /// Kills the container if running, removes it, then force-removes every
    /// volume recorded at start.
    ///
    /// A no-op for a `Container` never created or already cleaned up. The
    /// first volume that cannot be removed aborts the rest; calling `cleanup`
    /// again retries from that volume.
    #[instrument(skip(self), fields(image = %self.descriptor.image_reference()))]
    pub async fn cleanup(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.phase == Phase::Removed {
            debug!("Container already cleaned up.");
            return Ok(());
        }
        if state.id.is_empty() {
            state.phase = Phase::Removed;
            return Ok(());
        }
        if self.running(&state).await? {
            self.stop_locked(&mut state, -1).await?;
        }
        self.refresh_volumes(&mut state).await?;
        self.remove_container(&state.id).await?;
        self.remove_volumes(&mut state).await?;
        info!("Container '{}' cleaned up.", state.id);
        state.phase = Phase::Removed;
        Ok(())
    }

    /// Records named volumes the engine reports for the current container
    /// that are not recorded yet. A container that is already gone adds none.
    async fn refresh_volumes(&self, state: &mut RuntimeState) -> Result<()> {
        let details = match self.engine.inspect_container(&state.id).await {
            Ok(details) => details,
            Err(e) if is_not_found(&e) => return Ok(()),
            Err(e) => {
                error!("Failed to inspect container '{}': {:?}", state.id, e);
                return Err(anyhow!(HarnessError::DockerApi { source: e }))
                    .with_context(|| format!("Failed to inspect container '{}'", state.id));
            }
        };
        for volume in inspected_volumes(&details) {
            if !state.volumes.contains(&volume) {
                state.volumes.push(volume);
            }
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        info!("Removing container '{}'...", id);
        match self.engine.remove_container(id).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("Container '{}' already removed.", id);
                Ok(())
            }
            Err(e) => {
                error!("Failed to remove container '{}': {:?}", id, e);
                Err(anyhow!(HarnessError::DockerApi { source: e }))
                    .with_context(|| format!("Failed to remove container '{}'", id))
            }
        }
    }

    /// Removes recorded volumes in order, forgetting each one once gone.
    async fn remove_volumes(&self, state: &mut RuntimeState) -> Result<()> {
        let total = state.volumes.len();
        let mut removed = 0;
        while let Some(volume) = state.volumes.first().cloned() {
            info!("Removing volume '{}'...", volume);
            if let Err(e) = self.engine.remove_volume(&volume, true).await {
                error!("Failed to remove volume '{}': {:?}", volume, e);
                return Err(anyhow!(HarnessError::DockerApi { source: e })).with_context(|| {
                    format!(
                        "Failed to remove volume '{}' ({} of {} volumes removed)",
                        volume, removed, total
                    )
                });
            }
            state.volumes.remove(0);
            removed += 1;
        }
        Ok(())
    }

    /// Whether this descriptor's image is present locally.
    pub async fn image_exists(&self) -> Result<bool> {
        images::image_exists(
            self.engine.as_ref(),
            self.descriptor.image(),
            self.descriptor.tag(),
        )
        .await
    }

    /// Removes this descriptor's image from the local cache, if present.
    pub async fn delete_image(&self) -> Result<()> {
        images::delete_image(
            self.engine.as_ref(),
            self.descriptor.image(),
            self.descriptor.tag(),
        )
        .await
    }

    /// Polls until the container reports running, or `timeout` elapses.
    pub async fn wait_until_running(&self, timeout: Duration) -> Result<()> {
        self.wait_until(true, timeout).await
    }

    /// Polls until the container reports not running, or `timeout` elapses.
    pub async fn wait_until_stopped(&self, timeout: Duration) -> Result<()> {
        self.wait_until(false, timeout).await
    }

    async fn wait_until(&self, running: bool, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.is_running().await? == running {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(anyhow!(HarnessError::Timeout {
                    id: self.container_id().await,
                    target: if running { "running" } else { "stopped" },
                    waited_ms: waited.as_millis(),
                }));
            }
            sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}
