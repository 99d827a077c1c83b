//! In-memory `ContainerEngine` for unit tests.
//!
//! Models just enough daemon behaviour for the lifecycle code: name conflicts,
//! 404s for unknown ids and images, 409s for removing running containers,
//! anonymous volumes created per image, and pulls from a fake registry. Every
//! engine call is recorded so tests can assert on the exact sequence.

use async_trait::async_trait;
use bollard::container::Config;
use bollard::errors::Error as DockerError;
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, ContainerState, ContainerSummary,
    CreateImageInfo, HostConfig, ImageInspect, MountPoint, PortBinding, Volume,
};
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::engine::{ContainerEngine, PullStream};

pub type PortBindings = HashMap<String, Option<Vec<PortBinding>>>;

#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    containers: Vec<FakeContainer>,
    images: HashSet<String>,
    registry: HashSet<String>,
    hollow_pulls: HashMap<String, String>,
    image_volumes: HashMap<String, usize>,
    volumes: BTreeSet<String>,
    failures: HashMap<String, u16>,
    ignore_sigterm: bool,
    ignore_sigkill: bool,
    late_stop_error: bool,
    pulls: usize,
    creates: usize,
    calls: Vec<String>,
}

#[derive(Clone)]
struct FakeContainer {
    id: String,
    name: String,
    running: bool,
    volumes: Vec<String>,
    env: Vec<String>,
    port_bindings: Option<PortBindings>,
}

fn mount_points(volumes: &[String]) -> Vec<MountPoint> {
    volumes
        .iter()
        .map(|v| MountPoint {
            name: Some(v.clone()),
            ..Default::default()
        })
        .collect()
}

pub fn server_error(status_code: u16, message: &str) -> DockerError {
    DockerError::DockerResponseServerError {
        status_code,
        message: message.to_string(),
    }
}

impl FakeEngine {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn record(&self, call: String) -> Option<DockerError> {
        let mut state = self.lock();
        let op = call.split(' ').next().unwrap_or_default().to_string();
        state.calls.push(call);
        state
            .failures
            .remove(&op)
            .map(|status| server_error(status, "injected failure"))
    }

    pub fn add_image(&self, reference: &str) {
        self.lock().images.insert(reference.to_string());
    }

    pub fn add_to_registry(&self, reference: &str) {
        self.lock().registry.insert(reference.to_string());
    }

    /// Pulls of `reference` finish without a transport error but leave no image.
    pub fn add_hollow_pull(&self, reference: &str, message: &str) {
        self.lock()
            .hollow_pulls
            .insert(reference.to_string(), message.to_string());
    }

    /// Containers created from `reference` get `count` anonymous volumes.
    pub fn set_image_volumes(&self, reference: &str, count: usize) {
        self.lock().image_volumes.insert(reference.to_string(), count);
    }

    /// The next call of `op` fails with `status`.
    pub fn fail_next(&self, op: &str, status: u16) {
        self.lock().failures.insert(op.to_string(), status);
    }

    pub fn ignore_sigterm(&self, ignore: bool) {
        self.lock().ignore_sigterm = ignore;
    }

    pub fn ignore_sigkill(&self, ignore: bool) {
        self.lock().ignore_sigkill = ignore;
    }

    /// Graceful stops wait out their whole deadline and then report an error.
    pub fn late_stop_error(&self, enabled: bool) {
        self.lock().late_stop_error = enabled;
    }

    /// Adds a leftover container, as a crashed earlier run would leave behind.
    pub fn seed_container(&self, name: &str, running: bool, volumes: &[&str]) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("seeded{:04}", state.next_id);
        for volume in volumes {
            state.volumes.insert(volume.to_string());
        }
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name.to_string(),
            running,
            volumes: volumes.iter().map(|v| v.to_string()).collect(),
            env: Vec::new(),
            port_bindings: None,
        });
        id
    }

    /// Stops a container behind the harness's back.
    pub fn stop_out_of_band(&self, id: &str) {
        if let Some(c) = self.lock().containers.iter_mut().find(|c| c.id == id) {
            c.running = false;
        }
    }

    /// Removes a container behind the harness's back.
    pub fn remove_out_of_band(&self, id: &str) {
        self.lock().containers.retain(|c| c.id != id);
    }

    pub fn container_exists(&self, id: &str) -> bool {
        self.lock().containers.iter().any(|c| c.id == id)
    }

    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    pub fn volume_exists(&self, name: &str) -> bool {
        self.lock().volumes.contains(name)
    }

    pub fn port_bindings(&self, id: &str) -> Option<PortBindings> {
        self.lock()
            .containers
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.port_bindings.clone())
    }

    pub fn env(&self, id: &str) -> Vec<String> {
        self.lock()
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.env.clone())
            .unwrap_or_default()
    }

    pub fn pull_count(&self) -> usize {
        self.lock().pulls
    }

    pub fn create_count(&self) -> usize {
        self.lock().creates
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        if let Some(err) = self.record(format!("inspect_container {id}")) {
            return Err(err);
        }
        let state = self.lock();
        let c = state
            .containers
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| server_error(404, "No such container"))?;
        Ok(ContainerInspectResponse {
            id: Some(c.id.clone()),
            name: Some(format!("/{}", c.name)),
            state: Some(ContainerState {
                running: Some(c.running),
                ..Default::default()
            }),
            host_config: Some(HostConfig {
                port_bindings: c.port_bindings.clone(),
                ..Default::default()
            }),
            mounts: Some(mount_points(&c.volumes)),
            ..Default::default()
        })
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        if let Some(err) = self.record(format!("list_containers {all}")) {
            return Err(err);
        }
        let state = self.lock();
        Ok(state
            .containers
            .iter()
            .filter(|c| all || c.running)
            .map(|c| ContainerSummary {
                id: Some(c.id.clone()),
                names: Some(vec![format!("/{}", c.name)]),
                state: Some(if c.running { "running" } else { "exited" }.to_string()),
                mounts: Some(mount_points(&c.volumes)),
                ..Default::default()
            })
            .collect())
    }

    async fn create_container(
        &self,
        name: Option<&str>,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError> {
        if let Some(err) = self.record(format!("create_container {}", name.unwrap_or(""))) {
            return Err(err);
        }
        let mut state = self.lock();
        let image = config.image.clone().unwrap_or_default();
        if !state.images.contains(&image) {
            return Err(server_error(404, &format!("No such image: {image}")));
        }
        if let Some(name) = name {
            if state.containers.iter().any(|c| c.name == name) {
                return Err(server_error(409, "Conflict. The container name is already in use"));
            }
        }
        state.next_id += 1;
        state.creates += 1;
        let serial = state.next_id;
        let id = format!("fake{serial:04}");
        let volume_count = state.image_volumes.get(&image).copied().unwrap_or(0);
        let volumes: Vec<String> = (0..volume_count)
            .map(|i| format!("{id}-vol{i}"))
            .collect();
        state.volumes.extend(volumes.iter().cloned());
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("auto_{serial}")),
            running: false,
            volumes,
            env: config.env.unwrap_or_default(),
            port_bindings: config.host_config.and_then(|h| h.port_bindings),
        });
        Ok(ContainerCreateResponse {
            id,
            warnings: Vec::new(),
        })
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        if let Some(err) = self.record(format!("start_container {id}")) {
            return Err(err);
        }
        let mut state = self.lock();
        let c = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| server_error(404, "No such container"))?;
        c.running = true;
        Ok(())
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), DockerError> {
        if let Some(err) = self.record(format!("stop_container {id}")) {
            return Err(err);
        }
        let (late_error, ignore_sigterm) = {
            let state = self.lock();
            if !state.containers.iter().any(|c| c.id == id) {
                return Err(server_error(404, "No such container"));
            }
            (state.late_stop_error, state.ignore_sigterm)
        };
        if late_error {
            tokio::time::sleep(Duration::from_secs(timeout_secs.max(0) as u64)).await;
        }
        if !ignore_sigterm {
            self.stop_out_of_band(id);
        }
        if late_error {
            return Err(server_error(500, "context deadline exceeded"));
        }
        Ok(())
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<(), DockerError> {
        if let Some(err) = self.record(format!("kill_container {id} {signal}")) {
            return Err(err);
        }
        let mut state = self.lock();
        let ignore_sigkill = state.ignore_sigkill;
        let c = state
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| server_error(404, "No such container"))?;
        if !c.running {
            return Err(server_error(409, "Container is not running"));
        }
        if !ignore_sigkill {
            c.running = false;
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), DockerError> {
        if let Some(err) = self.record(format!("remove_container {id}")) {
            return Err(err);
        }
        let mut state = self.lock();
        let index = state
            .containers
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| server_error(404, "No such container"))?;
        if state.containers[index].running {
            return Err(server_error(409, "You cannot remove a running container"));
        }
        state.containers.remove(index);
        Ok(())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, DockerError> {
        if let Some(err) = self.record(format!("inspect_image {reference}")) {
            return Err(err);
        }
        if self.lock().images.contains(reference) {
            Ok(ImageInspect {
                id: Some(format!("sha256:{reference}")),
                ..Default::default()
            })
        } else {
            Err(server_error(404, "No such image"))
        }
    }

    fn pull_image(&self, image: &str, tag: &str) -> PullStream {
        let reference = format!("{image}:{tag}");
        // `record` cannot fail a sync call through `?`; injected pull failures
        // surface as a stream error instead.
        let injected = self.record(format!("pull_image {reference}"));
        let mut state = self.lock();
        state.pulls += 1;
        let status = |s: &str| CreateImageInfo {
            status: Some(s.to_string()),
            ..Default::default()
        };
        let items: Vec<Result<CreateImageInfo, DockerError>> = if let Some(err) = injected {
            vec![Err(err)]
        } else if state.registry.contains(&reference) {
            state.images.insert(reference.clone());
            vec![
                Ok(status(&format!("Pulling from library/{image}"))),
                Ok(status(&format!("Status: Downloaded newer image for {reference}"))),
            ]
        } else if let Some(message) = state.hollow_pulls.get(&reference) {
            vec![
                Ok(status(&format!("Pulling from library/{image}"))),
                Ok(CreateImageInfo {
                    error: Some(message.clone()),
                    ..Default::default()
                }),
            ]
        } else {
            vec![Err(server_error(
                404,
                &format!("pull access denied for {image}, repository does not exist"),
            ))]
        };
        stream::iter(items).boxed()
    }

    async fn remove_image(&self, reference: &str) -> Result<(), DockerError> {
        if let Some(err) = self.record(format!("remove_image {reference}")) {
            return Err(err);
        }
        if self.lock().images.remove(reference) {
            Ok(())
        } else {
            Err(server_error(404, "No such image"))
        }
    }

    async fn list_volumes(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<Volume>, DockerError> {
        if let Some(err) = self.record("list_volumes".to_string()) {
            return Err(err);
        }
        let names = filters.get("name");
        Ok(self
            .lock()
            .volumes
            .iter()
            .filter(|v| names.map_or(true, |n| n.iter().any(|n| v.contains(n.as_str()))))
            .map(|v| Volume {
                name: v.clone(),
                ..Default::default()
            })
            .collect())
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), DockerError> {
        if let Some(err) = self.record(format!("remove_volume {name}")) {
            return Err(err);
        }
        let mut state = self.lock();
        if state.containers.iter().any(|c| c.volumes.iter().any(|v| v == name)) {
            return Err(server_error(409, "volume is in use"));
        }
        if state.volumes.remove(name) || force {
            Ok(())
        } else {
            Err(server_error(404, "No such volume"))
        }
    }
}
