//! # DockHarness Engine Capability
//!
//! File: harness/src/common/docker/engine.rs
//!
//! ## Overview
//!
//! Everything the harness needs from the container engine, expressed as one
//! object-safe async trait. Lifecycle code only ever talks to an
//! `Arc<dyn ContainerEngine>`, so several managers can share one daemon
//! connection, point at different daemons, or run against an in-memory fake in
//! unit tests.
//!
//! `DockerEngine` is the production implementation on top of `bollard`.
//! Methods are thin pass-throughs; status-code interpretation (404 as absence,
//! 409 as conflict) happens in the callers.
//!
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions,
    ListContainersOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::{CreateImageOptions, RemoveImageOptions};
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, ContainerSummary, CreateImageInfo,
    ImageInspect, Volume,
};
use bollard::volume::{ListVolumesOptions, RemoveVolumeOptions};
use bollard::Docker;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use tracing::debug;

/// Progress records produced while an image pull is in flight.
pub type PullStream = BoxStream<'static, Result<CreateImageInfo, DockerError>>;

/// Control-plane operations the lifecycle manager consumes.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError>;

    /// Lists containers; `all` includes stopped ones.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError>;

    async fn create_container(
        &self,
        name: Option<&str>,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError>;

    async fn start_container(&self, id: &str) -> Result<(), DockerError>;

    /// Graceful stop: the engine sends SIGTERM and escalates after `timeout_secs`.
    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), DockerError>;

    async fn kill_container(&self, id: &str, signal: &str) -> Result<(), DockerError>;

    async fn remove_container(&self, id: &str) -> Result<(), DockerError>;

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, DockerError>;

    /// Starts pulling `image:tag`. The pull only completes once the returned
    /// stream has been drained.
    fn pull_image(&self, image: &str, tag: &str) -> PullStream;

    async fn remove_image(&self, reference: &str) -> Result<(), DockerError>;

    async fn list_volumes(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<Volume>, DockerError>;

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), DockerError>;
}

/// `ContainerEngine` backed by the Docker Engine API.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Wraps an already connected bollard client.
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        self.docker.list_containers(Some(options)).await
    }

    async fn create_container(
        &self,
        name: Option<&str>,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError> {
        let options = name.map(|name| CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        });
        self.docker.create_container(options, config).await
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<(), DockerError> {
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: timeout_secs }))
            .await
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<(), DockerError> {
        self.docker
            .kill_container(
                id,
                Some(KillContainerOptions {
                    signal: signal.to_string(),
                }),
            )
            .await
    }

    async fn remove_container(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: false,
                    v: false,
                    link: false,
                }),
            )
            .await
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect, DockerError> {
        self.docker.inspect_image(reference).await
    }

    fn pull_image(&self, image: &str, tag: &str) -> PullStream {
        debug!("Requesting pull of {}:{}", image, tag);
        let options = CreateImageOptions {
            from_image: image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };
        Box::pin(self.docker.create_image(Some(options), None, None))
    }

    async fn remove_image(&self, reference: &str) -> Result<(), DockerError> {
        let options = RemoveImageOptions {
            force: false,
            noprune: false,
        };
        let results = self
            .docker
            .remove_image(reference, Some(options), None)
            .await?;
        for result in results {
            if let Some(deleted) = result.deleted {
                debug!("Deleted: {}", deleted);
            }
            if let Some(untagged) = result.untagged {
                debug!("Untagged: {}", untagged);
            }
        }
        Ok(())
    }

    async fn list_volumes(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<Volume>, DockerError> {
        let response = self
            .docker
            .list_volumes(Some(ListVolumesOptions { filters }))
            .await?;
        Ok(response.volumes.unwrap_or_default())
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), DockerError> {
        self.docker
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await
    }
}
