//! # DockHarness Container Descriptor
//!
//! File: harness/src/common/docker/descriptor.rs
//!
//! The requested configuration of one harness container: optional name,
//! image and tag, requested port map, and environment. Constructing a
//! descriptor makes no engine calls. A blank tag becomes `latest` here, so a
//! descriptor's tag is never blank.
//!
use std::collections::HashMap;

use super::images::{image_reference, normalize_tag};
use super::ports::ANY_HOST_PORT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    name: Option<String>,
    image: String,
    tag: String,
    ports: HashMap<String, String>,
    env: HashMap<String, String>,
}

impl ContainerDescriptor {
    /// `name` may be blank to let the engine pick one. In `ports`, a host
    /// value of `""` requests any free host port.
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        tag: impl Into<String>,
        ports: HashMap<String, String>,
        env: HashMap<String, String>,
    ) -> Self {
        let name = name.into();
        let tag = tag.into();
        Self {
            name: (!name.trim().is_empty()).then_some(name),
            image: image.into(),
            tag: normalize_tag(&tag).to_string(),
            ports,
            env,
        }
    }

    /// Adds a container port bound to any free host port.
    pub fn expose(mut self, container_port: impl Into<String>) -> Self {
        self.ports
            .insert(container_port.into(), ANY_HOST_PORT.to_string());
        self
    }

    /// Adds a container port bound to a fixed host port.
    pub fn publish(mut self, container_port: impl Into<String>, host_port: impl Into<String>) -> Self {
        self.ports.insert(container_port.into(), host_port.into());
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `image:tag`.
    pub fn image_reference(&self) -> String {
        image_reference(&self.image, &self.tag)
    }

    /// Requested port map, unresolved.
    pub fn ports(&self) -> &HashMap<String, String> {
        &self.ports
    }

    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Environment in the `KEY=VALUE` form the engine expects, sorted by key.
    pub fn env_list(&self) -> Vec<String> {
        let mut env: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        env.sort();
        env
    }
}
