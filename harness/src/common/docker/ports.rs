//! # DockHarness Port Binding Resolution
//!
//! File: harness/src/common/docker/ports.rs
//!
//! ## Overview
//!
//! Turns a requested port map (container port → host port, with `""` meaning
//! "any free host port") into the three things container creation needs:
//!
//! - the exposed-port set, keyed `port/proto` (`/tcp` appended when the caller
//!   gave no protocol);
//! - the host binding map for `HostConfig::port_bindings`;
//! - the resolved map, keyed by the caller's original keys, which is what
//!   `Container::start` hands back.
//!
//! Free ports come from a `PortSource`, so the same code runs against the
//! kernel in production and a fixed sequence in tests. See
//! `common::network::discovery` for the race inherent to probing.
//!
use crate::common::network::discovery::PortSource;
use crate::core::error::Result;
use bollard::models::PortBinding;
use std::collections::HashMap;
use tracing::debug;

/// Requested host port value meaning "pick any free port".
pub const ANY_HOST_PORT: &str = "";

const DEFAULT_PROTOCOL: &str = "tcp";

/// Everything derived from a requested port map.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PortPlan {
    pub exposed_ports: HashMap<String, HashMap<(), ()>>,
    pub port_bindings: HashMap<String, Option<Vec<PortBinding>>>,
    pub resolved: HashMap<String, String>,
}

/// Qualifies a container port with the default protocol when it has none.
pub fn normalize_container_port(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{}/{}", port, DEFAULT_PROTOCOL)
    }
}

/// Resolves `requested` into a `PortPlan`, publishing every binding on
/// `bind_address`.
///
/// # Errors
///
/// Fails only if the `PortSource` cannot produce a free port.
pub fn plan_ports(
    requested: &HashMap<String, String>,
    source: &dyn PortSource,
    bind_address: &str,
) -> Result<PortPlan> {
    let mut plan = PortPlan::default();
    for (container_port, host_port) in requested {
        let exposed = normalize_container_port(container_port);
        plan.exposed_ports.insert(exposed.clone(), HashMap::new());

        let host_port = if host_port == ANY_HOST_PORT {
            let port = source.allocate_tcp_port()?.to_string();
            debug!("Container port {} gets free host port {}", exposed, port);
            port
        } else {
            host_port.clone()
        };

        plan.port_bindings.insert(
            exposed,
            Some(vec![PortBinding {
                host_ip: Some(bind_address.to_string()),
                host_port: Some(host_port.clone()),
            }]),
        );
        plan.resolved.insert(container_port.clone(), host_port);
    }
    Ok(plan)
}
