//! # DockHarness Configuration System
//!
//! File: harness/src/core/config.rs
//!
//! ## Overview
//!
//! This module loads, merges, expands and validates the harness configuration.
//! Configuration only tunes defaults (engine connection, shutdown wait, port
//! bind address, collision and stop-error policies); a test suite can always
//! override them per container through `LifecycleOptions`.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Project-specific `.dockharness.toml` in the current directory or ancestors
//!    (the search stops at a directory containing `.git`)
//! 2. User-specific `<config dir>/dockharness/config.toml`
//! 3. Default values defined in the code
//!
//! ## Examples
//!
//! ```toml
//! [engine]
//! socket = "~/.docker/run/docker.sock"
//! timeout_secs = 120
//!
//! [lifecycle]
//! stop_wait_secs = 10
//! bind_address = "0.0.0.0"
//! collision_policy = "fail"
//! late_stop_errors = "propagate"
//! ```
//!
use crate::core::error::{HarnessError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::net::IpAddr;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Top-level configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// How to reach the container engine.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Unix socket path of the Docker daemon (can use ~). When unset, local
    /// defaults are used, which honour `DOCKER_HOST`.
    #[serde(default)]
    pub socket: Option<String>,
    /// Request timeout in seconds for the engine client.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: default_engine_timeout(),
        }
    }
}

/// Defaults applied to every container started through the harness.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    /// Graceful stop deadline used by the CLI when none is given.
    #[serde(default = "default_stop_wait")]
    pub stop_wait_secs: i64,
    /// Host address port bindings are published on.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    #[serde(default)]
    pub late_stop_errors: LateStopErrorPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stop_wait_secs: default_stop_wait(),
            bind_address: default_bind_address(),
            collision_policy: CollisionPolicy::default(),
            late_stop_errors: LateStopErrorPolicy::default(),
        }
    }
}

/// What Start does when a container with the requested name already exists.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Kill and remove the existing container and its volumes, then create
    /// ours. This destroys whatever holds the name, including containers owned
    /// by another process.
    #[default]
    Destroy,
    /// Refuse to start and report the conflict.
    Fail,
}

/// What Stop does with an engine error raised by the graceful stop request.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LateStopErrorPolicy {
    /// Discard the error when it arrives at or after the requested deadline,
    /// on the assumption that it is the engine's own timeout surfacing. Errors
    /// arriving before the deadline still propagate.
    #[default]
    Suppress,
    /// Propagate every error from the graceful stop request.
    Propagate,
}

fn default_engine_timeout() -> u64 {
    120
}
fn default_stop_wait() -> i64 {
    10
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

/// One configuration file as written: only the keys it sets.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineFile,
    #[serde(default)]
    lifecycle: LifecycleFile,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct EngineFile {
    socket: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct LifecycleFile {
    stop_wait_secs: Option<i64>,
    bind_address: Option<String>,
    collision_policy: Option<CollisionPolicy>,
    late_stop_errors: Option<LateStopErrorPolicy>,
}

const PROJECT_CONFIG_FILENAME: &str = ".dockharness.toml";

/// Loads the merged, expanded and validated configuration.
pub fn load_config() -> Result<HarnessConfig> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let user_config = load_user_config()?;
    let project_config = load_project_config(&current_dir)?;
    let mut merged = merge_configs(user_config, project_config);
    expand_config_paths(&mut merged).context("Failed to expand paths in configuration")?;
    validate_config(&merged).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged);
    Ok(merged)
}

fn load_user_config() -> Result<Option<ConfigFile>> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "DockHarness", "dockharness") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config(start: &Path) -> Result<Option<ConfigFile>> {
    if let Some(project_config_path) = find_project_config_path(start) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.dockharness.toml) found.");
        Ok(None)
    }
}

/// Walks from `start` towards the filesystem root looking for the project
/// config file. A directory containing `.git` ends the search.
fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path: &Path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

fn load_config_from_path(path: &Path) -> Result<ConfigFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Project values win over user values, user values over built-in defaults.
/// Only keys actually present in a file take part.
fn merge_configs(user: Option<ConfigFile>, project: Option<ConfigFile>) -> HarnessConfig {
    let user = user.unwrap_or_default();
    let project = project.unwrap_or_default();
    let engine_defaults = EngineConfig::default();
    let lifecycle_defaults = LifecycleConfig::default();
    HarnessConfig {
        engine: EngineConfig {
            socket: project.engine.socket.or(user.engine.socket),
            timeout_secs: project
                .engine
                .timeout_secs
                .or(user.engine.timeout_secs)
                .unwrap_or(engine_defaults.timeout_secs),
        },
        lifecycle: LifecycleConfig {
            stop_wait_secs: project
                .lifecycle
                .stop_wait_secs
                .or(user.lifecycle.stop_wait_secs)
                .unwrap_or(lifecycle_defaults.stop_wait_secs),
            bind_address: project
                .lifecycle
                .bind_address
                .or(user.lifecycle.bind_address)
                .unwrap_or(lifecycle_defaults.bind_address),
            collision_policy: project
                .lifecycle
                .collision_policy
                .or(user.lifecycle.collision_policy)
                .unwrap_or(lifecycle_defaults.collision_policy),
            late_stop_errors: project
                .lifecycle
                .late_stop_errors
                .or(user.lifecycle.late_stop_errors)
                .unwrap_or(lifecycle_defaults.late_stop_errors),
        },
    }
}

fn expand_config_paths(config: &mut HarnessConfig) -> Result<()> {
    if let Some(socket) = config.engine.socket.as_mut() {
        *socket = shellexpand::tilde(socket.as_str()).into_owned();
        debug!("Expanded engine socket path: {}", socket);
    }
    Ok(())
}

fn validate_config(config: &HarnessConfig) -> Result<()> {
    if config.engine.timeout_secs == 0 {
        return Err(anyhow!(HarnessError::Config(
            "engine.timeout_secs must be greater than zero.".to_string()
        )));
    }
    if let Some(socket) = &config.engine.socket {
        if socket.trim().is_empty() {
            return Err(anyhow!(HarnessError::Config(
                "engine.socket cannot be empty; omit it to use local defaults.".to_string()
            )));
        }
    }
    if config.lifecycle.bind_address.parse::<IpAddr>().is_err() {
        return Err(anyhow!(HarnessError::Config(format!(
            "lifecycle.bind_address '{}' is not an IP address.",
            config.lifecycle.bind_address
        ))));
    }
    Ok(())
}
