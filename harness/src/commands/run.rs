//! # DockHarness Run Command
//!
//! File: harness/src/commands/run.rs
//!
//! ## Overview
//!
//! `dockharness run` starts one container through the lifecycle API, prints the
//! host ports it was given, keeps it up for `--hold` seconds (or until Ctrl-C),
//! then stops it and cleans up the container and its volumes. Stop and cleanup
//! run even when start fails, so a half-created container is not left behind.
//!
//! ```bash
//! dockharness run --image postgres --tag 16 --name it-test \
//!     -p 5432 -p 18080:8080 -e POSTGRES_PASSWORD=secret --hold 30
//! ```
//!
use anyhow::{anyhow, Context};
use clap::Parser;
use dockharness::common::docker::ports::ANY_HOST_PORT;
use dockharness::core::config::load_config;
use dockharness::core::error::{HarnessError, Result};
use dockharness::{connect_engine, Container, ContainerDescriptor, LifecycleOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "Start a container, hold it, then stop and clean it up")]
pub struct RunArgs {
    /// Image to run, without tag.
    #[arg(long)]
    image: String,

    /// Image tag. Defaults to `latest`.
    #[arg(long, default_value = "")]
    tag: String,

    /// Container name. An existing container with this name is handled per
    /// the configured collision policy.
    #[arg(long, default_value = "")]
    name: String,

    /// Port to publish, as CONTAINER (any free host port) or HOST:CONTAINER.
    #[arg(short = 'p', long = "port")]
    ports: Vec<String>,

    /// Environment variable, as KEY=VALUE.
    #[arg(short = 'e', long = "env")]
    env: Vec<String>,

    /// Seconds to keep the container up. Without it, waits for Ctrl-C.
    #[arg(long)]
    hold: Option<u64>,

    /// Graceful stop deadline in seconds; 0 or less kills immediately.
    #[arg(long, allow_hyphen_values = true)]
    stop_wait: Option<i64>,
}

/// Parses `CONTAINER` or `HOST:CONTAINER` into `(container_port, host_port)`.
fn parse_port_mapping(mapping: &str) -> Result<(String, String)> {
    let invalid = || anyhow!(HarnessError::InvalidPortMapping(mapping.to_string()));
    let (host, container) = match mapping.split_once(':') {
        Some((host, container)) => (host, container),
        None => (ANY_HOST_PORT, mapping),
    };
    let container_number = container.split_once('/').map_or(container, |(port, _)| port);
    if container_number.parse::<u16>().is_err() {
        return Err(invalid());
    }
    if host != ANY_HOST_PORT && host.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok((container.to_string(), host.to_string()))
}

fn parse_env_var(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(anyhow!(HarnessError::Config(format!(
            "Invalid environment variable '{}'. Expected KEY=VALUE.",
            pair
        )))),
    }
}

fn build_descriptor(args: &RunArgs) -> Result<ContainerDescriptor> {
    let ports = args
        .ports
        .iter()
        .map(|p| parse_port_mapping(p))
        .collect::<Result<HashMap<_, _>>>()?;
    let env = args
        .env
        .iter()
        .map(|e| parse_env_var(e))
        .collect::<Result<HashMap<_, _>>>()?;
    Ok(ContainerDescriptor::new(
        args.name.clone(),
        args.image.clone(),
        args.tag.clone(),
        ports,
        env,
    ))
}

pub async fn handle_run(args: RunArgs) -> Result<()> {
    info!("Handling run command: {:?}", args);
    let descriptor = build_descriptor(&args)?;

    let config = load_config()?;
    let engine = connect_engine(&config.engine).await?;
    let stop_wait = args.stop_wait.unwrap_or(config.lifecycle.stop_wait_secs);
    let container =
        Container::new(engine, descriptor).with_options(LifecycleOptions::from(&config.lifecycle));

    let run_result = start_and_hold(&container, args.hold).await;
    let stop_result = container.stop(stop_wait).await;
    if let Err(e) = &stop_result {
        warn!("Stop failed, cleanup will kill the container: {:#}", e);
    }
    let cleanup_result = container.cleanup().await;

    run_result?;
    stop_result?;
    cleanup_result?;
    println!("Container cleaned up.");
    Ok(())
}

async fn start_and_hold(container: &Container, hold: Option<u64>) -> Result<()> {
    let ports = container.start().await?;
    println!(
        "Container {} running from {}",
        container.container_id().await,
        container.image_reference()
    );
    let mut ports: Vec<_> = ports.into_iter().collect();
    ports.sort();
    for (container_port, host_port) in ports {
        println!("  {} -> {}", container_port, host_port);
    }

    match hold {
        Some(secs) => {
            println!("Holding for {}s (Ctrl-C to stop early)...", secs);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                signal = tokio::signal::ctrl_c() => signal.context("Failed to listen for Ctrl-C")?,
            }
        }
        None => {
            println!("Press Ctrl-C to stop.");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }
    Ok(())
}
