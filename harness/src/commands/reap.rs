//! # DockHarness Reap Command
//!
//! File: harness/src/commands/reap.rs
//!
//! `dockharness reap NAME...` destroys leftover containers by name, the same
//! way `start` clears a taken name: kill if running, remove, then
//! force-remove the container's named volumes. Names are processed
//! concurrently; every failure is reported and the first one is returned.
//!
use anyhow::Context;
use clap::Parser;
use dockharness::common::docker::collision::destroy_named;
use dockharness::connect_engine;
use dockharness::core::config::load_config;
use dockharness::core::error::Result;
use futures_util::future::join_all;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(about = "Destroy leftover containers and their volumes by name")]
pub struct ReapArgs {
    #[arg(required = true, num_args = 1..)]
    names: Vec<String>,
}

pub async fn handle_reap(args: ReapArgs) -> Result<()> {
    info!("Handling reap command for {:?}", args.names);
    let config = load_config()?;
    let engine = connect_engine(&config.engine).await?;

    let results = join_all(args.names.iter().map(|name| {
        let engine = engine.clone();
        async move { (name, destroy_named(engine.as_ref(), name).await) }
    }))
    .await;

    let mut failures = Vec::new();
    for (name, result) in results {
        match result {
            Ok(true) => println!("Removed container '{}'", name),
            Ok(false) => println!("No container named '{}'", name),
            Err(e) => {
                error!("Failed to reap '{}': {:?}", name, e);
                failures.push((name, e));
            }
        }
    }

    if failures.is_empty() {
        return Ok(());
    }
    eprintln!("\nErrors occurred while reaping:");
    for (name, err) in &failures {
        eprintln!("- {}: {:#}", name, err);
    }
    let (name, first) = failures.remove(0);
    Err(first).with_context(|| format!("Failed to reap container '{}'", name))
}
