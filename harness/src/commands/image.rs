//! # DockHarness Image Command
//!
//! File: harness/src/commands/image.rs
//!
//! `dockharness image exists|pull|rm IMAGE [--tag TAG]`. A blank tag means
//! `latest`; `rm` on an absent image succeeds.
//!
use clap::{Parser, Subcommand};
use dockharness::common::docker::images::{self, image_reference};
use dockharness::connect_engine;
use dockharness::core::config::load_config;
use dockharness::core::error::Result;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Check, pull, or delete an image")]
pub struct ImageArgs {
    #[command(subcommand)]
    command: ImageCommand,
}

#[derive(Subcommand, Debug)]
enum ImageCommand {
    /// Report whether the image is present locally.
    Exists(ImageRef),
    /// Pull the image and verify it arrived.
    Pull(ImageRef),
    /// Remove the image from the local cache.
    Rm(ImageRef),
}

#[derive(Parser, Debug)]
struct ImageRef {
    image: String,
    #[arg(long, default_value = "")]
    tag: String,
}

pub async fn handle_image(args: ImageArgs) -> Result<()> {
    info!("Handling image command: {:?}", args);
    let config = load_config()?;
    let engine = connect_engine(&config.engine).await?;
    let engine = engine.as_ref();

    match args.command {
        ImageCommand::Exists(r) => {
            let present = images::image_exists(engine, &r.image, &r.tag).await?;
            let reference = image_reference(&r.image, &r.tag);
            println!("{}: {}", reference, if present { "present" } else { "absent" });
        }
        ImageCommand::Pull(r) => {
            images::pull_image(engine, &r.image, &r.tag).await?;
            println!("Pulled {}", image_reference(&r.image, &r.tag));
        }
        ImageCommand::Rm(r) => {
            images::delete_image(engine, &r.image, &r.tag).await?;
            println!("Removed {}", image_reference(&r.image, &r.tag));
        }
    }
    Ok(())
}
