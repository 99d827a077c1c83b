//! # DockHarness Main Entry Point
//!
//! File: harness/src/main.rs
//!
//! ## Overview
//!
//! Command-line front end over the `dockharness` library:
//!
//! - `run`: start a container, print its ports, hold it, then stop and clean up
//! - `image`: check, pull, or delete an image
//! - `reap`: destroy a leftover container by name, with its volumes
//!
//! ```bash
//! dockharness -v run --image postgres --tag 16 --name it-test -p 5432 -e POSTGRES_PASSWORD=secret
//! dockharness image exists redis --tag 7
//! dockharness reap it-test
//! ```
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "dockharness",
    about = "Disposable Docker containers for integration tests",
    long_about = "Start, inspect, and tear down the throwaway containers integration tests run against.\n\
                  Configuration is read from the user config file and .dockharness.toml.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Parser, Debug)]
enum Commands {
    Run(commands::run::RunArgs),
    #[command(alias = "i")]
    Image(commands::image::ImageArgs),
    Reap(commands::reap::ReapArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Run(args) => commands::run::handle_run(args).await,
        Commands::Image(args) => commands::image::handle_image(args).await,
        Commands::Reap(args) => commands::reap::handle_reap(args).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
