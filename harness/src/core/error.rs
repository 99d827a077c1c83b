//! # DockHarness Error Types
//!
//! File: harness/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types used throughout DockHarness. Errors are
//! split into a small number of kinds so that test code driving the harness can
//! tell an engine outage apart from a container that simply refused to stop.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `HarnessError`: A custom error enum using `thiserror` for specific error kinds
//! - `Result<T>`: A type alias for `anyhow::Result<T>` so call sites can add context
//!
//! The kinds fall into these groups:
//! - Engine communication failures (`DockerApi`), always propagated with context
//! - Post-condition verification failures (`ImagePullVerification`, `DidNotStop`,
//!   `ContainerVanished`), raised when the engine reported success but the effect
//!   did not happen
//! - Synthesized timeouts (`Timeout`) from the bounded wait helpers
//! - Policy and state errors (`NameConflict`, `DescriptorRemoved`, `Config`,
//!   `InvalidPortMapping`)
//!
//! "Not found" answers from the engine are normally folded into `false` by the
//! callers in `common::docker` and never reach this enum.
//!
//! ## Examples
//!
//! ```rust
//! use dockharness::core::error::HarnessError;
//!
//! # async fn example(container: &dockharness::Container) -> anyhow::Result<()> {
//! match container.stop(5).await {
//!     Ok(()) => {}
//!     Err(e) if e.downcast_ref::<HarnessError>().is_some_and(|he| matches!(he, HarnessError::DidNotStop { .. })) => {
//!         eprintln!("container ignored SIGKILL: {e}");
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
use thiserror::Error;

/// Custom error type for DockHarness.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Docker API interaction failed: {source}")]
    DockerApi {
        #[from]
        source: bollard::errors::Error,
    },

    #[error("Image '{reference}' did not successfully pull{}", detail_suffix(.detail))]
    ImagePullVerification {
        reference: String,
        detail: Option<String>,
    },

    #[error("Container '{id}' did not stop.")]
    DidNotStop { id: String },

    #[error("Container '{id}' was created but could not be found afterwards.")]
    ContainerVanished { id: String },

    #[error("A container named '{name}' already exists (id {id}).")]
    NameConflict { name: String, id: String },

    #[error("Container descriptor was already cleaned up; construct a new one to start again.")]
    DescriptorRemoved,

    #[error("Timed out after {waited_ms} ms waiting for container '{id}' to become {target}.")]
    Timeout {
        id: String,
        target: &'static str,
        waited_ms: u128,
    },

    #[error("Invalid port mapping '{0}'. Expected CONTAINER or HOST:CONTAINER.")]
    InvalidPortMapping(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Type alias for Result using anyhow::Error.
pub type Result<T> = anyhow::Result<T>;

/// Returns true when a Docker API error is a 404 Not Found response.
pub fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Returns true when a Docker API error is a 409 Conflict response.
pub fn is_conflict(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            ..
        }
    )
}
