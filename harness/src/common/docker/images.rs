//! # DockHarness Docker Image Management
//!
//! File: harness/src/common/docker/images.rs
//!
//! ## Overview
//!
//! Existence checks, pulls and deletions for a single `image:tag`. A blank tag
//! always means `latest`.
//!
//! - **`image_exists`**: inspects the reference; a 404 becomes `Ok(false)`.
//! - **`pull_image`**: drains the pull progress stream to completion, then
//!   re-checks existence. A pull that reports no transport error but leaves no
//!   image behind fails with `HarnessError::ImagePullVerification`.
//! - **`delete_image`**: no-op when the image is absent.
//! - **`ensure_image`**: `image_exists`, then `pull_image` when needed.
//!
//! ```rust,no_run
//! use dockharness::common::docker::{connect::connect_engine, images};
//! use dockharness::core::config::EngineConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = connect_engine(&EngineConfig::default()).await?;
//! if !images::image_exists(engine.as_ref(), "redis", "").await? {
//!     images::pull_image(engine.as_ref(), "redis", "").await?;
//! }
//! images::delete_image(engine.as_ref(), "redis", "latest").await?;
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{is_not_found, HarnessError, Result};
use anyhow::{anyhow, Context};
use futures_util::StreamExt;
use tracing::{debug, error, info, instrument, warn};

use super::engine::ContainerEngine;

/// Tag used when none is given.
pub const DEFAULT_TAG: &str = "latest";

/// Normalizes a blank tag to `latest`.
pub fn normalize_tag(tag: &str) -> &str {
    if tag.trim().is_empty() {
        DEFAULT_TAG
    } else {
        tag
    }
}

/// Builds the `image:tag` reference the engine understands.
pub fn image_reference(image: &str, tag: &str) -> String {
    format!("{}:{}", image, normalize_tag(tag))
}

/// Checks whether `image:tag` is present locally.
///
/// # Errors
///
/// `HarnessError::DockerApi` for anything other than a 404 from the engine.
#[instrument(skip(engine), fields(image = %image, tag = %normalize_tag(tag)))]
pub async fn image_exists(engine: &dyn ContainerEngine, image: &str, tag: &str) -> Result<bool> {
    let reference = image_reference(image, tag);
    match engine.inspect_image(&reference).await {
        Ok(_) => {
            debug!("Image '{}' found locally.", reference);
            Ok(true)
        }
        Err(e) if is_not_found(&e) => {
            debug!("Image '{}' not found locally.", reference);
            Ok(false)
        }
        Err(e) => {
            error!("Error during existence check for image '{}': {:?}", reference, e);
            Err(anyhow!(HarnessError::DockerApi { source: e }))
                .with_context(|| format!("Failed to check existence for image '{}'", reference))
        }
    }
}

/// Pulls `image:tag` and verifies it arrived.
///
/// The whole progress stream is consumed before returning; progress lines are
/// logged at debug level. Error messages embedded in progress records do not
/// abort the drain, but the last one is attached to the verification error if
/// the image turns out to be missing.
///
/// # Errors
///
/// - `HarnessError::DockerApi` if the pull request or its stream fails.
/// - `HarnessError::ImagePullVerification` if the image is absent afterwards.
#[instrument(skip(engine), fields(image = %image, tag = %normalize_tag(tag)))]
pub async fn pull_image(engine: &dyn ContainerEngine, image: &str, tag: &str) -> Result<()> {
    let tag = normalize_tag(tag);
    let reference = image_reference(image, tag);
    info!("Pulling image '{}'...", reference);

    let mut stream = engine.pull_image(image, tag);
    let mut last_reported_error: Option<String> = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(progress) => {
                if let Some(message) = progress.error {
                    warn!("Pull of '{}' reported: {}", reference, message);
                    last_reported_error = Some(message);
                } else if let Some(status) = progress.status {
                    match progress.progress {
                        Some(bar) => debug!("Pull status: {} {}", status, bar),
                        None => debug!("Pull status: {}", status),
                    }
                }
            }
            Err(e) => {
                error!("Pull of '{}' failed: {:?}", reference, e);
                return Err(anyhow!(HarnessError::DockerApi { source: e }))
                    .with_context(|| format!("Failed to pull image '{}'", reference));
            }
        }
    }

    if image_exists(engine, image, tag).await? {
        info!("Image '{}' pulled successfully.", reference);
        Ok(())
    } else {
        Err(anyhow!(HarnessError::ImagePullVerification {
            reference,
            detail: last_reported_error,
        }))
    }
}

/// Removes `image:tag` from the local cache if present.
#[instrument(skip(engine), fields(image = %image, tag = %normalize_tag(tag)))]
pub async fn delete_image(engine: &dyn ContainerEngine, image: &str, tag: &str) -> Result<()> {
    if !image_exists(engine, image, tag).await? {
        debug!("Image '{}' absent, nothing to delete.", image_reference(image, tag));
        return Ok(());
    }
    let reference = image_reference(image, tag);
    info!("Removing image '{}'...", reference);
    engine.remove_image(&reference).await.map_err(|e| {
        error!("Failed to remove image '{}': {:?}", reference, e);
        anyhow!(HarnessError::DockerApi { source: e })
            .context(format!("Failed to remove image '{}'", reference))
    })
}

/// Makes sure `image:tag` is available locally, pulling it when absent.
pub async fn ensure_image(engine: &dyn ContainerEngine, image: &str, tag: &str) -> Result<()> {
    if image_exists(engine, image, tag).await? {
        return Ok(());
    }
    pull_image(engine, image, tag).await
}
