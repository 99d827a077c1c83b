//! # DockHarness Lifecycle Integration Tests
//!
//! File: harness/tests/lifecycle.rs
//!
//! End-to-end runs against a real Docker daemon. Ignored by default; run with
//! `cargo test -- --ignored` on a machine with Docker available.
//!

mod common;
use common::*;

use dockharness::common::docker::images;
use dockharness::{Container, ContainerDescriptor, ContainerEngine, HarnessError, Phase};
use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

/// True when a full listing, stopped containers included, still has `id`.
async fn listed(engine: &Arc<dyn ContainerEngine>, id: &str) -> bool {
    engine
        .list_containers(true)
        .await
        .unwrap()
        .iter()
        .any(|c| c.id.as_deref() == Some(id))
}

fn redis(name: &str) -> ContainerDescriptor {
    ContainerDescriptor::new(name, TEST_IMAGE, TEST_TAG, Default::default(), no_env())
        .expose("6379")
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_start_stop_cleanup_roundtrip() {
    let engine = engine().await;
    let container = Container::new(engine.clone(), redis("it-test"));

    let ports = container.start().await.unwrap();
    assert!(container.is_running().await.unwrap());
    let id = container.container_id().await;
    container
        .wait_until_running(Duration::from_secs(10))
        .await
        .unwrap();

    let host_port: u16 = ports["6379"].parse().unwrap();
    let mut connected = false;
    for _ in 0..50 {
        if TcpStream::connect(("127.0.0.1", host_port)).is_ok() {
            connected = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(connected, "nothing listening on host port {host_port}");

    // The redis image declares `VOLUME /data`.
    let volumes = container.volumes().await;
    assert!(!volumes.is_empty());

    container.stop(5).await.unwrap();
    assert!(!container.is_running().await.unwrap());
    container.cleanup().await.unwrap();
    assert_eq!(container.phase().await, Phase::Removed);
    assert!(!listed(&engine, &id).await, "container {id} survived cleanup");

    for volume in volumes {
        let filters = HashMap::from([("name".to_string(), vec![volume.clone()])]);
        let listed = engine.list_volumes(filters).await.unwrap();
        assert!(listed.iter().all(|v| v.name != volume), "volume {volume} survived");
    }
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_reused_name_replaces_leftover() {
    let engine = engine().await;
    let leftover = Container::new(engine.clone(), redis("dockharness-it-reuse"));
    leftover.start().await.unwrap();
    let leftover_id = leftover.container_id().await;

    // Simulates a crashed run: the first container is never cleaned up.
    let fresh = Container::new(engine.clone(), redis("dockharness-it-reuse"));
    fresh.start().await.unwrap();
    let fresh_id = fresh.container_id().await;
    assert_ne!(fresh_id, leftover_id);
    assert!(!listed(&engine, &leftover_id).await, "leftover {leftover_id} still listed");

    fresh.kill().await.unwrap();
    fresh.cleanup().await.unwrap();
    assert!(!listed(&engine, &fresh_id).await);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_start_after_cleanup_is_rejected() {
    let container = Container::new(engine().await, redis(""));
    container.start().await.unwrap();
    container.cleanup().await.unwrap();

    let err = container.start().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<HarnessError>(),
        Some(HarnessError::DescriptorRemoved)
    ));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_pull_and_delete_image() {
    let engine = engine().await;
    images::pull_image(engine.as_ref(), "hello-world", "").await.unwrap();
    assert!(images::image_exists(engine.as_ref(), "hello-world", "latest")
        .await
        .unwrap());

    images::delete_image(engine.as_ref(), "hello-world", "").await.unwrap();
    assert!(!images::image_exists(engine.as_ref(), "hello-world", "")
        .await
        .unwrap());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_pull_of_unknown_image_fails() {
    let engine = engine().await;
    let result = images::pull_image(engine.as_ref(), "dockharness-no-such-image-4242", "").await;
    assert!(result.is_err());
}
