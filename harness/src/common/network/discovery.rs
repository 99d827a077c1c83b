//! # DockHarness Free Port Discovery
//!
//! File: harness/src/common/network/discovery.rs
//!
//! ## Overview
//!
//! Asks the operating system for a TCP port nobody is listening on. The port
//! is found by binding port 0, reading the number the kernel picked, and
//! releasing the socket again.
//!
//! **Known limitation:** the probe is racy. Between releasing the socket here
//! and the engine binding the port for a container, another process may take
//! it. This is acceptable for short-lived test containers; a collision shows up
//! as an engine error from container start.
//!
use crate::core::error::Result;
use anyhow::Context;
use std::net::{Ipv4Addr, TcpListener};
use tracing::debug;

/// Source of currently unused host TCP ports.
pub trait PortSource: Send + Sync {
    fn allocate_tcp_port(&self) -> Result<u16>;
}

/// `PortSource` that asks the local kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortSource;

impl PortSource for SystemPortSource {
    fn allocate_tcp_port(&self) -> Result<u16> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))
            .context("Failed to bind an ephemeral TCP port")?;
        let port = listener
            .local_addr()
            .context("Failed to read the address of the ephemeral listener")?
            .port();
        debug!("Allocated free TCP port {}", port);
        Ok(port)
    }
}
