//! # DockHarness Core Infrastructure
//!
//! File: harness/src/core/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the infrastructure shared by the library and the
//! binary: configuration and error handling.
//!
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error types and error handling utilities
//!
//! ```rust
//! use dockharness::core::config; // For loading configuration
//! use dockharness::core::error::{HarnessError, Result}; // For error handling
//! ```
//!
pub mod config;
pub mod error;
