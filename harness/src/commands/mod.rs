//! # DockHarness Command Modules
//!
//! File: harness/src/commands/mod.rs
//!
//! One module per top-level subcommand. Each defines its clap arguments struct
//! and an async `handle_*` function called from `main.rs`.
//!

/// `dockharness image`: exists / pull / rm.
pub mod image;
/// `dockharness reap`: destroy a leftover container by name.
pub mod reap;
/// `dockharness run`: start, hold, stop, and clean up one container.
pub mod run;
