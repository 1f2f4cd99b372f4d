//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, init, show)
//! - [`run`] - Main command (generate, upscale and store a batch)

pub mod common;
pub mod config;
pub mod run;
