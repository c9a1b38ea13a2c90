//! # labtrack
//!
//! Server and CLI surfaces over `labtrack-core`.
//!
//! - [`api`]: axum HTTP API
//! - [`cli`]: clap command line
//! - [`config`]: TOML configuration file and resolved settings

pub mod api;
pub mod cli;
pub mod config;
