//! Fuse library
//!
//! Build orchestration for the client bundles: mode selection, the bundle
//! plan, the bundler process, live reload, and server supervision.

pub mod cli;
pub mod config;
pub mod bundler;
pub mod orchestrator;
pub mod plugins;
pub mod server;
pub mod supervisor;
pub mod tasks;
pub mod utils;

pub use cli::Cli;
pub use config::{Config, RunMode};
pub use orchestrator::{Orchestrator, Outcome};
