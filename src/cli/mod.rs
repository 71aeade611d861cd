//! Command-line interface for Fuse
//!
//! One invocation runs one build. The flags only choose the mode:
//! - no flag: production build of every bundle
//! - `-d`/`--dev`: watch the app bundle and supervise the server
//! - `-c`/`--dev-configure`: watch the configure bundle and supervise the setup wizard

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::{info, warn};

use crate::config::{Config, RunMode, CONFIG_FILE};
use crate::orchestrator::{Orchestrator, Outcome};

/// Fuse - client asset build and watch orchestrator
#[derive(Parser, Debug)]
#[command(name = "fuse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Start in Developer mode
    #[arg(short, long)]
    pub dev: bool,

    /// Start in Configure Developer mode
    #[arg(short = 'c', long)]
    pub dev_configure: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the config file [default: fuse.toml, optional]
    #[arg(long, env = "FUSE_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        RunMode::resolve(self.dev, self.dev_configure)
    }

    /// Run the selected mode and map the outcome to the process exit status
    pub async fn execute(&self) -> Result<ExitCode> {
        let mode = self.mode();
        print_banner(mode);

        // An explicit path must exist, the implicit fuse.toml may be absent
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_or_default(CONFIG_FILE)?,
        };
        let config = Arc::new(config);

        let mut orchestrator = Orchestrator::with_defaults(config, mode);
        let outcome = orchestrator.run().await;

        if let Outcome::Supervising = outcome {
            eprintln!(
                "  {} Press {} to stop\n",
                "•".dimmed(),
                "Ctrl+C".yellow()
            );

            tokio::select! {
                result = orchestrator.wait() => {
                    if let Err(e) = result {
                        warn!("{}", e);
                        return Ok(ExitCode::FAILURE);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping supervised server");
                }
            }
        }

        Ok(outcome.exit_code())
    }
}

/// Print the mode banner
fn print_banner(mode: RunMode) {
    eprintln!(
        "{}",
        format!(" Starting Fuse in {} mode... ", mode.label())
            .on_white()
            .black()
    );
}
