//! Global prerequisite tasks
//!
//! Commands that prepare the client sources before bundling (vendored
//! assets, generated preinit scripts). They run in order and all of them must
//! succeed.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to start task '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("task '{command}' exited with {status}{}", detail(.stderr))]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

fn detail(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr)
    }
}

/// Runs every prerequisite task, resolving when all have completed
#[async_trait]
pub trait TaskRunner: Send {
    async fn run_all(&mut self) -> Result<(), TaskError>;
}

/// Runs configured shell commands through `sh -c`
pub struct ShellTasks {
    commands: Vec<String>,
    root: PathBuf,
}

impl ShellTasks {
    pub fn new(config: &Config) -> Self {
        Self {
            commands: config.tasks.commands.clone(),
            root: config.root.clone(),
        }
    }

    /// Run one command, showing its output above the spinner once it ends
    async fn run_one(&self, command: &str, spinner: &ProgressBar) -> Result<(), TaskError> {
        debug!("Running task: {}", command);

        let output = Command::new("sh")
            .args(["-c", command])
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TaskError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.is_empty() {
            spinner.suspend(|| print!("{}", stdout));
        }

        if !output.status.success() {
            return Err(TaskError::Failed {
                command: command.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl TaskRunner for ShellTasks {
    async fn run_all(&mut self) -> Result<(), TaskError> {
        for command in &self.commands {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("    {spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(command.clone());
            spinner.enable_steady_tick(Duration::from_millis(100));

            let result = self.run_one(command, &spinner).await;
            spinner.finish_and_clear();
            result?;
        }

        Ok(())
    }
}
