//! Build backend
//!
//! The bundler itself runs out of process. [`ProcessBackend`] starts it, feeds
//! it the plan as JSON on stdin and follows the JSON-line events it prints on
//! stdout. Lines that are not events are the bundler's own log output and are
//! passed through.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{BundlePlan, DevOptions};
use crate::config::Config;
use crate::server::{DevServer, HmrMessage, LiveReload, ServerError, HMR_PATH};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to start build backend '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The bundler reported a failed build
    #[error("{0}")]
    Build(String),

    #[error("build backend exited with {0}")]
    Exited(ExitStatus),

    #[error("failed to encode bundle plan: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    LiveReload(#[from] ServerError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Events the bundler prints on stdout, one JSON object per line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BackendEvent {
    /// A bundle was written
    Bundled {
        bundle: String,
        #[serde(default)]
        size: Option<u64>,
    },

    /// The initial pass over every target finished
    Ready,

    /// The watched bundle was rebuilt after a source change
    Rebuilt {
        bundle: String,
        #[serde(default)]
        files: Vec<String>,
    },

    /// The build failed
    Error { message: String },
}

impl BackendEvent {
    /// Parse an output line, `None` for plain log lines
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

/// Information about a generated bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    pub name: String,

    /// Bundle size in bytes, when the bundler reports it
    pub size: Option<u64>,
}

/// Result of the initial build pass
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub bundles: Vec<BundleInfo>,
    pub elapsed: Duration,
}

/// Executes bundle plans
#[async_trait]
pub trait BuildBackend: Send {
    /// Enable the live-reload transport for rebuilds of the watched target
    async fn dev(&mut self, options: &DevOptions) -> Result<(), BackendError>;

    /// Run every target in the plan.
    ///
    /// Resolves once the initial pass completes. A watched target keeps
    /// rebuilding afterwards without blocking the caller.
    async fn run(&mut self, plan: &BundlePlan) -> Result<BuildReport, BackendError>;
}

/// Runs the bundler as a child process
pub struct ProcessBackend {
    program: String,
    args: Vec<String>,
    root: PathBuf,
    output_dir: PathBuf,
    live_reload: Option<LiveReload>,
    watcher: Option<JoinHandle<()>>,
}

impl ProcessBackend {
    pub fn new(config: &Config) -> Self {
        let output_dir = Path::new(&config.bundle.output)
            .parent()
            .map(|dir| config.root.join(dir))
            .unwrap_or_else(|| config.root.clone());

        Self {
            program: config.backend.program.clone(),
            args: config.backend.args.clone(),
            root: config.root.clone(),
            output_dir,
            live_reload: None,
            watcher: None,
        }
    }

    pub fn live_reload(&self) -> Option<&LiveReload> {
        self.live_reload.as_ref()
    }

    /// Whether a watched target is still being followed
    pub fn is_watching(&self) -> bool {
        self.watcher.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn spawn(&self) -> Result<Child, BackendError> {
        debug!("Starting build backend: {} {}", self.program, self.args.join(" "));

        Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

#[async_trait]
impl BuildBackend for ProcessBackend {
    async fn dev(&mut self, options: &DevOptions) -> Result<(), BackendError> {
        if self.live_reload.is_some() {
            return Ok(());
        }

        let live_reload = DevServer::new(options.clone(), self.output_dir.clone())
            .start()
            .await?;

        eprintln!(
            "{} Live reload on {}",
            "└──".white(),
            format!("ws://{}{}", live_reload.local_addr(), HMR_PATH).cyan()
        );

        self.live_reload = Some(live_reload);
        Ok(())
    }

    async fn run(&mut self, plan: &BundlePlan) -> Result<BuildReport, BackendError> {
        let start = Instant::now();
        let payload = serde_json::to_vec(plan)?;

        let mut child = self.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = write_plan(&mut stdin, &payload).await {
                // The backend may exit without reading the plan; its exit
                // status tells the real story.
                if e.kind() != io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
                debug!("Build backend closed stdin early");
            }
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "build backend stdout not captured"))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut bundles = Vec::new();

        let ready = loop {
            let Some(line) = lines.next_line().await? else {
                break false;
            };

            match BackendEvent::parse(&line) {
                Some(BackendEvent::Ready) => break true,
                Some(BackendEvent::Error { message }) => {
                    let _ = child.kill().await;
                    return Err(BackendError::Build(message));
                }
                Some(BackendEvent::Bundled { bundle, size }) => {
                    debug!("Bundle '{}' written", bundle);
                    bundles.push(BundleInfo { name: bundle, size });
                }
                Some(BackendEvent::Rebuilt { bundle, .. }) => {
                    debug!("Ignoring rebuild of '{}' before the initial pass", bundle);
                }
                None => passthrough(&line),
            }
        };

        if ready && plan.watched().is_some() {
            let live_reload = self.live_reload.as_ref().map(LiveReload::sender);
            self.watcher = Some(tokio::spawn(follow_rebuilds(child, lines, live_reload)));
        } else {
            // Drain the rest so the backend never blocks on a full pipe
            while let Some(line) = lines.next_line().await? {
                match BackendEvent::parse(&line) {
                    Some(BackendEvent::Error { message }) => {
                        let _ = child.kill().await;
                        return Err(BackendError::Build(message));
                    }
                    Some(BackendEvent::Bundled { bundle, size }) => {
                        bundles.push(BundleInfo { name: bundle, size });
                    }
                    Some(_) => {}
                    None => passthrough(&line),
                }
            }

            let status = child.wait().await?;
            if !status.success() {
                return Err(BackendError::Exited(status));
            }
        }

        Ok(BuildReport {
            bundles,
            elapsed: start.elapsed(),
        })
    }
}

async fn write_plan(stdin: &mut tokio::process::ChildStdin, payload: &[u8]) -> io::Result<()> {
    stdin.write_all(payload).await?;
    stdin.write_all(b"\n").await?;
    stdin.shutdown().await
}

fn passthrough(line: &str) {
    println!("{}", line);
}

/// Follow the watched target after the initial pass
async fn follow_rebuilds(
    mut child: Child,
    mut lines: Lines<BufReader<ChildStdout>>,
    live_reload: Option<broadcast::Sender<HmrMessage>>,
) {
    let notify = |message: HmrMessage| {
        if let Some(tx) = &live_reload {
            let _ = tx.send(message);
        }
    };

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match BackendEvent::parse(&line) {
                Some(BackendEvent::Rebuilt { bundle, files }) => {
                    eprintln!("  {} Rebuilt {}", "↻".yellow(), bundle.cyan());
                    notify(HmrMessage::for_rebuild(&bundle, files));
                }
                Some(BackendEvent::Error { message }) => {
                    warn!("Rebuild failed: {}", message);
                    notify(HmrMessage::Error {
                        message,
                        bundle: None,
                    });
                }
                Some(_) => {}
                None => passthrough(&line),
            },
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read build backend output: {}", e);
                break;
            }
        }
    }

    match child.wait().await {
        Ok(status) if status.success() => info!("Build backend stopped watching"),
        Ok(status) => warn!("Build backend exited with {}", status),
        Err(e) => error!("Failed to wait for build backend: {}", e),
    }
}
