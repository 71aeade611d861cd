//! Server process supervision
//!
//! Once the initial build succeeds in a development mode, the server is
//! handed to nodemon, which owns restarts from then on.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::{Config, RunMode};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid path pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to start supervisor '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("supervisor exited with {0}")]
    Exited(ExitStatus),

    #[error("supervisor was not launched")]
    NotLaunched,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What the supervisor runs and which changes restart it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisedProcessSpec {
    /// Command line of the server
    pub exec: String,

    /// Paths whose changes never restart the server
    pub ignore: Vec<String>,

    /// Paths whose changes restart the server
    pub watch: Vec<String>,

    /// File extensions that count as changes
    pub ext: Vec<String>,

    /// Extra environment for the server
    pub env: BTreeMap<String, String>,
}

impl SupervisedProcessSpec {
    /// Spec for a development mode, `None` for a production build
    pub fn for_mode(config: &Config, mode: RunMode) -> Option<Self> {
        let supervisor = &config.supervisor;
        let (exec, watch) = match mode {
            RunMode::Build => return None,
            RunMode::Dev => (&supervisor.server_exec, &supervisor.server_watch),
            RunMode::DevConfigure => (&supervisor.configure_exec, &supervisor.configure_watch),
        };

        let mut env = BTreeMap::new();
        env.insert("NODE_ENV".to_string(), mode.node_env().to_string());

        Some(Self {
            exec: exec.clone(),
            ignore: supervisor.ignore.clone(),
            watch: watch.clone(),
            ext: supervisor.ext.clone(),
            env,
        })
    }

    /// Compile the ignore list, rejecting malformed patterns
    pub fn ignore_set(&self) -> Result<GlobSet, SupervisorError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore {
            let glob = Glob::new(&directory_glob(pattern)).map_err(|source| SupervisorError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| SupervisorError::Pattern {
            pattern: self.ignore.join(", "),
            source,
        })
    }

    /// Command-line arguments for nodemon
    pub fn nodemon_args(&self) -> Vec<String> {
        let mut args = vec!["--exec".to_string(), self.exec.clone()];
        for pattern in &self.ignore {
            args.push("--ignore".to_string());
            args.push(pattern.clone());
        }
        for path in &self.watch {
            args.push("--watch".to_string());
            args.push(path.clone());
        }
        args.push("--ext".to_string());
        args.push(self.ext.join(" "));
        args
    }
}

/// `assets/` means everything below the directory
fn directory_glob(pattern: &str) -> String {
    match pattern.strip_suffix('/') {
        Some(dir) => format!("{}/**", dir),
        None => pattern.to_string(),
    }
}

/// Launches and owns the supervised server
#[async_trait]
pub trait Supervisor: Send {
    async fn launch(&mut self, spec: &SupervisedProcessSpec) -> Result<(), SupervisorError>;

    /// Park until the supervised process ends
    async fn wait(&mut self) -> Result<(), SupervisorError>;
}

/// Supervises the server with nodemon
pub struct Nodemon {
    program: String,
    root: PathBuf,
    child: Option<Child>,
}

impl Nodemon {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.supervisor.program.clone(),
            root: config.root.clone(),
            child: None,
        }
    }
}

#[async_trait]
impl Supervisor for Nodemon {
    async fn launch(&mut self, spec: &SupervisedProcessSpec) -> Result<(), SupervisorError> {
        spec.ignore_set()?;

        let args = spec.nodemon_args();
        debug!("Launching {} {}", self.program, args.join(" "));

        let child = Command::new(&self.program)
            .args(&args)
            .envs(&spec.env)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        info!("Supervising '{}' (watching {})", spec.exec, spec.watch.join(", "));
        self.child = Some(child);
        Ok(())
    }

    async fn wait(&mut self) -> Result<(), SupervisorError> {
        let child = self.child.as_mut().ok_or(SupervisorError::NotLaunched)?;
        let status = child.wait().await?;
        self.child = None;

        if status.success() {
            Ok(())
        } else {
            Err(SupervisorError::Exited(status))
        }
    }
}
