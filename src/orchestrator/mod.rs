//! Build orchestration
//!
//! Runs one invocation from start to finish: global tasks, plan, the initial
//! build pass, then (in development modes) the hand-off to the server
//! supervisor. Every phase is awaited in order and every failure is fatal.

mod state;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use thiserror::Error;
use tracing::{debug, info};

use crate::bundler::{BackendError, BuildBackend, BundlePlan, PlanError, ProcessBackend, TargetKind};
use crate::config::{Config, RunMode};
use crate::supervisor::{Nodemon, SupervisedProcessSpec, Supervisor, SupervisorError};
use crate::tasks::{ShellTasks, TaskError, TaskRunner};
use crate::utils::{format_duration, format_size};

pub use state::{IllegalTransition, OrchestratorState, StateMachine, TransitionRecord};

/// Why a run ended in `Failed`
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Global tasks failed! {0}")]
    Prerequisites(#[source] TaskError),

    #[error("Bundle plan is invalid! {0}")]
    Plan(#[from] PlanError),

    #[error("Live reload failed to start! {0}")]
    LiveReload(#[source] BackendError),

    #[error("Bundle compilation failed! {0}")]
    Build(#[source] BackendError),

    #[error("Server supervisor failed to start! {0}")]
    Supervisor(#[source] SupervisorError),

    #[error(transparent)]
    State(#[from] IllegalTransition),
}

/// How a run ended
#[derive(Debug)]
pub enum Outcome {
    /// Production build finished, nothing keeps running
    Built,
    /// The server is running under the supervisor
    Supervising,
    /// A phase failed
    Failed(OrchestratorError),
}

impl Outcome {
    /// Process exit status for this outcome
    pub fn status(&self) -> u8 {
        match self {
            Self::Built | Self::Supervising => 0,
            Self::Failed(_) => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }
}

/// Drives one run through the state machine
pub struct Orchestrator {
    config: Arc<Config>,
    mode: RunMode,
    tasks: Box<dyn TaskRunner>,
    backend: Box<dyn BuildBackend>,
    supervisor: Box<dyn Supervisor>,
    machine: StateMachine,
}

impl Orchestrator {
    pub fn new(
        config: Arc<Config>,
        mode: RunMode,
        tasks: Box<dyn TaskRunner>,
        backend: Box<dyn BuildBackend>,
        supervisor: Box<dyn Supervisor>,
    ) -> Self {
        Self {
            config,
            mode,
            tasks,
            backend,
            supervisor,
            machine: StateMachine::new(),
        }
    }

    /// Orchestrator using shell tasks, the bundler process and nodemon
    pub fn with_defaults(config: Arc<Config>, mode: RunMode) -> Self {
        let tasks = Box::new(ShellTasks::new(&config));
        let backend = Box::new(ProcessBackend::new(&config));
        let supervisor = Box::new(Nodemon::new(&config));
        Self::new(config, mode, tasks, backend, supervisor)
    }

    pub fn state(&self) -> OrchestratorState {
        self.machine.current()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Run every phase once and report how the run ended
    pub async fn run(&mut self) -> Outcome {
        match self.drive().await {
            Ok(outcome) => outcome,
            Err(error) => {
                let message = error.to_string();
                if let Err(e) = self.machine.fail(&message) {
                    debug!("{}", e);
                }
                eprintln!("{}", format!(" X {}", message).red());
                Outcome::Failed(error)
            }
        }
    }

    /// Park while the supervised server runs
    pub async fn wait(&mut self) -> Result<(), SupervisorError> {
        self.supervisor.wait().await
    }

    async fn drive(&mut self) -> Result<Outcome, OrchestratorError> {
        self.machine.advance(OrchestratorState::PrerequisitesRunning, None)?;
        eprintln!("{}{}", "└── ".white(), "Running global tasks...".green());
        self.tasks
            .run_all()
            .await
            .map_err(OrchestratorError::Prerequisites)?;

        let mut plan = BundlePlan::build(&self.config, self.mode)?;
        if let Some(kind) = self.mode.watch_target() {
            plan.watch(kind)?;
        }
        self.machine.advance(OrchestratorState::PlanBuilt, None)?;

        if let Some(dev) = &plan.dev {
            self.backend
                .dev(dev)
                .await
                .map_err(OrchestratorError::LiveReload)?;
        }

        let watched = plan.watched();
        let next = match watched {
            Some(_) => OrchestratorState::Watching,
            None => OrchestratorState::Building,
        };
        self.machine.advance(next, watched.map(TargetKind::name))?;

        match watched {
            Some(kind) => info!("Bundling {} targets, watching '{}'", plan.targets.len(), kind),
            None => info!("Bundling {} targets", plan.targets.len()),
        }

        let report = self.backend.run(&plan).await.map_err(OrchestratorError::Build)?;
        self.machine.advance(OrchestratorState::Succeeded, None)?;

        eprintln!(
            "{} {}",
            "\nAssets compilation + bundling completed.".green().bold(),
            format!("({})", format_duration(report.elapsed)).dimmed()
        );
        for bundle in &report.bundles {
            let output = plan.output_of(&bundle.name).unwrap_or_default();
            let size = bundle.size.map(format_size).unwrap_or_default();
            eprintln!(
                "  {} {} {} {}",
                "•".dimmed(),
                bundle.name.cyan(),
                output,
                size.dimmed()
            );
        }

        let Some(spec) = SupervisedProcessSpec::for_mode(&self.config, self.mode) else {
            return Ok(Outcome::Built);
        };

        self.supervisor
            .launch(&spec)
            .await
            .map_err(OrchestratorError::Supervisor)?;
        self.machine
            .advance(OrchestratorState::SupervisorLaunched, Some(&spec.exec))?;

        Ok(Outcome::Supervising)
    }
}
