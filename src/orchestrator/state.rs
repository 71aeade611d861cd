//! Orchestrator states and legal transitions
//!
//! Every run starts at `Idle` and ends at `Failed`, at `Succeeded` for a
//! production build, or at `SupervisorLaunched` in a development mode:
//! ```text
//! Idle → PrerequisitesRunning → PlanBuilt → Building | Watching
//! Building | Watching → Succeeded → SupervisorLaunched
//! any non-terminal → Failed
//! ```

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    /// Global tasks are running
    PrerequisitesRunning,
    /// The bundle plan is ready for submission
    PlanBuilt,
    /// One-shot build of every target
    Building,
    /// Initial pass with one target under continuous rebuild
    Watching,
    /// Initial pass completed
    Succeeded,
    /// Server handed to the supervisor, terminal state
    SupervisorLaunched,
    /// Terminal state, the process exits with status 1
    Failed,
}

impl OrchestratorState {
    /// Whether no transition may leave this state.
    ///
    /// `Succeeded` is not terminal here: development modes continue to
    /// `SupervisorLaunched`, and a failed launch still ends in `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SupervisorLaunched | Self::Failed)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::PrerequisitesRunning => "PrerequisitesRunning",
            Self::PlanBuilt => "PlanBuilt",
            Self::Building => "Building",
            Self::Watching => "Watching",
            Self::Succeeded => "Succeeded",
            Self::SupervisorLaunched => "SupervisorLaunched",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

fn is_legal_transition(from: OrchestratorState, to: OrchestratorState) -> bool {
    use OrchestratorState::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Idle, PrerequisitesRunning)
            | (PrerequisitesRunning, PlanBuilt)
            | (PlanBuilt, Building)
            | (PlanBuilt, Watching)
            | (Building, Succeeded)
            | (Watching, Succeeded)
            | (Succeeded, SupervisorLaunched)
    )
}

/// A single recorded state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: OrchestratorState,
    pub to: OrchestratorState,
    /// Milliseconds since the state machine was created
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("illegal state transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: OrchestratorState,
    pub to: OrchestratorState,
}

/// Tracks the current state and the transitions that led to it
pub struct StateMachine {
    current: OrchestratorState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: OrchestratorState::Idle,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> OrchestratorState {
        self.current
    }

    /// Move to `to` if the edge exists in the state graph
    pub fn advance(
        &mut self,
        to: OrchestratorState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, "State transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(OrchestratorState::Failed, Some(reason))
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// The visited states in order, starting with `Idle`
    pub fn path(&self) -> Vec<OrchestratorState> {
        std::iter::once(OrchestratorState::Idle)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrchestratorState::*;

    #[test]
    fn test_build_path() {
        let mut sm = StateMachine::new();
        for to in [PrerequisitesRunning, PlanBuilt, Building, Succeeded] {
            sm.advance(to, None).unwrap();
        }
        assert_eq!(sm.current(), Succeeded);
        assert_eq!(sm.path(), vec![Idle, PrerequisitesRunning, PlanBuilt, Building, Succeeded]);
    }

    #[test]
    fn test_dev_path() {
        let mut sm = StateMachine::new();
        for to in [PrerequisitesRunning, PlanBuilt, Watching, Succeeded, SupervisorLaunched] {
            sm.advance(to, None).unwrap();
        }
        assert!(sm.current().is_terminal());
    }

    #[test]
    fn test_skipping_states_is_illegal() {
        let mut sm = StateMachine::new();
        let err = sm.advance(PlanBuilt, None).unwrap_err();
        assert_eq!(err.from, Idle);
        assert_eq!(err.to, PlanBuilt);
        assert_eq!(sm.current(), Idle);
    }

    #[test]
    fn test_no_second_build_cycle() {
        let mut sm = StateMachine::new();
        for to in [PrerequisitesRunning, PlanBuilt, Building, Succeeded] {
            sm.advance(to, None).unwrap();
        }
        assert!(sm.advance(Building, None).is_err());
        assert!(sm.advance(PrerequisitesRunning, None).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut sm = StateMachine::new();
        sm.advance(PrerequisitesRunning, None).unwrap();
        sm.fail("task exited with 1").unwrap();

        assert!(sm.fail("again").is_err());
        assert!(sm.advance(PlanBuilt, None).is_err());
        assert_eq!(sm.transitions().last().unwrap().reason.as_deref(), Some("task exited with 1"));
    }

    #[test]
    fn test_supervisor_launched_cannot_fail() {
        let mut sm = StateMachine::new();
        for to in [PrerequisitesRunning, PlanBuilt, Watching, Succeeded, SupervisorLaunched] {
            sm.advance(to, None).unwrap();
        }
        assert!(sm.fail("late").is_err());
    }
}
