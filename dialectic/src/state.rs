//! Run state machine: phases, transitions, and session tracking.
//!
//! ```text
//! Initialized → TracesRunning → TracesComplete → Arbitrating → Verdicted
//!      │              │                │               │
//!      └──────────────┴────────────────┴───────────────┴──→ Failed
//! ```
//!
//! No phase may be skipped. `Arbitrating` is entered only from
//! `TracesComplete`, and only with at least two completed traces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum completed traces required before arbitration may begin.
pub const MIN_COMPLETED_TRACES: usize = 2;

/// Phase of a single orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Session created, nothing dispatched.
    Initialized,
    /// Trace generations are outstanding.
    TracesRunning,
    /// Every trace reached Completed or Failed.
    TracesComplete,
    /// The arbitration generation is outstanding.
    Arbitrating,
    /// A verdict was produced.
    Verdicted,
    /// Terminal failure at some stage.
    Failed,
}

impl RunPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Verdicted | Self::Failed)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [RunPhase] {
        match self {
            Self::Initialized => &[Self::TracesRunning, Self::Failed],
            Self::TracesRunning => &[Self::TracesComplete, Self::Failed],
            Self::TracesComplete => &[Self::Arbitrating, Self::Failed],
            Self::Arbitrating => &[Self::Verdicted, Self::Failed],
            Self::Verdicted | Self::Failed => &[],
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::TracesRunning => write!(f, "traces_running"),
            Self::TracesComplete => write!(f, "traces_complete"),
            Self::Arbitrating => write!(f, "arbitrating"),
            Self::Verdicted => write!(f, "verdicted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: RunPhase,
    pub to: RunPhase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} → {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

/// State and transition history of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSession {
    /// Unique run identifier.
    pub id: String,
    /// Current phase.
    pub phase: RunPhase,
    /// Transition history.
    pub transitions: Vec<PhaseTransition>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
}

impl RunSession {
    /// Create a session with a fresh random id.
    pub fn new() -> Self {
        Self::with_id(&uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            phase: RunPhase::Initialized,
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: RunPhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }

        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;
        Ok(())
    }

    /// TracesComplete → Arbitrating, guarded by the completed-trace count.
    pub fn begin_arbitration(&mut self, completed: usize) -> Result<(), TransitionError> {
        if completed < MIN_COMPLETED_TRACES {
            return Err(TransitionError {
                from: self.phase,
                to: RunPhase::Arbitrating,
                reason: format!(
                    "{completed} completed traces, at least {MIN_COMPLETED_TRACES} required"
                ),
            });
        }
        self.transition(
            RunPhase::Arbitrating,
            &format!("{completed} completed traces"),
        )
    }

    /// Move to `Failed` unless already terminal.
    pub fn fail(&mut self, reason: &str) {
        if !self.phase.is_terminal() {
            // Every non-terminal phase may move to Failed.
            let _ = self.transition(RunPhase::Failed, reason);
        }
    }

    /// Whether the run has ended.
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] run={} | {} transitions",
            self.phase,
            self.id,
            self.transitions.len()
        )
    }
}

impl Default for RunSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_traces_complete() -> RunSession {
        let mut session = RunSession::with_id("r-001");
        session
            .transition(RunPhase::TracesRunning, "dispatched")
            .unwrap();
        session
            .transition(RunPhase::TracesComplete, "barrier reached")
            .unwrap();
        session
    }

    #[test]
    fn test_new_session() {
        let session = RunSession::with_id("r-001");
        assert_eq!(session.phase, RunPhase::Initialized);
        assert!(session.transitions.is_empty());
        assert!(!session.is_complete());
    }

    #[test]
    fn test_random_ids_differ() {
        assert_ne!(RunSession::new().id, RunSession::new().id);
    }

    #[test]
    fn test_happy_path() {
        let mut session = at_traces_complete();
        session.begin_arbitration(3).unwrap();
        session
            .transition(RunPhase::Verdicted, "verdict parsed")
            .unwrap();
        assert!(session.is_complete());
        assert_eq!(session.transitions.len(), 4);
        assert_eq!(session.transitions[0].from, RunPhase::Initialized);
        assert_eq!(session.transitions[3].to, RunPhase::Verdicted);
    }

    #[test]
    fn test_cannot_skip_to_arbitrating() {
        let mut session = RunSession::with_id("r-002");
        session
            .transition(RunPhase::TracesRunning, "dispatched")
            .unwrap();
        let err = session.begin_arbitration(3).unwrap_err();
        assert_eq!(err.from, RunPhase::TracesRunning);
        assert_eq!(err.to, RunPhase::Arbitrating);
    }

    #[test]
    fn test_cannot_skip_initialized_to_verdicted() {
        let mut session = RunSession::with_id("r-003");
        let err = session
            .transition(RunPhase::Verdicted, "skip")
            .unwrap_err();
        assert_eq!(err.from, RunPhase::Initialized);
    }

    #[test]
    fn test_arbitration_needs_two_completed() {
        let mut session = at_traces_complete();
        let err = session.begin_arbitration(1).unwrap_err();
        assert!(err.reason.contains("at least 2"));
        assert_eq!(session.phase, RunPhase::TracesComplete);
        session.begin_arbitration(2).unwrap();
        assert_eq!(session.phase, RunPhase::Arbitrating);
    }

    #[test]
    fn test_fail_from_any_open_phase() {
        let mut session = at_traces_complete();
        session.fail("insufficient traces");
        assert_eq!(session.phase, RunPhase::Failed);

        // Failing again is a no-op.
        session.fail("again");
        assert_eq!(session.transitions.len(), 3);
    }

    #[test]
    fn test_terminal_no_transitions() {
        let mut session = RunSession::with_id("r-004");
        session.fail("cancelled");
        let err = session
            .transition(RunPhase::TracesRunning, "restart")
            .unwrap_err();
        assert_eq!(err.from, RunPhase::Failed);
    }

    #[test]
    fn test_status_line() {
        let session = at_traces_complete();
        let line = session.status_line();
        assert!(line.contains("[traces_complete]"));
        assert!(line.contains("run=r-001"));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Initialized.to_string(), "initialized");
        assert_eq!(RunPhase::TracesRunning.to_string(), "traces_running");
        assert_eq!(RunPhase::TracesComplete.to_string(), "traces_complete");
        assert_eq!(RunPhase::Arbitrating.to_string(), "arbitrating");
        assert_eq!(RunPhase::Verdicted.to_string(), "verdicted");
        assert_eq!(RunPhase::Failed.to_string(), "failed");
    }
}
