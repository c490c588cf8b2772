//! Arbitration: the Logic-of-Necessity decision rule.
//!
//! The arbiter sees every available argument verbatim, labelled by role,
//! and must pick the one whose conclusion is *necessitated* by the stated
//! constraints, not the most frequent or the most plausible one. Vote
//! count is explicitly excluded as a criterion.

pub mod parse;
pub mod prompt;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ArbiterProfile;
use crate::error::DialecticError;
use crate::port::TextGenerationPort;
use crate::problem::Problem;
use crate::role::Role;
use crate::trace::Trace;

pub use parse::parse_verdict;
pub use prompt::build_arbitration_prompt;

/// What the arbiter knows about one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "text")]
pub enum ArbitrationEntry {
    /// The role's raw output.
    Argument(String),
    /// The role produced no output. Never to be filled in.
    Absent,
}

/// Read-only view of a finished trace set, always in role order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationInput {
    problem: Problem,
    entries: [(Role, ArbitrationEntry); 3],
}

impl ArbitrationInput {
    /// Build from exactly one terminal trace per role.
    pub fn from_traces(problem: &Problem, traces: &[Trace]) -> Result<Self, DialecticError> {
        if traces.len() != Role::ALL.len() {
            return Err(DialecticError::Configuration(format!(
                "arbitration needs one trace per role, got {}",
                traces.len()
            )));
        }

        let mut entries = Role::ALL.map(|role| (role, ArbitrationEntry::Absent));
        for (slot, role) in entries.iter_mut().zip(Role::ALL) {
            let mut matching = traces.iter().filter(|t| t.role == role);
            let trace = match (matching.next(), matching.next()) {
                (Some(trace), None) => trace,
                (None, _) => {
                    return Err(DialecticError::Configuration(format!(
                        "no trace for role {role}"
                    )))
                }
                (Some(_), Some(_)) => {
                    return Err(DialecticError::Configuration(format!(
                        "duplicate trace for role {role}"
                    )))
                }
            };
            if !trace.is_terminal() {
                return Err(DialecticError::Configuration(format!(
                    "trace for role {role} is still pending"
                )));
            }
            if let (true, Some(output)) = (trace.is_completed(), &trace.output) {
                slot.1 = ArbitrationEntry::Argument(output.clone());
            }
        }

        Ok(Self {
            problem: problem.clone(),
            entries,
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// `(role, entry)` pairs in Believer, Logician, Contrarian order.
    pub fn entries(&self) -> &[(Role, ArbitrationEntry)] {
        &self.entries
    }

    /// Roles with an argument available.
    pub fn available_roles(&self) -> Vec<Role> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, ArbitrationEntry::Argument(_)))
            .map(|(r, _)| *r)
            .collect()
    }

    /// Roles that produced no output.
    pub fn absent_roles(&self) -> Vec<Role> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, ArbitrationEntry::Absent))
            .map(|(r, _)| *r)
            .collect()
    }

    pub fn is_available(&self, role: Role) -> bool {
        self.available_roles().contains(&role)
    }
}

/// The terminal artifact of a run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    endorsed_role: Option<Role>,
    answer: String,
    justification: String,
}

impl Verdict {
    pub(crate) fn new(endorsed_role: Option<Role>, answer: String, justification: String) -> Self {
        Self {
            endorsed_role,
            answer,
            justification,
        }
    }

    /// Role whose conclusion survived the necessity test, or `None` when the
    /// arbiter found that no argument did.
    pub fn endorsed_role(&self) -> Option<Role> {
        self.endorsed_role
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn justification(&self) -> &str {
        &self.justification
    }

    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        let endorsed = self
            .endorsed_role
            .map(|r| r.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!("[{}] {}", endorsed, self.answer)
    }
}

/// Runs the single arbitration generation and parses its verdict.
#[derive(Clone)]
pub struct ArbiterEngine {
    port: Arc<dyn TextGenerationPort>,
    profile: ArbiterProfile,
}

impl ArbiterEngine {
    pub fn new(port: Arc<dyn TextGenerationPort>, profile: ArbiterProfile) -> Self {
        Self { port, profile }
    }

    /// One generation call, then a strict parse. Never guesses a role.
    pub async fn arbitrate(&self, input: &ArbitrationInput) -> Result<Verdict, DialecticError> {
        let prompt = build_arbitration_prompt(input);
        info!(
            available = ?input.available_roles(),
            absent = ?input.absent_roles(),
            prompt_chars = prompt.len(),
            "arbitration started"
        );

        let raw = self
            .port
            .generate(&prompt, &self.profile.generation)
            .await
            .map_err(|e| {
                warn!(error = %e, "arbitration generation failed");
                DialecticError::ArbitrationGeneration(e)
            })?;
        debug!(output_chars = raw.len(), "arbitration output received");

        let verdict = parse_verdict(&raw, input)?;
        info!(verdict = %verdict.summary_line(), "verdict reached");
        Ok(verdict)
    }
}
