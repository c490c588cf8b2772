//! Error taxonomy for the dialectical pipeline.
//!
//! | Error                    | Stage        | Terminal for the run |
//! |--------------------------|--------------|----------------------|
//! | `GenerationError`        | trace        | no (trace → Failed)  |
//! | `InsufficientTraces`     | barrier      | yes                  |
//! | `ArbitrationGeneration`  | arbitration  | yes                  |
//! | `ArbitrationParse`       | arbitration  | yes                  |
//! | `Configuration`          | setup        | yes, before any call |
//! | `Cancelled`              | any          | yes                  |

use std::time::Duration;

use thiserror::Error;

use crate::role::Role;
use crate::state::TransitionError;

/// Failure reported by a [`crate::TextGenerationPort`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Model, hardware or transport failure.
    #[error("generation backend failure: {0}")]
    Backend(String),

    /// The port gave up waiting for the model.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend asked the caller to slow down.
    #[error("generation rate limited: {0}")]
    RateLimited(String),

    /// The request was abandoned by the caller.
    #[error("generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Whether an external retry policy may re-issue the request.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Timeout(_) | Self::RateLimited(_))
    }
}

/// Run-level error. Every variant is terminal: no partial verdict is returned.
#[derive(Debug, Error)]
pub enum DialecticError {
    /// The problem statement cannot be reasoned about (e.g. blank).
    #[error("invalid problem: {0}")]
    InvalidProblem(String),

    /// Malformed or missing role template / generation profile.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Fewer than two traces completed, so no dialectic is possible.
    #[error(
        "insufficient traces: {completed} of 3 completed (failed: {})",
        format_roles(.failed_roles)
    )]
    InsufficientTraces {
        completed: usize,
        failed_roles: Vec<Role>,
    },

    /// The arbitration generation itself failed.
    #[error("arbitration generation failed: {0}")]
    ArbitrationGeneration(#[source] GenerationError),

    /// The arbiter's output could not be resolved into a verdict.
    #[error("arbitration output could not be parsed: {reason}")]
    ArbitrationParse { reason: String, raw_output: String },

    /// The run was cancelled by the caller.
    #[error("run cancelled during {stage}")]
    Cancelled { stage: String },

    /// The run state machine rejected a transition.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Report serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl DialecticError {
    /// Pipeline stage the error belongs to, for diagnostics.
    pub fn stage(&self) -> &str {
        match self {
            Self::InvalidProblem(_) | Self::Configuration(_) => "setup",
            Self::InsufficientTraces { .. } => "traces",
            Self::ArbitrationGeneration(_) | Self::ArbitrationParse { .. } => "arbitration",
            Self::Cancelled { stage } => stage,
            Self::InvalidTransition(_) => "state",
            Self::Serialization(_) => "report",
        }
    }

    /// Raw arbiter output, when the failure carries it.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::ArbitrationParse { raw_output, .. } => Some(raw_output),
            _ => None,
        }
    }

    pub(crate) fn parse(reason: impl Into<String>, raw_output: &str) -> Self {
        Self::ArbitrationParse {
            reason: reason.into(),
            raw_output: raw_output.to_string(),
        }
    }
}

fn format_roles(roles: &[Role]) -> String {
    if roles.is_empty() {
        return "none".to_string();
    }
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
