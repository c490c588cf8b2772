//! Traces and the runner that produces them.
//!
//! A trace is one independent reasoning attempt under a fixed role. The
//! runner that creates it is its only writer; it never sees another trace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::answer::extract_boxed;
use crate::config::GenerationProfile;
use crate::port::TextGenerationPort;
use crate::role::Role;

/// Lifecycle of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why a trace failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum TraceFailure {
    /// The port reported an error.
    Generation(String),
    /// The port returned text that is empty after trimming.
    Degenerate,
    /// The runner's own deadline expired.
    TimedOut(Duration),
}

impl std::fmt::Display for TraceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generation(msg) => write!(f, "generation error: {msg}"),
            Self::Degenerate => write!(f, "empty output"),
            Self::TimedOut(d) => write!(f, "timed out after {d:?}"),
        }
    }
}

/// One reasoning attempt: role, exact prompt, raw output and status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub role: Role,
    /// The exact text sent to the port.
    pub prompt: String,
    /// Raw text received. `None` unless completed.
    pub output: Option<String>,
    pub status: TraceStatus,
    pub failure: Option<TraceFailure>,
    pub elapsed_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl Trace {
    /// A trace that has not been run yet.
    pub fn pending(role: Role, prompt: impl Into<String>) -> Self {
        Self {
            role,
            prompt: prompt.into(),
            output: None,
            status: TraceStatus::Pending,
            failure: None,
            elapsed_ms: 0,
            started_at: Utc::now(),
        }
    }

    /// Mark completed with the raw output.
    pub fn complete(mut self, output: String, elapsed_ms: u64) -> Self {
        self.output = Some(output);
        self.status = TraceStatus::Completed;
        self.failure = None;
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Mark failed. Any output is discarded.
    pub fn fail(mut self, failure: TraceFailure, elapsed_ms: u64) -> Self {
        self.output = None;
        self.status = TraceStatus::Failed;
        self.failure = Some(failure);
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TraceStatus::Completed
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TraceStatus::Pending
    }

    /// The `\boxed{}` answer in the output, if any. Diagnostic only.
    pub fn boxed_answer(&self) -> Option<String> {
        self.output.as_deref().and_then(extract_boxed)
    }
}

/// Drives the port for a single trace. Never retries.
#[derive(Clone)]
pub struct TraceRunner {
    port: Arc<dyn TextGenerationPort>,
    timeout: Option<Duration>,
}

impl TraceRunner {
    pub fn new(port: Arc<dyn TextGenerationPort>, timeout: Option<Duration>) -> Self {
        Self { port, timeout }
    }

    /// Run one generation and return the trace in a terminal status.
    pub async fn run(&self, role: Role, prompt: String, profile: &GenerationProfile) -> Trace {
        let trace = Trace::pending(role, prompt);
        let start = Instant::now();
        debug!(%role, prompt_chars = trace.prompt.len(), temperature = profile.temperature, "trace started");

        let generation = self.port.generate(&trace.prompt, profile);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, generation).await {
                Ok(result) => result.map_err(|e| TraceFailure::Generation(e.to_string())),
                Err(_) => Err(TraceFailure::TimedOut(limit)),
            },
            None => generation
                .await
                .map_err(|e| TraceFailure::Generation(e.to_string())),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) if output.trim().is_empty() => {
                warn!(%role, elapsed_ms, "trace returned empty output");
                trace.fail(TraceFailure::Degenerate, elapsed_ms)
            }
            Ok(output) => {
                let trace = trace.complete(output, elapsed_ms);
                debug!(
                    %role,
                    elapsed_ms,
                    answer = trace.boxed_answer().as_deref().unwrap_or("-"),
                    "trace completed"
                );
                trace
            }
            Err(failure) => {
                warn!(%role, elapsed_ms, %failure, "trace failed");
                trace.fail(failure, elapsed_ms)
            }
        }
    }
}
