//! Dialectical orchestrator: drives one problem through the full pipeline.
//!
//! ```text
//! Phase 1: Composition
//!   PromptComposer × 3 (Believer, Logician, Contrarian)
//!
//! Phase 2: Independent traces (fan-out)
//!   JoinSet::spawn(TraceRunner) × 3, Semaphore-bounded
//!   or sequentially in role order
//!
//! Barrier: all three traces terminal
//!
//! Phase 3: Arbitration (fan-in)
//!   ArbiterEngine(ArbitrationInput) → Verdict
//! ```
//!
//! ## Partial failure policy
//!
//! One failed trace: arbitrate over the two survivors, the third marked
//! absent. Two or more failed: `InsufficientTraces`, no arbitration call.
//!
//! ## Cancellation
//!
//! The run's `CancellationToken` is raced against every await point. On
//! cancellation outstanding trace tasks are aborted and no arbitration
//! request is issued.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arbiter::{ArbiterEngine, ArbitrationInput, Verdict};
use crate::composer::PromptComposer;
use crate::config::{DialecticConfig, TraceScheduling};
use crate::error::DialecticError;
use crate::port::TextGenerationPort;
use crate::problem::Problem;
use crate::role::Role;
use crate::state::{RunPhase, RunSession, MIN_COMPLETED_TRACES};
use crate::trace::{Trace, TraceFailure, TraceRunner};

/// Everything a finished run produced, success or not.
#[derive(Debug)]
pub struct RunReport {
    /// Phase history of the run.
    pub session: RunSession,
    /// Terminal traces in role order. Empty if the run never dispatched.
    pub traces: Vec<Trace>,
    /// The verdict, or the terminal failure.
    pub outcome: Result<Verdict, DialecticError>,
}

impl RunReport {
    pub fn verdict(&self) -> Option<&Verdict> {
        self.outcome.as_ref().ok()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_result(self) -> Result<Verdict, DialecticError> {
        self.outcome
    }

    /// Compact summary line.
    pub fn summary_line(&self) -> String {
        let completed = self.traces.iter().filter(|t| t.is_completed()).count();
        match &self.outcome {
            Ok(v) => format!(
                "[VERDICTED] {} | {}/{} traces | run={}",
                v.summary_line(),
                completed,
                self.traces.len(),
                self.session.id
            ),
            Err(e) => format!(
                "[FAILED:{}] {} | run={}",
                e.stage(),
                e,
                self.session.id
            ),
        }
    }

    /// Pretty JSON for diagnostics: phases, traces, verdict or error.
    pub fn to_json(&self) -> Result<String, DialecticError> {
        let outcome = match &self.outcome {
            Ok(verdict) => json!({ "verdict": verdict }),
            Err(e) => json!({
                "error": {
                    "stage": e.stage(),
                    "message": e.to_string(),
                    "raw_output": e.raw_output(),
                }
            }),
        };
        let value = json!({
            "run_id": self.session.id,
            "phase": self.session.phase,
            "created_at": self.session.created_at,
            "transitions": self.session.transitions,
            "traces": self.traces,
            "outcome": outcome,
        });
        serde_json::to_string_pretty(&value)
            .map_err(|e| DialecticError::Serialization(e.to_string()))
    }
}

/// Owns the pipeline for one problem at a time. Holds no cross-run state.
pub struct DialecticalOrchestrator {
    config: DialecticConfig,
    composer: PromptComposer,
    runner: TraceRunner,
    arbiter: ArbiterEngine,
}

impl DialecticalOrchestrator {
    /// Validate `config` and wire the pipeline to `port`.
    pub fn new(
        port: Arc<dyn TextGenerationPort>,
        config: DialecticConfig,
    ) -> Result<Self, DialecticError> {
        config.validate()?;
        let timeout = config.trace_timeout_secs.map(Duration::from_secs);
        Ok(Self {
            composer: PromptComposer::from_config(&config),
            runner: TraceRunner::new(port.clone(), timeout),
            arbiter: ArbiterEngine::new(port, config.arbiter.clone()),
            config,
        })
    }

    pub fn config(&self) -> &DialecticConfig {
        &self.config
    }

    /// Run to a verdict or a terminal failure.
    pub async fn run(&self, problem: &Problem) -> Result<Verdict, DialecticError> {
        self.run_with_cancel(problem, CancellationToken::new())
            .await
            .into_result()
    }

    /// Run with an external cancellation token and keep the full report.
    pub async fn run_with_cancel(&self, problem: &Problem, cancel: CancellationToken) -> RunReport {
        let mut session = RunSession::new();
        let mut traces = Vec::new();

        let outcome = self
            .drive(problem, &cancel, &mut session, &mut traces)
            .await;

        if let Err(e) = &outcome {
            session.fail(&e.to_string());
            warn!(stage = e.stage(), error = %e, "{}", session.status_line());
        } else {
            info!("{}", session.status_line());
        }

        RunReport {
            session,
            traces,
            outcome,
        }
    }

    async fn drive(
        &self,
        problem: &Problem,
        cancel: &CancellationToken,
        session: &mut RunSession,
        traces: &mut Vec<Trace>,
    ) -> Result<Verdict, DialecticError> {
        let prompts: Vec<(Role, String)> = Role::ALL
            .iter()
            .map(|role| (*role, self.composer.compose(problem, *role)))
            .collect();

        ensure_not_cancelled(cancel, session.phase)?;
        session.transition(RunPhase::TracesRunning, "dispatching traces")?;
        info!(
            run_id = %session.id,
            scheduling = ?self.config.scheduling,
            max_parallel = self.config.max_parallel_traces,
            "traces dispatched"
        );

        let collected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DialecticError::Cancelled {
                    stage: RunPhase::TracesRunning.to_string(),
                });
            }
            collected = self.dispatch(prompts) => collected,
        };
        *traces = collected;

        let completed = traces.iter().filter(|t| t.is_completed()).count();
        session.transition(
            RunPhase::TracesComplete,
            &format!("{completed} of {} traces completed", traces.len()),
        )?;
        for trace in traces.iter() {
            info!(
                role = %trace.role,
                status = %trace.status,
                answer = trace.boxed_answer().as_deref().unwrap_or("-"),
                elapsed_ms = trace.elapsed_ms,
                "trace finished"
            );
        }

        if completed < MIN_COMPLETED_TRACES {
            return Err(DialecticError::InsufficientTraces {
                completed,
                failed_roles: traces
                    .iter()
                    .filter(|t| !t.is_completed())
                    .map(|t| t.role)
                    .collect(),
            });
        }

        let input = ArbitrationInput::from_traces(problem, traces)?;
        ensure_not_cancelled(cancel, session.phase)?;
        session.begin_arbitration(completed)?;

        let verdict = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DialecticError::Cancelled {
                    stage: RunPhase::Arbitrating.to_string(),
                });
            }
            verdict = self.arbiter.arbitrate(&input) => verdict?,
        };

        session.transition(
            RunPhase::Verdicted,
            &format!("endorsed {:?}", verdict.endorsed_role()),
        )?;
        Ok(verdict)
    }

    async fn dispatch(&self, prompts: Vec<(Role, String)>) -> Vec<Trace> {
        let mut traces = match self.config.scheduling {
            TraceScheduling::Concurrent => self.run_concurrent(prompts).await,
            TraceScheduling::Sequential => self.run_sequential(prompts).await,
        };
        traces.sort_by_key(|t| t.role);
        traces
    }

    async fn run_sequential(&self, prompts: Vec<(Role, String)>) -> Vec<Trace> {
        let mut traces = Vec::with_capacity(prompts.len());
        for (role, prompt) in prompts {
            let profile = &self.config.profile(role).generation;
            traces.push(self.runner.run(role, prompt, profile).await);
        }
        traces
    }

    async fn run_concurrent(&self, prompts: Vec<(Role, String)>) -> Vec<Trace> {
        let sem = Arc::new(Semaphore::new(self.config.max_parallel_traces));
        let mut join_set: JoinSet<Trace> = JoinSet::new();
        let mut pending_prompts = Vec::with_capacity(prompts.len());

        for (role, prompt) in prompts {
            let sem = sem.clone();
            let runner = self.runner.clone();
            let profile = self.config.profile(role).generation.clone();
            pending_prompts.push((role, prompt.clone()));

            join_set.spawn(async move {
                // The semaphore is never closed, so a permit always arrives.
                let _permit = sem.acquire_owned().await.ok();
                runner.run(role, prompt, &profile).await
            });
        }

        let mut traces = Vec::with_capacity(pending_prompts.len());
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(trace) => {
                    debug!(role = %trace.role, status = %trace.status, "trace joined");
                    traces.push(trace);
                }
                Err(e) => warn!(error = %e, "trace task panicked"),
            }
        }

        // A panicked task still owes a terminal trace for its role.
        for (role, prompt) in pending_prompts {
            if !traces.iter().any(|t| t.role == role) {
                traces.push(Trace::pending(role, prompt).fail(
                    TraceFailure::Generation("trace task panicked".to_string()),
                    0,
                ));
            }
        }
        traces
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken, phase: RunPhase) -> Result<(), DialecticError> {
    if cancel.is_cancelled() {
        return Err(DialecticError::Cancelled {
            stage: phase.to_string(),
        });
    }
    Ok(())
}
