//! Dialectical Reasoning Library
//!
//! Improves a single language model's answers on logic-trap problems by
//! running three independent, deliberately divergent reasoning traces and
//! arbitrating between them with a necessity check instead of a vote.
//!
//! # Pipeline
//!
//! ```text
//! Problem ─┬─ PromptComposer(Believer)   → TraceRunner ─┐
//!          ├─ PromptComposer(Logician)   → TraceRunner ─┼─ barrier ─→ ArbiterEngine → Verdict
//!          └─ PromptComposer(Contrarian) → TraceRunner ─┘
//! ```
//!
//! - **Believer**: the problem almost verbatim. Surfaces the model's prior.
//! - **Logician**: decompose into atomic events, flag rule-breaking constraints.
//! - **Contrarian**: assume the obvious answer is a trap and argue the opposite.
//!
//! The arbiter accepts an argument only when its conclusion is necessitated
//! by the stated constraints. Agreement between traces is never a criterion.
//!
//! All text generation goes through [`TextGenerationPort`]; this crate holds
//! no model, no HTTP client and installs no tracing subscriber.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use dialectic::{DialecticConfig, DialecticalOrchestrator, Problem, TextGenerationPort};
//!
//! # async fn demo(port: Arc<dyn TextGenerationPort>) -> Result<(), dialectic::DialecticError> {
//! let orchestrator = DialecticalOrchestrator::new(port, DialecticConfig::default())?;
//! let verdict = orchestrator.run(&Problem::new("Three doors, one car...")?).await?;
//! println!("{} ({:?})", verdict.answer(), verdict.endorsed_role());
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod answer;
pub mod arbiter;
pub mod composer;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod port;
pub mod problem;
pub mod role;
pub mod state;
pub mod trace;

pub use answer::extract_boxed;
pub use arbiter::{
    build_arbitration_prompt, parse_verdict, ArbiterEngine, ArbitrationEntry, ArbitrationInput,
    Verdict,
};
pub use composer::PromptComposer;
pub use config::{ArbiterProfile, DialecticConfig, GenerationProfile, RoleProfile, TraceScheduling};
pub use error::{DialecticError, GenerationError};
pub use orchestrator::{DialecticalOrchestrator, RunReport};
pub use port::{RetryPolicy, RetryingPort, TextGenerationPort};
pub use problem::Problem;
pub use role::Role;
pub use state::{PhaseTransition, RunPhase, RunSession, TransitionError};
pub use trace::{Trace, TraceFailure, TraceRunner, TraceStatus};
