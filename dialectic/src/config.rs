//! Role profiles, prompt templates and generation parameters.
//!
//! Everything that tunes role behaviour lives here so the orchestration
//! logic never changes when a template or temperature does.
//!
//! ## Defaults
//!
//! | Role       | Temperature | Template                                        |
//! |------------|-------------|-------------------------------------------------|
//! | Believer   | 0.6         | problem verbatim + "answer directly"            |
//! | Logician   | 0.7         | causal check: atomic events, rule-breakers      |
//! | Contrarian | 0.9         | red team: obvious answer is a trap              |
//! | Arbiter    | 0.1         | (fixed structure, see `arbiter::prompt`)         |

use serde::{Deserialize, Serialize};

use crate::error::DialecticError;
use crate::role::Role;

/// Placeholder every role template must contain.
pub const PROBLEM_PLACEHOLDER: &str = "{problem}";

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_MAX_PARALLEL_TRACES: usize = 3;
const MAX_TEMPERATURE: f64 = 2.0;

/// System anchor sent with every trace generation.
pub const DEFAULT_SYSTEM_ANCHOR: &str = "[PROTOCOL]\n\
1. Do not answer from memory of similar-looking problems.\n\
2. Derive every conclusion from the specific constraints stated, by logical necessity.";

const BELIEVER_TEMPLATE: &str = "{problem}\n\n\
Answer directly. Put the final value inside \\boxed{}.";

const LOGICIAN_TEMPLATE: &str = "{problem}\n\n\
[PROTOCOL: CAUSAL CHECK]\n\
1. Deconstruct the scenario into an ordered sequence of atomic events, each independently verifiable.\n\
2. For every event, state its classification (intentional or accidental, reversible or irreversible) \
and flag any classification that invalidates the default rule for problems of this kind.\n\
3. Derive the answer strictly from the stated constraints.\n\
CRITICAL: The very last line of your response must be ONLY the final value inside \\boxed{}. \
Do not write text after the box.";

const CONTRARIAN_TEMPLATE: &str = "{problem}\n\n\
[PROTOCOL: RED TEAM]\n\
Assume the intuitive answer (the one most people would give) is a TRAP.\n\
Construct the strongest possible argument for the OPPOSITE conclusion, \
using only constraints stated in the problem.\n\
Name the specific variable that invalidates the common intuition.\n\
CRITICAL: The very last line of your response must be ONLY the final value inside \\boxed{}. \
Do not write text after the box.";

/// Parameters passed to the port with every prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationProfile {
    /// Sampling temperature. `0.0` requests deterministic decoding.
    pub temperature: f64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// System message sent ahead of the prompt, if any.
    pub system_preamble: Option<String>,
}

impl GenerationProfile {
    pub fn new(temperature: f64) -> Self {
        Self {
            temperature,
            ..Default::default()
        }
    }

    /// Greedy decoding profile.
    pub fn deterministic() -> Self {
        Self::new(0.0)
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.system_preamble = Some(preamble.into());
        self
    }

    /// Whether the profile asks for greedy decoding.
    pub fn is_deterministic(&self) -> bool {
        self.temperature == 0.0
    }

    fn validate(&self, owner: &str) -> Result<(), String> {
        if !self.temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(format!(
                "{owner}: temperature must be in [0, {MAX_TEMPERATURE}], got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            return Err(format!("{owner}: max_tokens must be > 0"));
        }
        Ok(())
    }
}

impl Default for GenerationProfile {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_preamble: None,
        }
    }
}

/// How a role turns a problem into a prompt, and how it is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleProfile {
    /// Prompt template containing [`PROBLEM_PLACEHOLDER`].
    pub template: String,
    #[serde(default)]
    pub generation: GenerationProfile,
}

impl RoleProfile {
    pub fn new(template: impl Into<String>, generation: GenerationProfile) -> Self {
        Self {
            template: template.into(),
            generation,
        }
    }

    /// Built-in profile for `role`.
    pub fn default_for(role: Role) -> Self {
        let (template, temperature) = match role {
            Role::Believer => (BELIEVER_TEMPLATE, 0.6),
            Role::Logician => (LOGICIAN_TEMPLATE, 0.7),
            Role::Contrarian => (CONTRARIAN_TEMPLATE, 0.9),
        };
        Self::new(
            template,
            GenerationProfile::new(temperature).with_preamble(DEFAULT_SYSTEM_ANCHOR),
        )
    }

    fn validate(&self, role: Role) -> Result<(), String> {
        if self.template.trim().is_empty() {
            return Err(format!("{role}: template is empty"));
        }
        if !self.template.contains(PROBLEM_PLACEHOLDER) {
            return Err(format!(
                "{role}: template must contain the {PROBLEM_PLACEHOLDER} placeholder"
            ));
        }
        self.generation.validate(&role.to_string())
    }
}

/// Sampling parameters for the arbitration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterProfile {
    pub generation: GenerationProfile,
}

impl Default for ArbiterProfile {
    fn default() -> Self {
        Self {
            generation: GenerationProfile::new(0.1),
        }
    }
}

/// How the three trace generations are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceScheduling {
    /// Spawn all traces at once, bounded by `max_parallel_traces`.
    #[default]
    Concurrent,
    /// Run traces one after another in role order.
    Sequential,
}

/// Top-level configuration consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialecticConfig {
    pub believer: RoleProfile,
    pub logician: RoleProfile,
    pub contrarian: RoleProfile,
    pub arbiter: ArbiterProfile,
    pub scheduling: TraceScheduling,
    /// Upper bound on simultaneously outstanding trace requests.
    pub max_parallel_traces: usize,
    /// Per-trace deadline enforced by the runner on top of the port's own.
    pub trace_timeout_secs: Option<u64>,
}

impl Default for DialecticConfig {
    fn default() -> Self {
        Self {
            believer: RoleProfile::default_for(Role::Believer),
            logician: RoleProfile::default_for(Role::Logician),
            contrarian: RoleProfile::default_for(Role::Contrarian),
            arbiter: ArbiterProfile::default(),
            scheduling: TraceScheduling::default(),
            max_parallel_traces: DEFAULT_MAX_PARALLEL_TRACES,
            trace_timeout_secs: None,
        }
    }
}

impl DialecticConfig {
    /// Profile for `role`.
    pub fn profile(&self, role: Role) -> &RoleProfile {
        match role {
            Role::Believer => &self.believer,
            Role::Logician => &self.logician,
            Role::Contrarian => &self.contrarian,
        }
    }

    pub fn profile_mut(&mut self, role: Role) -> &mut RoleProfile {
        match role {
            Role::Believer => &mut self.believer,
            Role::Logician => &mut self.logician,
            Role::Contrarian => &mut self.contrarian,
        }
    }

    /// Same templates, every generation forced to temperature 0.
    pub fn deterministic(mut self) -> Self {
        for role in Role::ALL {
            self.profile_mut(role).generation.temperature = 0.0;
        }
        self.arbiter.generation.temperature = 0.0;
        self
    }

    /// Validate all profiles. Runs before any generation request.
    pub fn validate(&self) -> Result<(), DialecticError> {
        for role in Role::ALL {
            self.profile(role)
                .validate(role)
                .map_err(DialecticError::Configuration)?;
        }
        self.arbiter
            .generation
            .validate("arbiter")
            .map_err(DialecticError::Configuration)?;
        if self.max_parallel_traces == 0 {
            return Err(DialecticError::Configuration(
                "max_parallel_traces must be > 0".to_string(),
            ));
        }
        if self.trace_timeout_secs == Some(0) {
            return Err(DialecticError::Configuration(
                "trace_timeout_secs must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        DialecticConfig::default()
            .validate()
            .expect("default config should be valid");
    }

    #[test]
    fn default_temperatures_per_role() {
        let cfg = DialecticConfig::default();
        assert_eq!(cfg.believer.generation.temperature, 0.6);
        assert_eq!(cfg.logician.generation.temperature, 0.7);
        assert_eq!(cfg.contrarian.generation.temperature, 0.9);
        assert_eq!(cfg.arbiter.generation.temperature, 0.1);
        assert_eq!(cfg.logician.generation.max_tokens, 4096);
    }

    #[test]
    fn template_without_placeholder_rejected() {
        let mut cfg = DialecticConfig::default();
        cfg.contrarian.template = "Argue the opposite.".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, DialecticError::Configuration(ref m) if m.contains("contrarian")));
    }

    #[test]
    fn blank_template_rejected() {
        let mut cfg = DialecticConfig::default();
        cfg.believer.template = "  ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_rejected() {
        let mut cfg = DialecticConfig::default();
        cfg.logician.generation.temperature = 3.5;
        assert!(cfg.validate().is_err());

        let mut cfg = DialecticConfig::default();
        cfg.arbiter.generation.temperature = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_limits_rejected() {
        let mut cfg = DialecticConfig::default();
        cfg.max_parallel_traces = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DialecticConfig::default();
        cfg.trace_timeout_secs = Some(0);
        assert!(cfg.validate().is_err());

        let mut cfg = DialecticConfig::default();
        cfg.believer.generation.max_tokens = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deterministic_zeroes_every_temperature() {
        let cfg = DialecticConfig::default().deterministic();
        for role in Role::ALL {
            assert!(cfg.profile(role).generation.is_deterministic());
        }
        assert!(cfg.arbiter.generation.is_deterministic());
        assert_eq!(cfg.believer.template, DialecticConfig::default().believer.template);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: DialecticConfig =
            serde_json::from_str(r#"{"scheduling": "sequential", "max_parallel_traces": 1}"#)
                .unwrap();
        assert_eq!(cfg.scheduling, TraceScheduling::Sequential);
        assert_eq!(cfg.max_parallel_traces, 1);
        assert_eq!(cfg.logician, RoleProfile::default_for(Role::Logician));
    }
}
