//! Prompt composition: one distinct instruction text per role.

use crate::config::{DialecticConfig, PROBLEM_PLACEHOLDER};
use crate::problem::Problem;
use crate::role::Role;

/// Builds role prompts from a problem. Pure: same inputs, same bytes.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    templates: [String; 3],
}

impl PromptComposer {
    pub fn from_config(config: &DialecticConfig) -> Self {
        Self {
            templates: Role::ALL.map(|role| config.profile(role).template.clone()),
        }
    }

    /// Prompt for `role` on `problem`.
    pub fn compose(&self, problem: &Problem, role: Role) -> String {
        self.templates[role.ordinal() - 1].replace(PROBLEM_PLACEHOLDER, problem.statement())
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::from_config(&DialecticConfig::default())
    }
}
