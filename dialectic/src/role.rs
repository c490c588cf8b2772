//! Reasoning roles: the three fixed stances a trace can take.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(believer|logician|contrarian)\b|\btrace\s*#?\s*([123])\b")
        .expect("MENTION_RE regex should compile")
});

/// A fixed reasoning stance. Closed set; configuration lives in
/// [`crate::config::RoleProfile`], not on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Intuition. Runs on the bare problem to surface training-data bias.
    Believer,
    /// Deduction. Decomposes the scenario into atomic, checkable events.
    Logician,
    /// Red team. Assumes the obvious answer is wrong and argues the opposite.
    Contrarian,
}

impl Role {
    /// Every role, in arbitration order.
    pub const ALL: [Role; 3] = [Role::Believer, Role::Logician, Role::Contrarian];

    /// 1-based trace number used in prompts ("Trace 2 (Logician)").
    pub fn ordinal(self) -> usize {
        match self {
            Self::Believer => 1,
            Self::Logician => 2,
            Self::Contrarian => 3,
        }
    }

    /// Capitalized label used inside prompts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Believer => "Believer",
            Self::Logician => "Logician",
            Self::Contrarian => "Contrarian",
        }
    }

    /// Short description of the stance.
    pub fn description(self) -> &'static str {
        match self {
            Self::Believer => "intuition, the world as it first appears",
            Self::Logician => "deduction over atomic, verifiable events",
            Self::Contrarian => "counterfactual attack on the obvious answer",
        }
    }

    fn from_ordinal(n: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.ordinal() == n)
    }

    /// All distinct roles mentioned in `text`, in order of first appearance.
    ///
    /// Recognizes role names (any case) and `Trace N` references.
    pub fn parse_mentions(text: &str) -> Vec<Role> {
        let mut roles = Vec::new();
        for caps in MENTION_RE.captures_iter(text) {
            let role = if let Some(name) = caps.get(1) {
                name.as_str().parse().ok()
            } else {
                caps.get(2)
                    .and_then(|d| d.as_str().parse::<usize>().ok())
                    .and_then(Self::from_ordinal)
            };
            if let Some(role) = role {
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
        }
        roles
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Believer => write!(f, "believer"),
            Self::Logician => write!(f, "logician"),
            Self::Contrarian => write!(f, "contrarian"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "believer" => Ok(Self::Believer),
            "logician" => Ok(Self::Logician),
            "contrarian" => Ok(Self::Contrarian),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
