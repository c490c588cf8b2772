//! The immutable problem statement handed to every role.

use serde::{Deserialize, Serialize};

use crate::error::DialecticError;

/// A natural-language puzzle statement. No structure is assumed beyond text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    statement: String,
}

impl Problem {
    /// Wrap a statement, rejecting text that is blank after trimming.
    pub fn new(statement: impl Into<String>) -> Result<Self, DialecticError> {
        let statement = statement.into();
        if statement.trim().is_empty() {
            return Err(DialecticError::InvalidProblem(
                "problem statement is empty".to_string(),
            ));
        }
        Ok(Self { statement })
    }

    /// The statement exactly as supplied.
    pub fn statement(&self) -> &str {
        &self.statement
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.statement)
    }
}
