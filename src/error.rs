//! Reasons a review stops early
//!
//! Aborts are returned as values next to the diagnostics collected so far,
//! never as a bare `Err`, so a host can still show what was found.

use crate::project::ParseError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// A diagnostic that was already fixed got reported again
    #[error("rule {rule} keeps reporting a problem it already fixed: {message}")]
    FixLoop { rule: String, message: String },

    /// Applying a fix produced a file that does not parse anymore
    #[error("fix of rule {rule} made {path} unparsable: {error}")]
    InvalidFix {
        rule: String,
        path: String,
        error: ParseError,
    },

    /// Applying a fix introduced an import cycle
    #[error("a fix introduced an import cycle: {}", .modules.join(" -> "))]
    ImportCycle { modules: Vec<String> },
}

impl ReviewError {
    /// Name of the rule whose fix caused the abort, if any
    pub fn rule(&self) -> Option<&str> {
        match self {
            ReviewError::FixLoop { rule, .. } | ReviewError::InvalidFix { rule, .. } => Some(rule),
            ReviewError::ImportCycle { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let error = ReviewError::FixLoop {
            rule: "NoUnused.Exports".to_string(),
            message: "Exposed function `y` is never used".to_string(),
        };
        assert!(error.to_string().contains("NoUnused.Exports"));
        assert_eq!(error.rule(), Some("NoUnused.Exports"));

        let error = ReviewError::InvalidFix {
            rule: "Simplify".to_string(),
            path: "src/A.elm".to_string(),
            error: ParseError::Syntax {
                line: 3,
                message: "unexpected `)`".to_string(),
            },
        };
        assert_eq!(
            error.to_string(),
            "fix of rule Simplify made src/A.elm unparsable: syntax error at line 3: unexpected `)`"
        );

        let error = ReviewError::ImportCycle {
            modules: vec!["A".to_string(), "B".to_string(), "A".to_string()],
        };
        assert_eq!(error.to_string(), "a fix introduced an import cycle: A -> B -> A");
        assert_eq!(error.rule(), None);
    }
}
