//! Output formatters for review results

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::diagnostic::Diagnostic;

/// Output formatter trait
pub trait OutputFormatter {
    /// Format all diagnostics of a review
    fn format(&self, diagnostics: &[Diagnostic]) -> String;

    /// Format a single diagnostic
    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String;
}
