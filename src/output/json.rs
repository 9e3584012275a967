//! JSON output formatter

use super::OutputFormatter;
use crate::diagnostic::Diagnostic;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn to_string<T: Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    diagnostics: &'a [Diagnostic],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonSummary {
    problems: usize,
    fixable: usize,
    rules: usize,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, diagnostics: &[Diagnostic]) -> String {
        let mut rules: Vec<(&str, usize)> = diagnostics
            .iter()
            .map(|d| (d.rule_name.as_str(), d.rule_id))
            .collect();
        rules.sort();
        rules.dedup();

        self.to_string(&JsonOutput {
            diagnostics,
            summary: JsonSummary {
                problems: diagnostics.len(),
                fixable: diagnostics.iter().filter(|d| d.has_fix()).count(),
                rules: rules.len(),
            },
        })
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        self.to_string(diagnostic)
    }
}
