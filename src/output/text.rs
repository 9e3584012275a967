//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Diagnostic, Target};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show the explanation paragraphs
    pub show_details: bool,

    /// Show the problem count
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_details: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    /// Only print one line per diagnostic
    pub fn without_details(mut self) -> Self {
        self.show_details = false;
        self
    }

    fn paint(&self, text: &str, style: fn(&str) -> ColoredString) -> String {
        if self.colored {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, diagnostics: &[Diagnostic]) -> String {
        let mut output = String::new();

        // Group diagnostics by target, keeping report order
        let mut by_target: Vec<(&Target, Vec<&Diagnostic>)> = Vec::new();
        for diagnostic in diagnostics {
            match by_target
                .iter_mut()
                .find(|(target, _)| *target == &diagnostic.target)
            {
                Some((_, group)) => group.push(diagnostic),
                None => by_target.push((&diagnostic.target, vec![diagnostic])),
            }
        }

        for (target, group) in &by_target {
            output.push_str(&self.paint(&target.to_string(), |s| s.underline()));
            output.push('\n');
            for diagnostic in group {
                output.push_str(&self.format_diagnostic(diagnostic));
            }
            output.push('\n');
        }

        if self.show_stats {
            let summary = match diagnostics.len() {
                0 => "No problems found".to_string(),
                1 => "1 problem found".to_string(),
                count => format!("{} problems found", count),
            };
            let fixable = diagnostics.iter().filter(|d| d.has_fix()).count();
            output.push_str(&summary);
            if fixable > 0 {
                output.push_str(&format!(" ({} fixable)", fixable));
            }
            output.push('\n');
        }

        output
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        let mut output = format!(
            "  {}  {} {}",
            self.paint(&diagnostic.range.start.to_string(), |s| s.dimmed()),
            self.paint(&format!("[{}]", diagnostic.rule_name), |s| s.cyan()),
            self.paint(&diagnostic.message, |s| s.bold()),
        );
        if diagnostic.has_fix() {
            output.push_str(&format!(" {}", self.paint("(fix available)", |s| s.green())));
        }
        output.push('\n');

        if self.show_details {
            for detail in &diagnostic.details {
                output.push_str(&format!("      {}\n", detail));
            }
        }
        output
    }
}
