//! Diagnostic types reported by rules

use crate::ast::Range;
use crate::fix::{Edit, FixProblem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a diagnostic is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Target {
    /// A source module, by file path
    Module { path: String },
    /// The project manifest
    Manifest { path: String },
    /// The project readme
    Readme { path: String },
    /// A non-source text file of the project
    ExtraFile { path: String },
    /// The project as a whole
    Global,
    /// The configuration of the rule itself
    Configuration,
}

impl Target {
    /// File path of the target, if it is a file
    pub fn path(&self) -> Option<&str> {
        match self {
            Target::Module { path }
            | Target::Manifest { path }
            | Target::Readme { path }
            | Target::ExtraFile { path } => Some(path),
            Target::Global | Target::Configuration => None,
        }
    }

    /// Whether this target still waits for the engine to fill in its path
    fn is_unassigned(&self) -> bool {
        matches!(self.path(), Some(""))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Module { path }
            | Target::Manifest { path }
            | Target::Readme { path }
            | Target::ExtraFile { path } => write!(f, "{}", path),
            Target::Global => write!(f, "(global)"),
            Target::Configuration => write!(f, "(configuration)"),
        }
    }
}

/// A reported issue, optionally carrying an automatic fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Name of the rule that reported this diagnostic
    pub rule_name: String,
    /// Id of the rule within the reviewed rule list
    pub rule_id: usize,
    /// Short summary
    pub message: String,
    /// Explanation paragraphs
    pub details: Vec<String>,
    pub target: Target,
    pub range: Range,
    /// Edits that resolve the issue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixes: Option<Vec<Edit>>,
    /// Why the fix was dropped, when it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_problem: Option<FixProblem>,
    /// Suppresses data extraction for the rule that reported it
    #[serde(default)]
    pub prevents_extraction: bool,
}

impl Diagnostic {
    /// Create a diagnostic for the module currently being visited
    ///
    /// Every constructor expects at least one paragraph in `details`; an
    /// empty list trips a debug assertion.
    pub fn new<D, S>(message: &str, details: D, range: Range) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_target(
            Target::Module {
                path: String::new(),
            },
            message,
            details,
            range,
        )
    }

    /// Create a diagnostic for a specific module, typically from a final evaluation
    pub fn for_module<D, S>(path: &str, message: &str, details: D, range: Range) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_target(
            Target::Module {
                path: path.to_string(),
            },
            message,
            details,
            range,
        )
    }

    /// Create a diagnostic for the project manifest
    pub fn for_manifest<D, S>(message: &str, details: D, range: Range) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_target(
            Target::Manifest {
                path: String::new(),
            },
            message,
            details,
            range,
        )
    }

    /// Create a diagnostic for the project readme
    pub fn for_readme<D, S>(message: &str, details: D, range: Range) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_target(
            Target::Readme {
                path: String::new(),
            },
            message,
            details,
            range,
        )
    }

    /// Create a diagnostic for an extra (non-source) file
    pub fn for_extra_file<D, S>(path: &str, message: &str, details: D, range: Range) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_target(
            Target::ExtraFile {
                path: path.to_string(),
            },
            message,
            details,
            range,
        )
    }

    /// Create a diagnostic about the project as a whole
    pub fn global<D, S>(message: &str, details: D) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_target(Target::Global, message, details, Range::empty())
    }

    /// Create a diagnostic about a misconfigured rule
    pub fn configuration<D, S>(rule_name: &str, message: &str, details: D) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut diagnostic =
            Self::with_target(Target::Configuration, message, details, Range::empty());
        diagnostic.rule_name = rule_name.to_string();
        diagnostic
    }

    fn with_target<D, S>(target: Target, message: &str, details: D, range: Range) -> Self
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let details: Vec<String> = details.into_iter().map(Into::into).collect();
        debug_assert!(
            !details.is_empty(),
            "diagnostic `{}` needs at least one detail paragraph",
            message
        );
        Self {
            rule_name: String::new(),
            rule_id: 0,
            message: message.to_string(),
            details,
            target,
            range,
            fixes: None,
            fix_problem: None,
            prevents_extraction: false,
        }
    }

    /// Attach edits that fix this diagnostic
    pub fn with_fixes(mut self, edits: Vec<Edit>) -> Self {
        self.fixes = Some(edits);
        self.fix_problem = None;
        self
    }

    /// Prevent the rule's data extraction while this diagnostic is reported
    pub fn preventing_extraction(mut self) -> Self {
        self.prevents_extraction = true;
        self
    }

    /// Check if this diagnostic carries a usable fix
    pub fn has_fix(&self) -> bool {
        self.fixes.as_ref().is_some_and(|edits| !edits.is_empty())
    }

    /// Fill in rule identity and any unassigned target
    ///
    /// Diagnostics created with [`Diagnostic::new`] point at whatever the
    /// engine was visiting (`current`); manifest and readme diagnostics get
    /// the project's actual file paths.
    pub(crate) fn backfill(
        &mut self,
        rule_name: &str,
        rule_id: usize,
        current: &Target,
        manifest_path: &str,
        readme_path: &str,
    ) {
        if self.rule_name.is_empty() {
            self.rule_name = rule_name.to_string();
        }
        self.rule_id = rule_id;
        if !self.target.is_unassigned() {
            return;
        }
        self.target = match &self.target {
            Target::Manifest { .. } => Target::Manifest {
                path: manifest_path.to_string(),
            },
            Target::Readme { .. } => Target::Readme {
                path: readme_path.to_string(),
            },
            _ => current.clone(),
        };
    }

    /// Drop the fix, remembering why
    pub(crate) fn strip_fix(&mut self, problem: FixProblem) {
        self.fixes = None;
        self.fix_problem = Some(problem);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}:{}: {}",
            self.rule_name, self.target, self.range.start, self.message
        )
    }
}
