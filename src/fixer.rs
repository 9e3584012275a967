//! Fix selection and application
//!
//! After each stage the engine offers the stage's diagnostics to
//! [`apply_first_fix`]. At most one fix is applied per call; the engine then
//! resumes the run at the stage the changed file belongs to. The
//! [`FixedErrors`] ledger remembers every applied fix so that a rule that
//! keeps reporting the same problem aborts instead of looping.

use crate::ast::Range;
use crate::diagnostic::{Diagnostic, Target};
use crate::error::ReviewError;
use crate::fix::apply_edits;
use crate::project::Project;
use crate::rule::Exceptions;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// How many fixes a review may apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FixMode {
    /// Never apply fixes (default)
    #[default]
    Disabled,
    /// Apply a single fix, then stop fixing
    FirstOnly,
    /// Apply up to this many fixes
    Bounded(usize),
    /// Apply fixes until none are left
    Unbounded,
}

impl FixMode {
    /// Whether another fix may be applied after `applied` fixes
    pub fn allows(&self, applied: usize) -> bool {
        match self {
            FixMode::Disabled => false,
            FixMode::FirstOnly => applied == 0,
            FixMode::Bounded(max) => applied < *max,
            FixMode::Unbounded => true,
        }
    }
}

type FixFilter = Arc<dyn Fn(&Diagnostic) -> bool>;

/// Options of a review run
#[derive(Clone, Default)]
pub struct ReviewOptions {
    pub fix_mode: FixMode,
    /// Run the data extraction stage
    pub extract_data: bool,
    fix_filter: Option<FixFilter>,
}

impl fmt::Debug for ReviewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewOptions")
            .field("fix_mode", &self.fix_mode)
            .field("extract_data", &self.extract_data)
            .field("fix_filter", &self.fix_filter.is_some())
            .finish()
    }
}

impl ReviewOptions {
    /// Create options that apply no fixes and extract nothing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fix_mode(mut self, mode: FixMode) -> Self {
        self.fix_mode = mode;
        self
    }

    pub fn with_data_extraction(mut self) -> Self {
        self.extract_data = true;
        self
    }

    /// Only apply fixes of diagnostics accepted by `filter`
    pub fn with_fix_filter(mut self, filter: impl Fn(&Diagnostic) -> bool + 'static) -> Self {
        self.fix_filter = Some(Arc::new(filter));
        self
    }

    fn accepts(&self, diagnostic: &Diagnostic) -> bool {
        self.fix_filter
            .as_ref()
            .map_or(true, |filter| filter(diagnostic))
    }
}

/// Identity of a diagnostic within one rule, independent of its fix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FixedKey {
    target: Target,
    range: Range,
    message: String,
    details: Vec<String>,
}

impl From<&Diagnostic> for FixedKey {
    fn from(diagnostic: &Diagnostic) -> Self {
        Self {
            target: diagnostic.target.clone(),
            range: diagnostic.range,
            message: diagnostic.message.clone(),
            details: diagnostic.details.clone(),
        }
    }
}

/// Diagnostics fixed during one review session
#[derive(Debug, Clone, Default)]
pub struct FixedErrors {
    by_rule: HashMap<(String, usize), HashSet<FixedKey>>,
    count: usize,
}

impl FixedErrors {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, diagnostic: &Diagnostic) {
        let rule = (diagnostic.rule_name.clone(), diagnostic.rule_id);
        if self.by_rule.entry(rule).or_default().insert(diagnostic.into()) {
            self.count += 1;
        }
    }

    pub fn contains(&self, diagnostic: &Diagnostic) -> bool {
        self.by_rule
            .get(&(diagnostic.rule_name.clone(), diagnostic.rule_id))
            .is_some_and(|fixed| fixed.contains(&FixedKey::from(diagnostic)))
    }

    /// Number of fixes applied so far
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// What happened when a stage's diagnostics were offered for fixing
#[derive(Debug)]
pub(crate) enum FixOutcome {
    NoFix,
    /// The file of this target was rewritten and reparsed
    Applied(Target),
    Aborted(ReviewError),
}

/// Apply the first qualifying fix among `diagnostics`, in report order
pub(crate) fn apply_first_fix(
    diagnostics: &[Diagnostic],
    project: &mut Project,
    options: &ReviewOptions,
    fixed: &mut FixedErrors,
    exceptions: &Exceptions,
) -> FixOutcome {
    if !options.fix_mode.allows(fixed.count()) {
        return FixOutcome::NoFix;
    }

    for diagnostic in diagnostics {
        let Some(edits) = diagnostic.fixes.as_deref().filter(|edits| !edits.is_empty()) else {
            continue;
        };
        if exceptions.is_ignored(&diagnostic.target) || !options.accepts(diagnostic) {
            continue;
        }
        if fixed.contains(diagnostic) {
            log::warn!(
                "{} reported a problem it already fixed, aborting: {}",
                diagnostic.rule_name,
                diagnostic
            );
            return FixOutcome::Aborted(ReviewError::FixLoop {
                rule: diagnostic.rule_name.clone(),
                message: diagnostic.message.clone(),
            });
        }

        let Some(source) = project.file_source(&diagnostic.target) else {
            continue;
        };
        let fixed_source = match apply_edits(source, edits) {
            Ok(fixed_source) => fixed_source,
            Err(problem) => {
                log::warn!("Skipping fix of {}: {}", diagnostic, problem);
                continue;
            }
        };

        if let Err(error) = project.replace_file_source(&diagnostic.target, fixed_source) {
            log::warn!("Fix of {} broke the file: {}", diagnostic, error);
            return FixOutcome::Aborted(ReviewError::InvalidFix {
                rule: diagnostic.rule_name.clone(),
                path: diagnostic.target.to_string(),
                error,
            });
        }

        fixed.insert(diagnostic);
        log::info!("Fixed {}", diagnostic);
        return FixOutcome::Applied(diagnostic.target.clone());
    }

    FixOutcome::NoFix
}

/// Drop fixes that cannot be applied to the current text of their file
pub(crate) fn validate_fixes(diagnostics: &mut [Diagnostic], project: &Project) {
    for diagnostic in diagnostics.iter_mut() {
        let Some(edits) = diagnostic.fixes.as_deref() else {
            continue;
        };
        let problem = match project.file_source(&diagnostic.target) {
            Some(source) => apply_edits(source, edits).err(),
            None => edits.first().map(|edit| crate::fix::FixProblem::InvalidRange {
                range: edit.range,
            }),
        };
        if let Some(problem) = problem {
            log::warn!("Dropping fix of {}: {}", diagnostic, problem);
            diagnostic.strip_fix(problem);
        }
    }
}
