//! Rule definition and review entry point
//!
//! A [`Rule`] is an immutable value: reviewing a project returns the
//! diagnostics together with a new `Rule` that holds the updated cache.
//! Reviewing again with that rule only recomputes what the project changes
//! affect.

use crate::cache::CacheStats;
use crate::context::RequestedData;
use crate::diagnostic::{Diagnostic, Target};
use crate::engine::{ProjectRuleRunner, RuleRunner};
use crate::error::ReviewError;
use crate::fixer::{FixedErrors, ReviewOptions};
use crate::project::{normalize_path, Project};
use crate::schema::{ModuleRuleSchema, ProjectRuleSchema};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Order in which the reviewer runs rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RulePriority {
    /// Removes code that became unused; runs first since it shrinks the
    /// work of every other rule
    RemovesUnusedCode,
    #[default]
    Normal,
}

impl RulePriority {
    /// Default priority for a rule name
    pub fn for_rule_name(name: &str) -> Self {
        if name.starts_with("NoUnused") {
            RulePriority::RemovesUnusedCode
        } else {
            RulePriority::Normal
        }
    }
}

impl fmt::Display for RulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RulePriority::RemovesUnusedCode => write!(f, "removes-unused-code"),
            RulePriority::Normal => write!(f, "normal"),
        }
    }
}

impl std::str::FromStr for RulePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "removes-unused-code" | "unused" => Ok(RulePriority::RemovesUnusedCode),
            "normal" => Ok(RulePriority::Normal),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Paths whose diagnostics a rule drops
#[derive(Debug, Clone, Default)]
pub struct Exceptions {
    files: BTreeSet<String>,
    directories: Vec<String>,
    patterns: Vec<String>,
    globs: Option<GlobSet>,
}

impl Exceptions {
    /// Whether diagnostics for `target` are dropped
    pub fn is_ignored(&self, target: &Target) -> bool {
        target.path().is_some_and(|path| self.is_ignored_path(path))
    }

    pub fn is_ignored_path(&self, path: &str) -> bool {
        self.files.contains(path)
            || self
                .directories
                .iter()
                .any(|dir| path.starts_with(&format!("{}/", dir)))
            || self.globs.as_ref().is_some_and(|globs| globs.is_match(path))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty() && self.globs.is_none()
    }

    fn add_globs(&mut self, patterns: &[&str]) -> Result<(), globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in self.patterns.iter().map(String::as_str).chain(patterns.iter().copied()) {
            builder.add(Glob::new(pattern)?);
        }
        self.globs = Some(builder.build()?);
        self.patterns.extend(patterns.iter().map(|pattern| pattern.to_string()));
        Ok(())
    }
}

/// Reason a rule cannot run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    pub message: String,
    pub details: Vec<String>,
}

#[derive(Clone)]
enum RuleBody {
    Runner(Arc<dyn RuleRunner>),
    ConfigurationError(ConfigurationError),
}

/// A named, independent analysis pass
#[derive(Clone)]
pub struct Rule {
    name: String,
    id: usize,
    exceptions: Exceptions,
    requested: RequestedData,
    provides_fixes: bool,
    extracts_data: bool,
    priority: RulePriority,
    body: RuleBody,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("configuration_error", &self.configuration_error())
            .finish()
    }
}

/// Everything a review of one rule produced
#[derive(Debug)]
pub struct RuleReview {
    pub diagnostics: Vec<Diagnostic>,
    /// The rule holding the updated cache
    pub rule: Rule,
    /// The project after applying fixes
    pub project: Project,
    pub fixed: FixedErrors,
    pub extract: Option<serde_json::Value>,
    pub abort: Option<ReviewError>,
}

impl Rule {
    /// Validate a module rule draft and build the rule
    pub fn from_module_schema<M: 'static>(schema: ModuleRuleSchema<M>) -> Rule {
        Self::from_project_schema(schema.into_project_schema())
    }

    /// Validate a project rule draft and build the rule
    pub fn from_project_schema<P: Clone + 'static, M: 'static>(
        schema: ProjectRuleSchema<P, M>,
    ) -> Rule {
        if let Err((message, details)) = schema.validate() {
            let name = schema.name.clone();
            log::warn!("Rule {} is misconfigured: {}", name, message);
            return Rule::misconfigured(&name, &message, details);
        }

        let name = schema.name.clone();
        let requested = schema.requested();
        let provides_fixes = schema.provides_fixes;
        let extracts_data = schema.data_extractor.is_some();

        let mut rule = Rule::new(
            &name,
            RuleBody::Runner(Arc::new(ProjectRuleRunner::new(schema))),
        );
        rule.requested = requested;
        rule.provides_fixes = provides_fixes;
        rule.extracts_data = extracts_data;
        rule
    }

    /// A rule that reports a configuration problem instead of running
    pub fn misconfigured<D, S>(name: &str, message: &str, details: D) -> Rule
    where
        D: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::new(
            name,
            RuleBody::ConfigurationError(ConfigurationError {
                message: message.to_string(),
                details: details.into_iter().map(Into::into).collect(),
            }),
        )
    }

    fn new(name: &str, body: RuleBody) -> Rule {
        Rule {
            name: name.to_string(),
            id: 0,
            exceptions: Exceptions::default(),
            requested: RequestedData::default(),
            provides_fixes: false,
            extracts_data: false,
            priority: RulePriority::for_rule_name(name),
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the rule in the reviewed rule list
    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn with_id(mut self, id: usize) -> Rule {
        self.id = id;
        self
    }

    pub fn priority(&self) -> RulePriority {
        self.priority
    }

    pub fn with_priority(mut self, priority: RulePriority) -> Rule {
        self.priority = priority;
        self
    }

    pub fn provides_fixes(&self) -> bool {
        self.provides_fixes
    }

    pub fn extracts_data(&self) -> bool {
        self.extracts_data
    }

    /// Capabilities the rule asked the engine to compute
    pub fn requested(&self) -> RequestedData {
        self.requested
    }

    pub fn exceptions(&self) -> &Exceptions {
        &self.exceptions
    }

    pub fn configuration_error(&self) -> Option<&ConfigurationError> {
        match &self.body {
            RuleBody::ConfigurationError(error) => Some(error),
            RuleBody::Runner(_) => None,
        }
    }

    /// Drop diagnostics for these files
    pub fn ignore_errors_for_files(mut self, files: &[&str]) -> Rule {
        self.exceptions
            .files
            .extend(files.iter().map(|file| normalize_path(file)));
        self
    }

    /// Drop diagnostics for files in these directories
    pub fn ignore_errors_for_directories(mut self, directories: &[&str]) -> Rule {
        self.exceptions.directories.extend(
            directories
                .iter()
                .map(|dir| normalize_path(dir).trim_end_matches('/').to_string()),
        );
        self
    }

    /// Drop diagnostics for files matching these glob patterns
    ///
    /// An invalid pattern turns the rule into a configuration error.
    pub fn ignore_errors_for_globs(mut self, patterns: &[&str]) -> Rule {
        match self.exceptions.add_globs(patterns) {
            Ok(()) => self,
            Err(error) => Rule::misconfigured(
                &self.name,
                "Invalid glob pattern",
                [format!("Could not use the ignore patterns: {}", error)],
            )
            .with_id(self.id),
        }
    }

    /// Statistics of the rule's cache
    pub fn cache_stats(&self) -> CacheStats {
        match &self.body {
            RuleBody::Runner(runner) => runner.cache_stats(),
            RuleBody::ConfigurationError(_) => CacheStats::default(),
        }
    }

    /// Review a project without applying fixes
    ///
    /// Returns the diagnostics and the rule holding the updated cache.
    pub fn review(&self, project: &Project) -> (Vec<Diagnostic>, Rule) {
        let review = self.review_with_options(project, &ReviewOptions::default());
        (review.diagnostics, review.rule)
    }

    /// Review a project, applying fixes as `options` allow
    pub fn review_with_options(&self, project: &Project, options: &ReviewOptions) -> RuleReview {
        let blocking = project.blocking_diagnostics();
        if !blocking.is_empty() && self.configuration_error().is_none() {
            return RuleReview {
                diagnostics: blocking,
                rule: self.clone(),
                project: project.clone(),
                fixed: FixedErrors::new(),
                extract: None,
                abort: None,
            };
        }

        let mut fixed = FixedErrors::new();
        let run = self.run(project, options, &mut fixed);
        RuleReview {
            diagnostics: run.diagnostics,
            rule: run.rule,
            project: run.project,
            fixed,
            extract: run.extract,
            abort: run.abort,
        }
    }

    /// Run against a project whose blocking problems were already checked
    pub(crate) fn run(
        &self,
        project: &Project,
        options: &ReviewOptions,
        fixed: &mut FixedErrors,
    ) -> RuleRun {
        match &self.body {
            RuleBody::ConfigurationError(error) => {
                let mut diagnostic = Diagnostic::configuration(
                    &self.name,
                    &error.message,
                    error.details.iter().cloned(),
                );
                diagnostic.rule_id = self.id;
                RuleRun {
                    diagnostics: vec![diagnostic],
                    rule: self.clone(),
                    project: project.clone(),
                    extract: None,
                    abort: None,
                }
            }
            RuleBody::Runner(runner) => {
                let outcome = runner.run(self, project, options, fixed);
                let mut rule = self.clone();
                rule.body = RuleBody::Runner(outcome.runner);
                RuleRun {
                    diagnostics: outcome.diagnostics,
                    rule,
                    project: outcome.project,
                    extract: outcome.extract,
                    abort: outcome.abort,
                }
            }
        }
    }
}

/// Result of running one rule inside a larger review
pub(crate) struct RuleRun {
    pub diagnostics: Vec<Diagnostic>,
    pub rule: Rule,
    pub project: Project,
    pub extract: Option<serde_json::Value>,
    pub abort: Option<ReviewError>,
}
