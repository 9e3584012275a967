//! Multi-rule review driver
//!
//! Rules run one after the other against a shared project snapshot that
//! their fixes update. When a rule applies a fix, every rule before it may
//! hold stale results, so the queue starts over from the front.

use crate::cache::CacheStats;
use crate::diagnostic::Diagnostic;
use crate::error::ReviewError;
use crate::fixer::{FixedErrors, ReviewOptions};
use crate::project::Project;
use crate::rule::Rule;
use std::collections::BTreeMap;

/// An ordered list of rules reviewed together
#[derive(Debug, Clone, Default)]
pub struct Reviewer {
    rules: Vec<Rule>,
}

/// Everything a review produced
#[derive(Debug)]
pub struct ReviewResult {
    /// Diagnostics of every rule, in rule order
    pub diagnostics: Vec<Diagnostic>,
    /// The reviewer holding every rule's updated cache
    pub reviewer: Reviewer,
    /// The project after applying fixes
    pub project: Project,
    pub fixed: FixedErrors,
    /// Extracted data, by rule name
    pub extracts: BTreeMap<String, serde_json::Value>,
    pub abort: Option<ReviewError>,
}

impl ReviewResult {
    /// Check if there are any diagnostics
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl Reviewer {
    /// Compose a rule list
    ///
    /// Each rule gets its position in `rules` as id. Rules that remove unused
    /// code run first; the order is otherwise kept.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut rules: Vec<Rule> = rules
            .into_iter()
            .enumerate()
            .map(|(id, rule)| rule.with_id(id))
            .collect();
        rules.sort_by_key(Rule::priority);
        Self { rules }
    }

    /// Rules in the order they run
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Combined statistics of every rule's cache
    pub fn cache_stats(&self) -> CacheStats {
        self.rules
            .iter()
            .map(Rule::cache_stats)
            .fold(CacheStats::default(), |total, stats| CacheStats {
                total_entries: total.total_entries + stats.total_entries,
                module_entries: total.module_entries + stats.module_entries,
                total_diagnostics: total.total_diagnostics + stats.total_diagnostics,
            })
    }

    /// Review a project with every rule
    pub fn review(&self, project: &Project, options: &ReviewOptions) -> ReviewResult {
        let blocking = project.blocking_diagnostics();
        if !blocking.is_empty() {
            log::debug!("Project has {} blocking problems", blocking.len());
            return ReviewResult {
                diagnostics: blocking,
                reviewer: self.clone(),
                project: project.clone(),
                fixed: FixedErrors::new(),
                extracts: BTreeMap::new(),
                abort: None,
            };
        }

        let mut rules = self.rules.clone();
        let mut results: Vec<Vec<Diagnostic>> = vec![Vec::new(); rules.len()];
        let mut extracts = BTreeMap::new();
        let mut project = project.clone();
        let mut fixed = FixedErrors::new();
        let mut abort = None;

        let mut index = 0;
        while index < rules.len() {
            let applied_before = fixed.count();
            let run = rules[index].run(&project, options, &mut fixed);

            let name = run.rule.name().to_string();
            rules[index] = run.rule;
            results[index] = run.diagnostics;
            project = run.project;
            match run.extract {
                Some(extract) => {
                    extracts.insert(name.clone(), extract);
                }
                None => {
                    extracts.remove(&name);
                }
            }

            if let Some(error) = run.abort {
                abort = Some(error);
                break;
            }

            if fixed.count() > applied_before && index > 0 {
                log::debug!("{} changed the project, restarting the rule queue", name);
                index = 0;
            } else {
                index += 1;
            }
        }

        ReviewResult {
            diagnostics: results.into_iter().flatten().collect(),
            reviewer: Reviewer { rules },
            project,
            fixed,
            extracts,
            abort,
        }
    }
}
