//! Per-rule result cache for incremental reviews
//!
//! Every stage of a rule run stores what it produced together with the
//! fingerprints it was computed from. A later run reuses an entry only when
//! the content hash and the input context hash both match (and, for modules
//! of rules that asked for it, the ignored status). Entries are never
//! updated in place: a mismatch rebuilds the entry wholesale, and unchanged
//! entries are shared between the old and the new cache.

use crate::diagnostic::Diagnostic;
use crate::hash::{ContentHash, ContextHash};
use std::collections::HashMap;
use std::sync::Arc;

/// Cached result of a project-file stage
#[derive(Debug)]
pub(crate) struct FileEntry<P> {
    pub content_hash: ContentHash,
    pub input_context: ContextHash,
    pub output: P,
    pub diagnostics: Vec<Diagnostic>,
}

impl<P> FileEntry<P> {
    pub fn matches(&self, content_hash: ContentHash, input_context: ContextHash) -> bool {
        self.content_hash == content_hash && self.input_context == input_context
    }
}

/// Cached result of visiting one module
#[derive(Debug)]
pub(crate) struct ModuleEntry<P> {
    pub content_hash: ContentHash,
    pub input_context: ContextHash,
    /// Only tracked when the rule requested the ignored status
    pub is_file_ignored: Option<bool>,
    pub output: P,
    pub diagnostics: Vec<Diagnostic>,
}

impl<P> ModuleEntry<P> {
    pub fn matches(
        &self,
        content_hash: ContentHash,
        input_context: ContextHash,
        is_file_ignored: Option<bool>,
    ) -> bool {
        self.content_hash == content_hash
            && self.input_context == input_context
            && self.is_file_ignored == is_file_ignored
    }
}

/// Cached result of a stage that only depends on a context
#[derive(Debug)]
pub(crate) struct ContextEntry<T> {
    pub input_context: ContextHash,
    pub value: T,
}

/// Cache of one rule
pub struct RuleCache<P> {
    pub(crate) manifest: Option<Arc<FileEntry<P>>>,
    pub(crate) readme: Option<Arc<FileEntry<P>>>,
    pub(crate) extra_files: Option<Arc<FileEntry<P>>>,
    pub(crate) dependencies: Option<Arc<FileEntry<P>>>,
    pub(crate) modules: HashMap<String, Arc<ModuleEntry<P>>>,
    pub(crate) final_evaluation: Option<Arc<ContextEntry<Vec<Diagnostic>>>>,
    pub(crate) extract: Option<Arc<ContextEntry<serde_json::Value>>>,
}

impl<P> Default for RuleCache<P> {
    fn default() -> Self {
        Self {
            manifest: None,
            readme: None,
            extra_files: None,
            dependencies: None,
            modules: HashMap::new(),
            final_evaluation: None,
            extract: None,
        }
    }
}

impl<P> Clone for RuleCache<P> {
    fn clone(&self) -> Self {
        Self {
            manifest: self.manifest.clone(),
            readme: self.readme.clone(),
            extra_files: self.extra_files.clone(),
            dependencies: self.dependencies.clone(),
            modules: self.modules.clone(),
            final_evaluation: self.final_evaluation.clone(),
            extract: self.extract.clone(),
        }
    }
}

impl<P> RuleCache<P> {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry of a module, if it is still valid
    pub(crate) fn valid_module(
        &self,
        path: &str,
        content_hash: ContentHash,
        input_context: ContextHash,
        is_file_ignored: Option<bool>,
    ) -> Option<&Arc<ModuleEntry<P>>> {
        self.modules
            .get(path)
            .filter(|entry| entry.matches(content_hash, input_context, is_file_ignored))
    }

    /// Drop entries of modules that are not part of the project anymore
    pub(crate) fn prune<'a>(&mut self, paths: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = paths.into_iter().collect();
        self.modules.retain(|path, _| keep.contains(path.as_str()));
    }

    /// Project-file entries, in stage order
    pub(crate) fn file_entries(&self) -> impl Iterator<Item = &Arc<FileEntry<P>>> {
        [
            &self.manifest,
            &self.readme,
            &self.extra_files,
            &self.dependencies,
        ]
        .into_iter()
        .flatten()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let files = self.file_entries().map(|entry| entry.diagnostics.len());
        let modules = self.modules.values().map(|entry| entry.diagnostics.len());
        let final_evaluation = self.final_evaluation.iter().map(|entry| entry.value.len());

        let counts: Vec<usize> = files.chain(modules).chain(final_evaluation).collect();
        CacheStats {
            total_entries: counts.len() + self.extract.iter().count(),
            module_entries: self.modules.len(),
            total_diagnostics: counts.iter().sum(),
        }
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub module_entries: usize,
    pub total_diagnostics: usize,
}
