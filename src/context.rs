//! Context propagation between project and module scope
//!
//! The engine never looks inside rule contexts. It only derives a module
//! context from a project context, turns a finished module context back into
//! a project-context fragment, and folds fragments together.

use crate::ast::{Module, Range};
use crate::fix::source_in_range;
use crate::lookup::ModuleNameLookupTable;
use crate::project::{Project, ProjectModule};
use std::sync::Arc;

/// Optional facts a rule asks the engine to compute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedData {
    pub module_name_lookup_table: bool,
    pub ignored_files: bool,
    pub source_code_extractor: bool,
}

impl RequestedData {
    /// Everything requested by either side
    pub fn union(self, other: RequestedData) -> RequestedData {
        RequestedData {
            module_name_lookup_table: self.module_name_lookup_table
                || other.module_name_lookup_table,
            ignored_files: self.ignored_files || other.ignored_files,
            source_code_extractor: self.source_code_extractor || other.source_code_extractor,
        }
    }
}

/// What a context creator gets to know about the module at hand
pub struct ModuleInfo<'a> {
    pub(crate) module: &'a ProjectModule,
    pub(crate) project: &'a Project,
    pub(crate) is_file_ignored: bool,
    pub(crate) lookup_table: Option<&'a ModuleNameLookupTable>,
    pub(crate) source_code_extractor: bool,
}

impl<'a> ModuleInfo<'a> {
    pub fn path(&self) -> &'a str {
        &self.module.path
    }

    pub fn module_name(&self) -> &'a [String] {
        self.module.name()
    }

    pub fn ast(&self) -> &'a Module {
        &self.module.ast
    }

    /// Whether the module is in the manifest's source directories
    pub fn is_in_source_directories(&self) -> bool {
        self.project.is_in_source_directories(&self.module.path)
    }

    /// Whether the rule ignores diagnostics for this module
    ///
    /// Always `false` unless the creator requested it with
    /// [`ContextCreator::with_is_file_ignored`].
    pub fn is_file_ignored(&self) -> bool {
        self.is_file_ignored
    }

    /// Origin of every reference in the module
    ///
    /// `None` unless the creator requested it with
    /// [`ContextCreator::with_module_name_lookup_table`].
    pub fn lookup_table(&self) -> Option<&'a ModuleNameLookupTable> {
        self.lookup_table
    }

    /// Source text covered by `range`
    ///
    /// `None` unless the creator requested it with
    /// [`ContextCreator::with_source_code_extractor`].
    pub fn extract_source(&self, range: Range) -> Option<&'a str> {
        if !self.source_code_extractor {
            return None;
        }
        source_in_range(&self.module.source, range)
    }
}

type CreateFn<From, To> = dyn Fn(&ModuleInfo<'_>, &From) -> To;

/// Builds one context out of another, for a given module
pub struct ContextCreator<From, To> {
    create: Arc<CreateFn<From, To>>,
    requested: RequestedData,
}

impl<From, To> Clone for ContextCreator<From, To> {
    fn clone(&self) -> Self {
        Self {
            create: Arc::clone(&self.create),
            requested: self.requested,
        }
    }
}

impl<From, To> ContextCreator<From, To> {
    /// Create a context creator from a function
    pub fn new(create: impl Fn(&ModuleInfo<'_>, &From) -> To + 'static) -> Self {
        Self {
            create: Arc::new(create),
            requested: RequestedData::default(),
        }
    }

    /// Request the module name lookup table
    pub fn with_module_name_lookup_table(mut self) -> Self {
        self.requested.module_name_lookup_table = true;
        self
    }

    /// Request the ignored status of the module
    ///
    /// Cached module results then also depend on whether the module is
    /// ignored.
    pub fn with_is_file_ignored(mut self) -> Self {
        self.requested.ignored_files = true;
        self
    }

    /// Request access to the module's source text
    pub fn with_source_code_extractor(mut self) -> Self {
        self.requested.source_code_extractor = true;
        self
    }

    pub fn requested(&self) -> RequestedData {
        self.requested
    }

    pub(crate) fn create(&self, info: &ModuleInfo<'_>, from: &From) -> To {
        (self.create)(info, from)
    }
}

type FoldFn<P> = dyn Fn(P, P) -> P;

/// How a project rule moves context in and out of modules
///
/// `fold(new, accumulated)` must be associative and idempotent: the engine
/// folds fragments in whatever order suits it.
pub struct ModuleContextFunctions<P, M> {
    pub(crate) from_project_to_module: ContextCreator<P, M>,
    pub(crate) from_module_to_project: ContextCreator<M, P>,
    pub(crate) fold: Arc<FoldFn<P>>,
}

impl<P, M> Clone for ModuleContextFunctions<P, M> {
    fn clone(&self) -> Self {
        Self {
            from_project_to_module: self.from_project_to_module.clone(),
            from_module_to_project: self.from_module_to_project.clone(),
            fold: Arc::clone(&self.fold),
        }
    }
}

impl<P, M> ModuleContextFunctions<P, M> {
    pub fn new(
        from_project_to_module: ContextCreator<P, M>,
        from_module_to_project: ContextCreator<M, P>,
        fold: impl Fn(P, P) -> P + 'static,
    ) -> Self {
        Self {
            from_project_to_module,
            from_module_to_project,
            fold: Arc::new(fold),
        }
    }

    /// Capabilities requested by either creator
    pub fn requested(&self) -> RequestedData {
        self.from_project_to_module
            .requested()
            .union(self.from_module_to_project.requested())
    }

    pub(crate) fn fold(&self, new: P, accumulated: P) -> P {
        (self.fold)(new, accumulated)
    }
}
