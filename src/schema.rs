//! Rule schema builders
//!
//! Schemas are drafts: every `with_*` call appends one visitor and hands the
//! schema back. A draft only becomes runnable through
//! [`Rule::from_module_schema`](crate::rule::Rule::from_module_schema) or
//! [`Rule::from_project_schema`](crate::rule::Rule::from_project_schema),
//! which validate it and turn mistakes into a configuration error.

use crate::ast::{
    CaseBlock, CaseBranch, Declaration, Expression, Import, LetBlock, LetDeclaration,
    ModuleHeader, Node,
};
use crate::context::{ContextCreator, ModuleContextFunctions, RequestedData};
use crate::diagnostic::Diagnostic;
use crate::hash::ContextHash;
use crate::project::{Dependency, ManifestFile, Readme};
use crate::visitor::ModuleVisitors;
use std::collections::BTreeMap;
use std::hash::Hash;
use std::sync::Arc;

/// Registration methods shared by every schema that walks modules
pub trait VisitorSchema<C>: Sized {
    #[doc(hidden)]
    fn visitors_mut(&mut self) -> &mut ModuleVisitors<C>;

    /// Visit the `module X exposing (..)` header
    fn with_module_definition_visitor(
        mut self,
        visitor: impl Fn(&Node<ModuleHeader>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().module_definition.push(Box::new(visitor));
        self
    }

    /// Visit the module documentation, `None` when there is none
    fn with_module_documentation_visitor(
        mut self,
        visitor: impl Fn(Option<&Node<String>>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().module_documentation.push(Box::new(visitor));
        self
    }

    /// Visit all comments of the module at once
    fn with_comments_visitor(
        mut self,
        visitor: impl Fn(&[Node<String>], &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().comments.push(Box::new(visitor));
        self
    }

    /// Visit each import, in source order
    fn with_import_visitor(
        mut self,
        visitor: impl Fn(&Node<Import>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().imports.push(Box::new(visitor));
        self
    }

    /// Visit the whole list of declarations before any single one
    fn with_declaration_list_visitor(
        mut self,
        visitor: impl Fn(&[Node<Declaration>], &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().declaration_list.push(Box::new(visitor));
        self
    }

    fn with_declaration_enter_visitor(
        mut self,
        visitor: impl Fn(&Node<Declaration>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().declaration_enter.push(Box::new(visitor));
        self
    }

    fn with_declaration_exit_visitor(
        mut self,
        visitor: impl Fn(&Node<Declaration>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().declaration_exit.push(Box::new(visitor));
        self
    }

    fn with_expression_enter_visitor(
        mut self,
        visitor: impl Fn(&Node<Expression>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().expression_enter.push(Box::new(visitor));
        self
    }

    fn with_expression_exit_visitor(
        mut self,
        visitor: impl Fn(&Node<Expression>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().expression_exit.push(Box::new(visitor));
        self
    }

    /// Visit each declaration of a `let` block before its body is walked
    fn with_let_declaration_enter_visitor(
        mut self,
        visitor: impl Fn(&LetBlock, &Node<LetDeclaration>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().let_declaration_enter.push(Box::new(visitor));
        self
    }

    fn with_let_declaration_exit_visitor(
        mut self,
        visitor: impl Fn(&LetBlock, &Node<LetDeclaration>, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().let_declaration_exit.push(Box::new(visitor));
        self
    }

    /// Visit each branch of a `case` block before its expression is walked
    fn with_case_branch_enter_visitor(
        mut self,
        visitor: impl Fn(&CaseBlock, &CaseBranch, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().case_branch_enter.push(Box::new(visitor));
        self
    }

    fn with_case_branch_exit_visitor(
        mut self,
        visitor: impl Fn(&CaseBlock, &CaseBranch, &mut C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().case_branch_exit.push(Box::new(visitor));
        self
    }

    /// Report from the finished module context
    fn with_final_module_evaluation(
        mut self,
        visitor: impl Fn(&C) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.visitors_mut().final_evaluation.push(Box::new(visitor));
        self
    }
}

/// Draft of a rule that looks at one module at a time
pub struct ModuleRuleSchema<M> {
    pub(crate) name: String,
    pub(crate) initial: ContextCreator<(), M>,
    pub(crate) visitors: ModuleVisitors<M>,
    pub(crate) provides_fixes: bool,
}

impl<M: Clone + 'static> ModuleRuleSchema<M> {
    /// Create a module rule starting every module from `initial`
    pub fn new(name: &str, initial: M) -> Self {
        Self {
            name: name.to_string(),
            initial: ContextCreator::new(move |_, _: &()| initial.clone()),
            visitors: ModuleVisitors::default(),
            provides_fixes: false,
        }
    }
}

impl<M: 'static> ModuleRuleSchema<M> {
    /// Create a module rule whose initial context is built per module
    pub fn with_context_creator(name: &str, creator: ContextCreator<(), M>) -> Self {
        Self {
            name: name.to_string(),
            initial: creator,
            visitors: ModuleVisitors::default(),
            provides_fixes: false,
        }
    }

    /// Declare that the rule reports fixes
    pub fn providing_fixes(mut self) -> Self {
        self.provides_fixes = true;
        self
    }
}

impl<M> VisitorSchema<M> for ModuleRuleSchema<M> {
    fn visitors_mut(&mut self) -> &mut ModuleVisitors<M> {
        &mut self.visitors
    }
}

/// Module visitors of a project rule, built inside
/// [`ProjectRuleSchema::with_module_visitor`]
pub struct ModuleVisitorSchema<M> {
    visitors: ModuleVisitors<M>,
}

impl<M> VisitorSchema<M> for ModuleVisitorSchema<M> {
    fn visitors_mut(&mut self) -> &mut ModuleVisitors<M> {
        &mut self.visitors
    }
}

/// Order in which modules are visited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraversalMode {
    /// Every module starts from the same context; modules are independent
    #[default]
    AllModulesInParallel,
    /// A module starts from the fold of its imports' results
    ImportedModulesFirst,
}

pub(crate) type ManifestVisitor<P> =
    Box<dyn Fn(Option<&ManifestFile>, &mut P) -> Vec<Diagnostic>>;
pub(crate) type ReadmeVisitor<P> = Box<dyn Fn(Option<&Readme>, &mut P) -> Vec<Diagnostic>>;
pub(crate) type ExtraFilesVisitor<P> =
    Box<dyn Fn(&BTreeMap<String, String>, &mut P) -> Vec<Diagnostic>>;
pub(crate) type DependenciesVisitor<P> =
    Box<dyn Fn(&BTreeMap<String, Dependency>, &mut P) -> Vec<Diagnostic>>;
pub(crate) type FinalProjectVisitor<P> = Box<dyn Fn(&P) -> Vec<Diagnostic>>;
pub(crate) type DataExtractor<P> = Box<dyn Fn(&P) -> serde_json::Value>;
pub(crate) type Fingerprint<P> = Arc<dyn Fn(&P) -> ContextHash>;

/// Draft of a rule that looks at the whole project
pub struct ProjectRuleSchema<P, M> {
    pub(crate) name: String,
    pub(crate) initial: P,
    pub(crate) fingerprint: Fingerprint<P>,
    pub(crate) manifest_visitors: Vec<ManifestVisitor<P>>,
    pub(crate) readme_visitors: Vec<ReadmeVisitor<P>>,
    pub(crate) extra_files_visitors: Vec<ExtraFilesVisitor<P>>,
    pub(crate) dependencies_visitors: Vec<DependenciesVisitor<P>>,
    pub(crate) direct_dependencies_visitors: Vec<DependenciesVisitor<P>>,
    pub(crate) module_visitors: ModuleVisitors<M>,
    pub(crate) module_visitor_registered: bool,
    pub(crate) module_context: Option<ModuleContextFunctions<P, M>>,
    pub(crate) module_context_registrations: usize,
    pub(crate) traversal: TraversalMode,
    pub(crate) final_evaluation: Vec<FinalProjectVisitor<P>>,
    pub(crate) data_extractor: Option<DataExtractor<P>>,
    pub(crate) provides_fixes: bool,
}

impl<P: Hash + 'static, M> ProjectRuleSchema<P, M> {
    /// Create a project rule; cache validity uses the context's [`Hash`]
    pub fn new(name: &str, initial: P) -> Self {
        Self::new_with_fingerprint(name, initial, |context: &P| {
            ContextHash::of_hashable(context)
        })
    }
}

impl<P, M> ProjectRuleSchema<P, M> {
    /// Create a project rule with an explicit context fingerprint
    ///
    /// Two contexts with the same fingerprint must lead to the same results,
    /// since cached results are reused on a fingerprint match.
    pub fn new_with_fingerprint(
        name: &str,
        initial: P,
        fingerprint: impl Fn(&P) -> ContextHash + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            initial,
            fingerprint: Arc::new(fingerprint),
            manifest_visitors: Vec::new(),
            readme_visitors: Vec::new(),
            extra_files_visitors: Vec::new(),
            dependencies_visitors: Vec::new(),
            direct_dependencies_visitors: Vec::new(),
            module_visitors: ModuleVisitors::default(),
            module_visitor_registered: false,
            module_context: None,
            module_context_registrations: 0,
            traversal: TraversalMode::default(),
            final_evaluation: Vec::new(),
            data_extractor: None,
            provides_fixes: false,
        }
    }

    /// Visit the project manifest, `None` when the project has none
    pub fn with_manifest_visitor(
        mut self,
        visitor: impl Fn(Option<&ManifestFile>, &mut P) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.manifest_visitors.push(Box::new(visitor));
        self
    }

    pub fn with_readme_visitor(
        mut self,
        visitor: impl Fn(Option<&Readme>, &mut P) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.readme_visitors.push(Box::new(visitor));
        self
    }

    /// Visit the non-source files of the project, by path
    pub fn with_extra_files_visitor(
        mut self,
        visitor: impl Fn(&BTreeMap<String, String>, &mut P) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.extra_files_visitors.push(Box::new(visitor));
        self
    }

    /// Visit every dependency, direct or not
    pub fn with_dependencies_visitor(
        mut self,
        visitor: impl Fn(&BTreeMap<String, Dependency>, &mut P) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.dependencies_visitors.push(Box::new(visitor));
        self
    }

    /// Visit the dependencies the manifest lists as direct
    pub fn with_direct_dependencies_visitor(
        mut self,
        visitor: impl Fn(&BTreeMap<String, Dependency>, &mut P) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.direct_dependencies_visitors.push(Box::new(visitor));
        self
    }

    /// Register module visitors
    ///
    /// Requires [`with_module_context`](Self::with_module_context).
    pub fn with_module_visitor(
        mut self,
        build: impl FnOnce(ModuleVisitorSchema<M>) -> ModuleVisitorSchema<M>,
    ) -> Self {
        let schema = ModuleVisitorSchema {
            visitors: std::mem::take(&mut self.module_visitors),
        };
        self.module_visitors = build(schema).visitors;
        self.module_visitor_registered = true;
        self
    }

    /// Register how context moves between project and modules
    pub fn with_module_context(mut self, functions: ModuleContextFunctions<P, M>) -> Self {
        self.module_context = Some(functions);
        self.module_context_registrations += 1;
        self
    }

    /// Visit modules after the modules they import, starting each one from
    /// the fold of its imports' results
    pub fn with_context_from_imported_modules(mut self) -> Self {
        self.traversal = TraversalMode::ImportedModulesFirst;
        self
    }

    /// Report from the context of the whole project
    pub fn with_final_project_evaluation(
        mut self,
        visitor: impl Fn(&P) -> Vec<Diagnostic> + 'static,
    ) -> Self {
        self.final_evaluation.push(Box::new(visitor));
        self
    }

    /// Extract data from the final project context
    pub fn with_data_extractor(
        mut self,
        extractor: impl Fn(&P) -> serde_json::Value + 'static,
    ) -> Self {
        self.data_extractor = Some(Box::new(extractor));
        self
    }

    /// Declare that the rule reports fixes
    pub fn providing_fixes(mut self) -> Self {
        self.provides_fixes = true;
        self
    }

    pub(crate) fn project_visitor_count(&self) -> usize {
        self.manifest_visitors.len()
            + self.readme_visitors.len()
            + self.extra_files_visitors.len()
            + self.dependencies_visitors.len()
            + self.direct_dependencies_visitors.len()
            + self.final_evaluation.len()
    }

    pub(crate) fn requested(&self) -> RequestedData {
        self.module_context
            .as_ref()
            .map(ModuleContextFunctions::requested)
            .unwrap_or_default()
    }

    /// Check the draft, returning the first problem found
    pub(crate) fn validate(&self) -> Result<(), (String, Vec<String>)> {
        if self.name.trim().is_empty() {
            return Err((
                "Rule name is empty".to_string(),
                vec!["Every rule needs a name so its diagnostics can be attributed.".to_string()],
            ));
        }
        if self.project_visitor_count() == 0 && self.module_visitors.is_empty() {
            return Err((
                format!("Rule `{}` has no visitors", self.name),
                vec![
                    "A rule must register at least one visitor, otherwise it can never \
                     report anything."
                        .to_string(),
                ],
            ));
        }
        if self.module_context_registrations > 1 {
            return Err((
                format!("Rule `{}` sets its module context more than once", self.name),
                vec!["Call `with_module_context` a single time.".to_string()],
            ));
        }
        if self.module_visitor_registered && self.module_context.is_none() {
            return Err((
                format!("Rule `{}` has module visitors but no module context", self.name),
                vec![
                    "Module visitors need to know how to create a module context and how to \
                     turn it back into a project context. Add `with_module_context`."
                        .to_string(),
                ],
            ));
        }
        Ok(())
    }
}

impl<M: 'static> ModuleRuleSchema<M> {
    /// Turn the module rule into a project rule with a unit project context
    pub(crate) fn into_project_schema(self) -> ProjectRuleSchema<(), M> {
        let functions = ModuleContextFunctions::new(
            self.initial,
            ContextCreator::new(|_, _: &M| ()),
            |_: (), _: ()| (),
        );

        let mut schema = ProjectRuleSchema::new_with_fingerprint(&self.name, (), |_: &()| {
            ContextHash::unit()
        })
        .with_module_context(functions);
        schema.module_visitors = self.visitors;
        schema.module_visitor_registered = true;
        schema.provides_fixes = self.provides_fixes;
        schema
    }
}
