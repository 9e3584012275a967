//! Project orchestration state machine
//!
//! A rule run walks the stages `Manifest -> Readme -> ExtraFiles ->
//! Dependencies -> Modules -> FinalEvaluation -> DataExtract -> End`. Each
//! stage reuses its cache entry when the content and input context
//! fingerprints match, and otherwise runs its visitors and replaces the
//! entry. After every stage the stage's diagnostics are offered for fixing;
//! an applied fix re-enters the run where the changed file matters:
//! project files restart at `Manifest`, modules re-point the module cursor.

use crate::cache::{CacheStats, ContextEntry, FileEntry, ModuleEntry, RuleCache};
use crate::context::ModuleInfo;
use crate::diagnostic::{Diagnostic, Target};
use crate::error::ReviewError;
use crate::fixer::{apply_first_fix, validate_fixes, FixOutcome, FixedErrors, ReviewOptions};
use crate::graph::{GraphCursor, ModuleGraph};
use crate::hash::{ContentHash, ContextHash};
use crate::lookup::ModuleNameLookupTable;
use crate::project::{Project, ProjectModule};
use crate::rule::Rule;
use crate::schema::{ProjectRuleSchema, TraversalMode};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_MANIFEST_PATH: &str = "elm.json";
const DEFAULT_README_PATH: &str = "README.md";

/// Type-erased rule body: a compiled schema together with its cache
pub(crate) trait RuleRunner {
    fn run(
        &self,
        rule: &Rule,
        project: &Project,
        options: &ReviewOptions,
        fixed: &mut FixedErrors,
    ) -> RunOutcome;

    fn cache_stats(&self) -> CacheStats;
}

/// Result of one rule run
pub(crate) struct RunOutcome {
    pub diagnostics: Vec<Diagnostic>,
    /// Same rule body, holding the updated cache
    pub runner: Arc<dyn RuleRunner>,
    pub project: Project,
    pub extract: Option<serde_json::Value>,
    pub abort: Option<ReviewError>,
}

pub(crate) struct ProjectRuleRunner<P, M> {
    schema: Arc<ProjectRuleSchema<P, M>>,
    cache: RuleCache<P>,
}

impl<P, M> ProjectRuleRunner<P, M> {
    pub fn new(schema: ProjectRuleSchema<P, M>) -> Self {
        Self {
            schema: Arc::new(schema),
            cache: RuleCache::new(),
        }
    }
}

impl<P: Clone + 'static, M: 'static> RuleRunner for ProjectRuleRunner<P, M> {
    fn run(
        &self,
        rule: &Rule,
        project: &Project,
        options: &ReviewOptions,
        fixed: &mut FixedErrors,
    ) -> RunOutcome {
        let mut run = Run {
            schema: &self.schema,
            rule,
            options,
            fixed,
            project: project.clone(),
            cache: self.cache.clone(),
            cursor: None,
            graph: ModuleGraph::default(),
            lookup_tables: HashMap::new(),
            reached: Reached::default(),
            extract: None,
        };
        let abort = run.execute();

        let Run {
            project,
            mut cache,
            cursor,
            reached,
            extract,
            ..
        } = run;
        let diagnostics = collect_diagnostics(rule, &cache, &reached, cursor.as_ref(), &project);
        cache.prune(project.modules().map(|module| module.path.as_str()));

        RunOutcome {
            diagnostics,
            runner: Arc::new(ProjectRuleRunner {
                schema: Arc::clone(&self.schema),
                cache,
            }),
            project,
            extract,
            abort,
        }
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

enum Step<P> {
    Manifest,
    Readme,
    ExtraFiles,
    Dependencies,
    StartModules,
    Modules,
    FinalEvaluation,
    DataExtract(P),
    End,
    Abort(ReviewError),
}

impl<P> Step<P> {
    fn name(&self) -> &'static str {
        match self {
            Step::Manifest => "manifest",
            Step::Readme => "readme",
            Step::ExtraFiles => "extra files",
            Step::Dependencies => "dependencies",
            Step::StartModules | Step::Modules => "modules",
            Step::FinalEvaluation => "final evaluation",
            Step::DataExtract(_) => "data extraction",
            Step::End => "end",
            Step::Abort(_) => "abort",
        }
    }
}

/// State of one rule run
struct Run<'a, P, M> {
    schema: &'a ProjectRuleSchema<P, M>,
    rule: &'a Rule,
    options: &'a ReviewOptions,
    fixed: &'a mut FixedErrors,
    project: Project,
    cache: RuleCache<P>,
    /// Set once the run reached the module stage
    cursor: Option<GraphCursor>,
    graph: ModuleGraph,
    lookup_tables: HashMap<String, Arc<ModuleNameLookupTable>>,
    reached: Reached,
    extract: Option<serde_json::Value>,
}

impl<P: Clone, M> Run<'_, P, M> {
    fn execute(&mut self) -> Option<ReviewError> {
        let mut step = Step::Manifest;
        let mut last = "";
        loop {
            if step.name() != last {
                log::debug!("{}: entering {} stage", self.rule.name(), step.name());
                last = step.name();
            }
            step = match step {
                Step::Manifest => self.manifest_stage(),
                Step::Readme => self.readme_stage(),
                Step::ExtraFiles => self.extra_files_stage(),
                Step::Dependencies => self.dependencies_stage(),
                Step::StartModules => self.start_modules(),
                Step::Modules => self.modules_stage(),
                Step::FinalEvaluation => self.final_evaluation_stage(),
                Step::DataExtract(context) => self.data_extract_stage(context),
                Step::End => return None,
                Step::Abort(error) => {
                    log::warn!("{}: review aborted: {}", self.rule.name(), error);
                    return Some(error);
                }
            };
        }
    }

    fn fingerprint(&self, context: &P) -> ContextHash {
        (self.schema.fingerprint)(context)
    }

    fn manifest_stage(&mut self) -> Step<P> {
        let manifest = self
            .project
            .manifest()
            .map(|file| (file.path.clone(), file.raw.clone()));
        let content_hash = ContentHash::of_serializable(&manifest);
        let current = Target::Manifest {
            path: manifest
                .map(|(path, _)| path)
                .unwrap_or_else(|| DEFAULT_MANIFEST_PATH.to_string()),
        };
        self.file_stage(
            FileStage::Manifest,
            self.schema.initial.clone(),
            content_hash,
            current,
            |schema, project, context| {
                schema
                    .manifest_visitors
                    .iter()
                    .flat_map(|visitor| visitor(project.manifest(), context))
                    .collect()
            },
            Step::Readme,
        )
    }

    fn readme_stage(&mut self) -> Step<P> {
        let readme = self
            .project
            .readme()
            .map(|readme| (readme.path.clone(), readme.content.clone()));
        let content_hash = ContentHash::of_serializable(&readme);
        let current = Target::Readme {
            path: readme
                .map(|(path, _)| path)
                .unwrap_or_else(|| DEFAULT_README_PATH.to_string()),
        };
        let input = stage_output(&self.cache.manifest, &self.schema.initial);
        self.file_stage(
            FileStage::Readme,
            input,
            content_hash,
            current,
            |schema, project, context| {
                schema
                    .readme_visitors
                    .iter()
                    .flat_map(|visitor| visitor(project.readme(), context))
                    .collect()
            },
            Step::ExtraFiles,
        )
    }

    fn extra_files_stage(&mut self) -> Step<P> {
        let content_hash = ContentHash::of_serializable(self.project.extra_files());
        let input = stage_output(&self.cache.readme, &self.schema.initial);
        self.file_stage(
            FileStage::ExtraFiles,
            input,
            content_hash,
            Target::Global,
            |schema, project, context| {
                schema
                    .extra_files_visitors
                    .iter()
                    .flat_map(|visitor| visitor(project.extra_files(), context))
                    .collect()
            },
            Step::Dependencies,
        )
    }

    fn dependencies_stage(&mut self) -> Step<P> {
        let direct = self.project.direct_dependencies();
        let content_hash = ContentHash::of_serializable(&(
            self.project.dependencies(),
            direct.keys().collect::<Vec<_>>(),
        ));
        let input = stage_output(&self.cache.extra_files, &self.schema.initial);
        self.file_stage(
            FileStage::Dependencies,
            input,
            content_hash,
            Target::Global,
            move |schema, project, context| {
                let mut diagnostics = Vec::new();
                for visitor in &schema.dependencies_visitors {
                    diagnostics.extend(visitor(project.dependencies(), context));
                }
                for visitor in &schema.direct_dependencies_visitors {
                    diagnostics.extend(visitor(&direct, context));
                }
                diagnostics
            },
            Step::StartModules,
        )
    }

    /// Run a project-file stage through its cache slot
    fn file_stage(
        &mut self,
        stage: FileStage,
        input: P,
        content_hash: ContentHash,
        current: Target,
        visit: impl FnOnce(&ProjectRuleSchema<P, M>, &Project, &mut P) -> Vec<Diagnostic>,
        next: Step<P>,
    ) -> Step<P> {
        let input_context = self.fingerprint(&input);
        let cached = stage
            .slot(&mut self.cache)
            .as_ref()
            .filter(|entry| entry.matches(content_hash, input_context))
            .cloned();

        let entry = match cached {
            Some(entry) => {
                log::trace!("{}: cache hit for {}", self.rule.name(), current);
                entry
            }
            None => {
                log::trace!("{}: cache miss for {}", self.rule.name(), current);
                let mut output = input;
                let mut diagnostics = visit(self.schema, &self.project, &mut output);
                self.finish(&mut diagnostics, &current);
                let entry = Arc::new(FileEntry {
                    content_hash,
                    input_context,
                    output,
                    diagnostics,
                });
                *stage.slot(&mut self.cache) = Some(Arc::clone(&entry));
                entry
            }
        };

        self.reached.files[stage as usize] = true;
        self.offer_fixes(&entry.diagnostics, next)
    }

    fn start_modules(&mut self) -> Step<P> {
        self.graph = ModuleGraph::from_project(&self.project);
        match self.graph.topological_order() {
            Ok(order) => {
                self.cursor = Some(GraphCursor::new(order));
                Step::Modules
            }
            Err(cycle) => Step::Abort(ReviewError::ImportCycle {
                modules: cycle.modules,
            }),
        }
    }

    fn modules_stage(&mut self) -> Step<P> {
        if !self.schema.module_visitor_registered {
            return Step::FinalEvaluation;
        }
        let Some(path) = self
            .cursor
            .as_mut()
            .and_then(|cursor| cursor.current().map(String::from))
        else {
            return Step::FinalEvaluation;
        };
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.mark_visited(&path);
        }
        let Some(module) = self.project.module(&path).cloned() else {
            return Step::Modules;
        };

        let input = self.module_input(&path);
        let input_context = self.fingerprint(&input);
        let is_file_ignored = self
            .rule
            .requested()
            .ignored_files
            .then(|| self.rule.exceptions().is_ignored_path(&path));

        let cached = self
            .cache
            .valid_module(&path, module.content_hash, input_context, is_file_ignored)
            .cloned();
        let entry = match cached {
            Some(entry) => {
                log::trace!("{}: cache hit for {}", self.rule.name(), path);
                entry
            }
            None => {
                log::trace!("{}: cache miss for {}", self.rule.name(), path);
                let (output, mut diagnostics) =
                    self.visit_module(&module, &input, is_file_ignored.unwrap_or(false));
                let current = Target::Module { path: path.clone() };
                self.finish(&mut diagnostics, &current);
                let entry = Arc::new(ModuleEntry {
                    content_hash: module.content_hash,
                    input_context,
                    is_file_ignored,
                    output,
                    diagnostics,
                });
                self.cache.modules.insert(path, Arc::clone(&entry));
                entry
            }
        };

        self.offer_fixes(&entry.diagnostics, Step::Modules)
    }

    /// Context a module starts from
    fn module_input(&self, path: &str) -> P {
        let dependencies = stage_output(&self.cache.dependencies, &self.schema.initial);
        let Some(functions) = &self.schema.module_context else {
            return dependencies;
        };
        match self.schema.traversal {
            TraversalMode::AllModulesInParallel => dependencies,
            TraversalMode::ImportedModulesFirst => self
                .graph
                .imports_of(path)
                .filter_map(|imported| self.cache.modules.get(imported))
                .fold(dependencies, |accumulated, entry| {
                    functions.fold(entry.output.clone(), accumulated)
                }),
        }
    }

    fn visit_module(
        &mut self,
        module: &ProjectModule,
        input: &P,
        is_file_ignored: bool,
    ) -> (P, Vec<Diagnostic>) {
        let schema = self.schema;
        let Some(functions) = &schema.module_context else {
            return (input.clone(), Vec::new());
        };
        let lookup_table = self
            .rule
            .requested()
            .module_name_lookup_table
            .then(|| self.lookup_table(module));

        let info = ModuleInfo {
            module,
            project: &self.project,
            is_file_ignored,
            lookup_table: lookup_table.as_deref(),
            source_code_extractor: self.rule.requested().source_code_extractor,
        };
        let mut module_context = functions.from_project_to_module.create(&info, input);
        let diagnostics = schema.module_visitors.visit(&module.ast, &mut module_context);
        let output = functions.from_module_to_project.create(&info, &module_context);
        (output, diagnostics)
    }

    /// Lookup table of a module, computed at most once per project state
    fn lookup_table(&mut self, module: &ProjectModule) -> Arc<ModuleNameLookupTable> {
        if let Some(table) = self.lookup_tables.get(&module.path) {
            return Arc::clone(table);
        }
        let table = Arc::new(self.project.lookup_table(module));
        self.lookup_tables
            .insert(module.path.clone(), Arc::clone(&table));
        table
    }

    /// Fold every module's result onto the dependencies' context
    fn final_context(&self) -> P {
        let dependencies = stage_output(&self.cache.dependencies, &self.schema.initial);
        let (Some(functions), Some(cursor)) = (&self.schema.module_context, &self.cursor) else {
            return dependencies;
        };
        cursor
            .order()
            .iter()
            .filter_map(|path| self.cache.modules.get(path))
            .fold(dependencies, |accumulated, entry| {
                functions.fold(entry.output.clone(), accumulated)
            })
    }

    fn final_evaluation_stage(&mut self) -> Step<P> {
        let context = self.final_context();
        if self.schema.final_evaluation.is_empty() {
            return Step::DataExtract(context);
        }

        let input_context = self.fingerprint(&context);
        let cached = self
            .cache
            .final_evaluation
            .as_ref()
            .filter(|entry| entry.input_context == input_context)
            .cloned();
        let entry = match cached {
            Some(entry) => {
                log::trace!("{}: cache hit for final evaluation", self.rule.name());
                entry
            }
            None => {
                log::trace!("{}: cache miss for final evaluation", self.rule.name());
                let mut diagnostics: Vec<Diagnostic> = self
                    .schema
                    .final_evaluation
                    .iter()
                    .flat_map(|visitor| visitor(&context))
                    .collect();
                self.finish(&mut diagnostics, &Target::Global);
                let entry = Arc::new(ContextEntry {
                    input_context,
                    value: diagnostics,
                });
                self.cache.final_evaluation = Some(Arc::clone(&entry));
                entry
            }
        };
        self.reached.final_evaluation = true;

        self.offer_fixes(&entry.value, Step::DataExtract(context))
    }

    fn data_extract_stage(&mut self, context: P) -> Step<P> {
        let schema = self.schema;
        let Some(extractor) = &schema.data_extractor else {
            return Step::End;
        };
        if !self.options.extract_data {
            return Step::End;
        }
        let prevented =
            collect_diagnostics(
                self.rule,
                &self.cache,
                &self.reached,
                self.cursor.as_ref(),
                &self.project,
            )
                .iter()
                .any(|diagnostic| diagnostic.prevents_extraction);
        if prevented {
            log::debug!("{}: data extraction prevented", self.rule.name());
            return Step::End;
        }

        let input_context = self.fingerprint(&context);
        let value = match &self.cache.extract {
            Some(entry) if entry.input_context == input_context => entry.value.clone(),
            _ => {
                let value = extractor(&context);
                self.cache.extract = Some(Arc::new(ContextEntry {
                    input_context,
                    value: value.clone(),
                }));
                value
            }
        };
        self.extract = Some(value);
        Step::End
    }

    /// Backfill rule identity and targets, then drop unusable fixes
    fn finish(&self, diagnostics: &mut [Diagnostic], current: &Target) {
        let manifest_path = self
            .project
            .manifest()
            .map_or(DEFAULT_MANIFEST_PATH, |file| file.path.as_str());
        let readme_path = self
            .project
            .readme()
            .map_or(DEFAULT_README_PATH, |readme| readme.path.as_str());
        for diagnostic in diagnostics.iter_mut() {
            diagnostic.backfill(
                self.rule.name(),
                self.rule.id(),
                current,
                manifest_path,
                readme_path,
            );
        }
        validate_fixes(diagnostics, &self.project);
    }

    /// Offer a stage's diagnostics for fixing and pick the next step
    fn offer_fixes(&mut self, diagnostics: &[Diagnostic], next: Step<P>) -> Step<P> {
        match apply_first_fix(
            diagnostics,
            &mut self.project,
            self.options,
            self.fixed,
            self.rule.exceptions(),
        ) {
            FixOutcome::NoFix => next,
            FixOutcome::Aborted(error) => Step::Abort(error),
            FixOutcome::Applied(target) => {
                self.lookup_tables.clear();
                self.after_fix(target)
            }
        }
    }

    fn after_fix(&mut self, target: Target) -> Step<P> {
        let Target::Module { path } = target else {
            self.cursor = None;
            self.reached = Reached::default();
            return Step::Manifest;
        };
        if self.cursor.is_none() {
            self.reached = Reached::default();
            return Step::Manifest;
        }
        self.reached.final_evaluation = false;

        let graph = ModuleGraph::from_project(&self.project);
        let order = match graph.topological_order() {
            Ok(order) => order,
            Err(cycle) => {
                return Step::Abort(ReviewError::ImportCycle {
                    modules: cycle.modules,
                })
            }
        };
        let mut unvisit = vec![path.clone()];
        if self.schema.traversal == TraversalMode::ImportedModulesFirst {
            unvisit.extend(graph.transitive_importers(&path));
        }
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.reposition(order, unvisit);
        }
        self.graph = graph;
        Step::Modules
    }
}

/// Project-file stages, in run order
#[derive(Debug, Clone, Copy)]
enum FileStage {
    Manifest,
    Readme,
    ExtraFiles,
    Dependencies,
}

impl FileStage {
    fn slot<P>(self, cache: &mut RuleCache<P>) -> &mut Option<Arc<FileEntry<P>>> {
        match self {
            FileStage::Manifest => &mut cache.manifest,
            FileStage::Readme => &mut cache.readme,
            FileStage::ExtraFiles => &mut cache.extra_files,
            FileStage::Dependencies => &mut cache.dependencies,
        }
    }
}

/// Stages whose cache entries were produced or confirmed against the
/// current project during this run
///
/// Only reached entries are reported. After an abort, entries inherited from
/// an earlier run may still sit in the cache for later stages.
#[derive(Debug, Clone, Copy, Default)]
struct Reached {
    files: [bool; 4],
    final_evaluation: bool,
}

/// Output context of a project-file stage, or `initial` before it ran
fn stage_output<P: Clone>(entry: &Option<Arc<FileEntry<P>>>, initial: &P) -> P {
    entry
        .as_ref()
        .map_or_else(|| initial.clone(), |entry| entry.output.clone())
}

/// Diagnostics of the run, in stage order, without the ignored ones
fn collect_diagnostics<P>(
    rule: &Rule,
    cache: &RuleCache<P>,
    reached: &Reached,
    cursor: Option<&GraphCursor>,
    project: &Project,
) -> Vec<Diagnostic> {
    let files = [
        &cache.manifest,
        &cache.readme,
        &cache.extra_files,
        &cache.dependencies,
    ]
    .into_iter()
    .zip(reached.files)
    .filter(|(_, seen)| *seen)
    .filter_map(|(entry, _)| entry.as_ref())
    .flat_map(|entry| entry.diagnostics.iter());
    let modules = cursor
        .into_iter()
        .flat_map(|cursor| {
            cursor
                .order()
                .iter()
                .filter(move |path| cursor.is_visited(path) && project.module(path).is_some())
        })
        .filter_map(|path| cache.modules.get(path))
        .flat_map(|entry| entry.diagnostics.iter());
    let final_evaluation = cache
        .final_evaluation
        .iter()
        .filter(|_| reached.final_evaluation)
        .flat_map(|entry| entry.value.iter());

    files
        .chain(modules)
        .chain(final_evaluation)
        .filter(|diagnostic| !rule.exceptions().is_ignored(&diagnostic.target))
        .map(|diagnostic| {
            let mut diagnostic = diagnostic.clone();
            diagnostic.rule_id = rule.id();
            diagnostic
        })
        .collect()
}
