//! Project snapshot handed to rules
//!
//! A [`Project`] is an immutable-by-convention value: the manifest, readme,
//! extra files, dependency metadata and parsed modules. Cloning is cheap since
//! modules are shared. The engine never reads the file system; hosts add
//! files as in-memory text and the configured [`SourceParser`] turns them
//! into syntax trees.

use crate::ast::{module_name_to_string, Module};
use crate::diagnostic::{Diagnostic, Target};
use crate::graph::ModuleGraph;
use crate::hash::ContentHash;
use crate::lookup::{ModuleNameLookupTable, NameResolver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Error while parsing a project file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("invalid manifest: {0}")]
    Manifest(String),

    #[error("invalid source: {0}")]
    Invalid(String),
}

/// Turns source text into syntax trees
///
/// Supplied by the host; the engine calls it when files are added and again
/// after applying a fix.
pub trait SourceParser {
    /// Parse a source module
    fn parse_module(&self, path: &str, source: &str) -> Result<Module, ParseError>;

    /// Parse the project manifest
    fn parse_manifest(&self, raw: &str) -> Result<Manifest, ParseError> {
        serde_json::from_str(raw).map_err(|e| ParseError::Manifest(e.to_string()))
    }
}

/// Parser for hosts that produce syntax trees out of process and hand them
/// over as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAstParser;

impl SourceParser for JsonAstParser {
    fn parse_module(&self, _path: &str, source: &str) -> Result<Module, ParseError> {
        serde_json::from_str(source).map_err(|e| ParseError::Syntax {
            line: e.line() as u32,
            message: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    Application,
    Package,
}

/// Parsed project manifest (`elm.json`-like)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    #[serde(rename = "type")]
    pub kind: ProjectKind,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub source_directories: Vec<String>,

    /// A list of module names, or an object of categorized lists
    #[serde(default)]
    pub exposed_modules: serde_json::Value,

    #[serde(default)]
    pub dependencies: serde_json::Value,
}

impl Manifest {
    /// Directories holding the project's own modules
    pub fn source_directories(&self) -> Vec<String> {
        match self.kind {
            ProjectKind::Application if !self.source_directories.is_empty() => self
                .source_directories
                .iter()
                .map(|dir| normalize_path(dir))
                .collect(),
            _ => vec!["src".to_string()],
        }
    }

    /// Names of the modules a package exposes
    pub fn exposed_module_names(&self) -> BTreeSet<String> {
        fn strings(value: &serde_json::Value) -> impl Iterator<Item = String> + '_ {
            value
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|item| item.as_str().map(String::from))
        }

        match &self.exposed_modules {
            serde_json::Value::Array(_) => strings(&self.exposed_modules).collect(),
            serde_json::Value::Object(categories) => {
                categories.values().flat_map(strings).collect()
            }
            _ => BTreeSet::new(),
        }
    }

    /// Names of the packages listed as direct dependencies
    pub fn direct_dependency_names(&self) -> BTreeSet<String> {
        let direct = match self.kind {
            ProjectKind::Application => self.dependencies.get("direct"),
            ProjectKind::Package => Some(&self.dependencies),
        };
        direct
            .and_then(|deps| deps.as_object())
            .map(|deps| deps.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// The manifest together with its raw text
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestFile {
    pub path: String,
    pub raw: String,
    pub manifest: Manifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readme {
    pub path: String,
    pub content: String,
}

/// Documentation of a module of a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyModule {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Metadata of a package the project depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub modules: Vec<DependencyModule>,
}

/// A parsed source module of the project
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectModule {
    pub path: String,
    pub source: String,
    pub ast: Module,
    pub content_hash: ContentHash,
}

impl ProjectModule {
    pub fn name(&self) -> &[String] {
        self.ast.name()
    }
}

/// A file that failed its initial parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub target: Target,
    pub source: String,
    pub error: ParseError,
}

/// Everything rules get to look at
#[derive(Clone)]
pub struct Project {
    parser: Arc<dyn SourceParser>,
    resolver: Option<Arc<dyn NameResolver>>,
    manifest: Option<Arc<ManifestFile>>,
    readme: Option<Arc<Readme>>,
    extra_files: Arc<BTreeMap<String, String>>,
    dependencies: Arc<BTreeMap<String, Dependency>>,
    modules: BTreeMap<String, Arc<ProjectModule>>,
    parse_failures: BTreeMap<String, ParseFailure>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("manifest", &self.manifest.as_ref().map(|m| &m.path))
            .field("readme", &self.readme.as_ref().map(|r| &r.path))
            .field("extra_files", &self.extra_files.keys().collect::<Vec<_>>())
            .field("dependencies", &self.dependencies.keys().collect::<Vec<_>>())
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("parse_failures", &self.parse_failures.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Project {
    /// Create an empty project parsed with `parser`
    pub fn new(parser: impl SourceParser + 'static) -> Self {
        Self {
            parser: Arc::new(parser),
            resolver: None,
            manifest: None,
            readme: None,
            extra_files: Arc::new(BTreeMap::new()),
            dependencies: Arc::new(BTreeMap::new()),
            modules: BTreeMap::new(),
            parse_failures: BTreeMap::new(),
        }
    }

    /// Use `resolver` to compute module name lookup tables
    pub fn with_name_resolver(mut self, resolver: impl NameResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Add or replace the manifest
    pub fn add_manifest(&mut self, path: &str, raw: &str) {
        let path = normalize_path(path);
        if let Some(previous) = self.manifest.take() {
            self.parse_failures.remove(&previous.path);
        }
        match self.parser.parse_manifest(raw) {
            Ok(manifest) => {
                self.parse_failures.remove(&path);
                self.manifest = Some(Arc::new(ManifestFile {
                    path,
                    raw: raw.to_string(),
                    manifest,
                }));
            }
            Err(error) => {
                self.parse_failures.insert(
                    path.clone(),
                    ParseFailure {
                        target: Target::Manifest { path },
                        source: raw.to_string(),
                        error,
                    },
                );
            }
        }
    }

    pub fn manifest(&self) -> Option<&ManifestFile> {
        self.manifest.as_deref()
    }

    /// Add or replace the readme
    pub fn add_readme(&mut self, path: &str, content: &str) {
        self.readme = Some(Arc::new(Readme {
            path: normalize_path(path),
            content: content.to_string(),
        }));
    }

    pub fn readme(&self) -> Option<&Readme> {
        self.readme.as_deref()
    }

    /// Add or replace a non-source text file
    pub fn add_extra_file(&mut self, path: &str, content: &str) {
        Arc::make_mut(&mut self.extra_files).insert(normalize_path(path), content.to_string());
    }

    pub fn remove_extra_file(&mut self, path: &str) {
        Arc::make_mut(&mut self.extra_files).remove(&normalize_path(path));
    }

    pub fn extra_files(&self) -> &BTreeMap<String, String> {
        &self.extra_files
    }

    /// Add or replace the metadata of a dependency
    pub fn add_dependency(&mut self, dependency: Dependency) {
        Arc::make_mut(&mut self.dependencies).insert(dependency.name.clone(), dependency);
    }

    pub fn remove_dependency(&mut self, name: &str) {
        Arc::make_mut(&mut self.dependencies).remove(name);
    }

    pub fn dependencies(&self) -> &BTreeMap<String, Dependency> {
        &self.dependencies
    }

    /// Dependencies the manifest lists as direct
    pub fn direct_dependencies(&self) -> BTreeMap<String, Dependency> {
        let Some(manifest) = self.manifest() else {
            return BTreeMap::new();
        };
        let direct = manifest.manifest.direct_dependency_names();
        self.dependencies
            .iter()
            .filter(|(name, _)| direct.contains(*name))
            .map(|(name, dependency)| (name.clone(), dependency.clone()))
            .collect()
    }

    /// Add or replace a source module, parsing it
    ///
    /// A module that fails to parse is recorded as a parse failure and
    /// blocks the review of the whole project until it is fixed.
    pub fn add_module(&mut self, path: &str, source: &str) {
        let path = normalize_path(path);
        match self.parser.parse_module(&path, source) {
            Ok(ast) => {
                self.parse_failures.remove(&path);
                self.insert_module(path, source, ast);
            }
            Err(error) => {
                self.modules.remove(&path);
                self.parse_failures.insert(
                    path.clone(),
                    ParseFailure {
                        target: Target::Module { path },
                        source: source.to_string(),
                        error,
                    },
                );
            }
        }
    }

    pub fn remove_module(&mut self, path: &str) {
        let path = normalize_path(path);
        self.modules.remove(&path);
        self.parse_failures.remove(&path);
    }

    pub fn module(&self, path: &str) -> Option<&Arc<ProjectModule>> {
        self.modules.get(path)
    }

    /// Modules by path, in path order
    pub fn modules(&self) -> impl Iterator<Item = &Arc<ProjectModule>> {
        self.modules.values()
    }

    /// Find the path of a module by its name
    pub fn module_path_by_name(&self, name: &[String]) -> Option<&str> {
        self.modules
            .values()
            .find(|module| module.name() == name)
            .map(|module| module.path.as_str())
    }

    pub fn parse_failures(&self) -> impl Iterator<Item = &ParseFailure> {
        self.parse_failures.values()
    }

    /// Source directories declared by the manifest (`src` by default)
    pub fn source_directories(&self) -> Vec<String> {
        self.manifest()
            .map(|file| file.manifest.source_directories())
            .unwrap_or_else(|| vec!["src".to_string()])
    }

    /// Whether a module lives in one of the source directories (as opposed
    /// to tests or other folders)
    pub fn is_in_source_directories(&self, path: &str) -> bool {
        self.source_directories()
            .iter()
            .any(|dir| path.starts_with(&format!("{}/", dir.trim_end_matches('/'))))
    }

    /// Lookup table for a module; empty when no resolver is configured
    pub fn lookup_table(&self, module: &ProjectModule) -> ModuleNameLookupTable {
        match &self.resolver {
            Some(resolver) => resolver.resolve(module, self),
            None => ModuleNameLookupTable::new(),
        }
    }

    /// Current text of the file a target points at
    pub fn file_source(&self, target: &Target) -> Option<&str> {
        match target {
            Target::Module { path } => self.modules.get(path).map(|m| m.source.as_str()),
            Target::Manifest { path } => self
                .manifest()
                .filter(|file| &file.path == path)
                .map(|file| file.raw.as_str()),
            Target::Readme { path } => self
                .readme()
                .filter(|readme| &readme.path == path)
                .map(|readme| readme.content.as_str()),
            Target::ExtraFile { path } => self.extra_files.get(path).map(String::as_str),
            Target::Global | Target::Configuration => None,
        }
    }

    /// Replace the text of a file after a fix, reparsing it
    ///
    /// Leaves the project untouched when the new text does not parse.
    pub(crate) fn replace_file_source(
        &mut self,
        target: &Target,
        source: String,
    ) -> Result<(), ParseError> {
        match target {
            Target::Module { path } => {
                let ast = self.parser.parse_module(path, &source)?;
                self.insert_module(path.clone(), &source, ast);
            }
            Target::Manifest { path } => {
                let manifest = self.parser.parse_manifest(&source)?;
                self.manifest = Some(Arc::new(ManifestFile {
                    path: path.clone(),
                    raw: source,
                    manifest,
                }));
            }
            Target::Readme { path } => {
                self.readme = Some(Arc::new(Readme {
                    path: path.clone(),
                    content: source,
                }));
            }
            Target::ExtraFile { path } => {
                Arc::make_mut(&mut self.extra_files).insert(path.clone(), source);
            }
            Target::Global | Target::Configuration => {
                return Err(ParseError::Invalid(format!(
                    "{} is not a file that can be fixed",
                    target
                )));
            }
        }
        Ok(())
    }

    /// Diagnostics that prevent reviewing the project at all
    ///
    /// Files that failed to parse are reported one by one; otherwise an
    /// import cycle between modules is reported once.
    pub fn blocking_diagnostics(&self) -> Vec<Diagnostic> {
        if !self.parse_failures.is_empty() {
            return self
                .parse_failures
                .values()
                .map(|failure| {
                    let mut diagnostic = Diagnostic::global(
                        "Could not parse this file",
                        [
                            format!("The parser failed with: {}", failure.error),
                            "This file needs to be fixed before the rest of the project can be \
                             reviewed, otherwise reported problems could be wrong."
                                .to_string(),
                        ],
                    );
                    diagnostic.rule_name = "ParsingError".to_string();
                    diagnostic.target = failure.target.clone();
                    diagnostic
                })
                .collect();
        }

        match ModuleGraph::from_project(self).topological_order() {
            Ok(_) => Vec::new(),
            Err(cycle) => {
                let mut diagnostic = Diagnostic::global(
                    "Your module imports form a cycle",
                    [
                        format!("The cycle goes through: {}", cycle.describe()),
                        "Modules cannot import each other in a loop. Break the cycle by \
                         moving the shared parts into a separate module."
                            .to_string(),
                    ],
                );
                diagnostic.rule_name = "ImportCycle".to_string();
                vec![diagnostic]
            }
        }
    }

    fn insert_module(&mut self, path: String, source: &str, ast: Module) {
        let module = ProjectModule {
            path: path.clone(),
            source: source.to_string(),
            ast,
            content_hash: ContentHash::of(source.as_bytes()),
        };
        self.modules.insert(path, Arc::new(module));
    }
}

/// Human-readable module name of a project module
pub(crate) fn display_name(module: &ProjectModule) -> String {
    module_name_to_string(module.name())
}

/// Normalize a project-relative path: forward slashes, no leading `./`
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").unwrap_or(&path).to_string()
}
