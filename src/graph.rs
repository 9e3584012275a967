//! Module import graph and traversal order
//!
//! Nodes are module paths, edges point from a module to the project modules
//! it imports. Imports of modules outside the project (dependencies) are not
//! part of the graph.

use crate::ast::module_name_to_string;
use crate::project::{display_name, Project};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A cycle found in the import graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCycle {
    /// Dotted names of the modules in the cycle, in import order
    pub modules: Vec<String>,
}

impl ImportCycle {
    /// `A -> B -> A`
    pub fn describe(&self) -> String {
        let mut names = self.modules.clone();
        if let Some(first) = self.modules.first() {
            names.push(first.clone());
        }
        names.join(" -> ")
    }
}

/// Adjacency-list import graph of a project
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    names: BTreeMap<String, String>,
    imports: BTreeMap<String, BTreeSet<String>>,
    importers: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleGraph {
    /// Build the graph of a project's modules
    pub fn from_project(project: &Project) -> Self {
        let by_name: BTreeMap<String, String> = project
            .modules()
            .map(|module| (display_name(module), module.path.clone()))
            .collect();

        let mut graph = Self::default();
        for module in project.modules() {
            graph.names.insert(module.path.clone(), display_name(module));
            graph.imports.entry(module.path.clone()).or_default();
            graph.importers.entry(module.path.clone()).or_default();
        }

        for module in project.modules() {
            for import in &module.ast.imports {
                let imported = module_name_to_string(&import.value.module_name.value);
                let Some(imported_path) = by_name.get(&imported) else {
                    continue;
                };
                if imported_path == &module.path {
                    continue;
                }
                graph
                    .imports
                    .entry(module.path.clone())
                    .or_default()
                    .insert(imported_path.clone());
                graph
                    .importers
                    .entry(imported_path.clone())
                    .or_default()
                    .insert(module.path.clone());
            }
        }
        graph
    }

    /// All module paths, in path order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.imports.keys().map(String::as_str)
    }

    /// Project modules imported by `path`
    pub fn imports_of(&self, path: &str) -> impl Iterator<Item = &str> {
        self.imports
            .get(path)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Project modules importing `path` directly
    pub fn importers_of(&self, path: &str) -> impl Iterator<Item = &str> {
        self.importers
            .get(path)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Every module that imports `path`, directly or not
    pub fn transitive_importers(&self, path: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut worklist: Vec<&str> = self.importers_of(path).collect();
        while let Some(next) = worklist.pop() {
            if found.insert(next.to_string()) {
                worklist.extend(self.importers_of(next));
            }
        }
        found.remove(path);
        found
    }

    /// Modules ordered so that every module comes after the modules it
    /// imports; ties are broken by path
    pub fn topological_order(&self) -> Result<Vec<String>, ImportCycle> {
        let mut pending: BTreeMap<&str, usize> = self
            .imports
            .iter()
            .map(|(path, imports)| (path.as_str(), imports.len()))
            .collect();
        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(path, _)| *path)
            .collect();

        let mut order = Vec::with_capacity(self.imports.len());
        while let Some(path) = ready.pop_first() {
            pending.remove(path);
            order.push(path.to_string());
            for importer in self.importers_of(path) {
                if let Some(count) = pending.get_mut(importer) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(importer);
                    }
                }
            }
        }

        if pending.is_empty() {
            return Ok(order);
        }
        let remaining: HashSet<&str> = pending.keys().copied().collect();
        Err(self.find_cycle(&remaining))
    }

    /// Walk imports among modules that could not be ordered until a module
    /// repeats; each of them still has an unordered import
    fn find_cycle(&self, remaining: &HashSet<&str>) -> ImportCycle {
        let mut start = remaining.iter().copied().min();
        let mut path: Vec<&str> = Vec::new();

        while let Some(current) = start {
            if let Some(index) = path.iter().position(|seen| *seen == current) {
                let modules = path[index..]
                    .iter()
                    .map(|path| self.names.get(*path).cloned().unwrap_or_else(|| path.to_string()))
                    .collect();
                return ImportCycle { modules };
            }
            path.push(current);
            start = self.imports_of(current).find(|next| remaining.contains(next));
        }

        ImportCycle {
            modules: path.iter().map(|path| path.to_string()).collect(),
        }
    }
}

/// Resumable position in a traversal order
///
/// Holds the order, the set of visited modules and the index of the first
/// module not visited yet. Resuming after a fix re-points the cursor.
#[derive(Debug, Clone, Default)]
pub struct GraphCursor {
    order: Vec<String>,
    position: usize,
    visited: HashSet<String>,
}

impl GraphCursor {
    /// Create a cursor at the start of `order`
    pub fn new(order: Vec<String>) -> Self {
        Self {
            order,
            position: 0,
            visited: HashSet::new(),
        }
    }

    /// First module not visited yet
    pub fn current(&mut self) -> Option<&str> {
        while let Some(path) = self.order.get(self.position) {
            if !self.visited.contains(path) {
                break;
            }
            self.position += 1;
        }
        self.order.get(self.position).map(String::as_str)
    }

    pub fn mark_visited(&mut self, path: &str) {
        self.visited.insert(path.to_string());
    }

    pub fn is_visited(&self, path: &str) -> bool {
        self.visited.contains(path)
    }

    /// Full traversal order
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Switch to a recomputed order and mark `unvisit` as not visited
    ///
    /// Modules that are no longer part of the order are forgotten. The cursor
    /// restarts its scan so that it lands on the earliest unvisited module.
    pub fn reposition<I>(&mut self, order: Vec<String>, unvisit: I)
    where
        I: IntoIterator<Item = String>,
    {
        for path in unvisit {
            self.visited.remove(&path);
        }
        let known: HashSet<&String> = order.iter().collect();
        self.visited.retain(|path| known.contains(path));
        self.order = order;
        self.position = 0;
    }
}
