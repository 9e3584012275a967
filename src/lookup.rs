//! Identifier-to-module resolution results
//!
//! Resolving which module a reference comes from is done by a host-supplied
//! [`NameResolver`]. The engine only asks for it when a rule requests the
//! lookup table, and hands the result to the rule's context creators.

use crate::ast::{ModuleName, Node, Range};
use crate::project::{Project, ProjectModule};
use std::collections::HashMap;

/// Maps the range of each reference in a module to its origin module
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleNameLookupTable {
    entries: HashMap<Range, ModuleName>,
}

impl ModuleNameLookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the origin module of the reference at `range`
    pub fn insert(&mut self, range: Range, module_name: ModuleName) {
        self.entries.insert(range, module_name);
    }

    /// Origin module of the reference at `range`
    pub fn module_name_for(&self, range: &Range) -> Option<&[String]> {
        self.entries.get(range).map(Vec::as_slice)
    }

    /// Origin module of the reference held by `node`
    pub fn module_name_at<T>(&self, node: &Node<T>) -> Option<&[String]> {
        self.module_name_for(&node.range)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Range, ModuleName)> for ModuleNameLookupTable {
    fn from_iter<I: IntoIterator<Item = (Range, ModuleName)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Computes lookup tables for modules of a project
pub trait NameResolver {
    fn resolve(&self, module: &ProjectModule, project: &Project) -> ModuleNameLookupTable;
}
