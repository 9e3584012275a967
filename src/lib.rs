//! Lintel - Incremental rule-based review engine
//!
//! Rules are built from visitors over a project: its manifest, readme,
//! extra files, dependencies and the syntax trees of its modules. Each rule
//! carries its own cache, so reviewing a project again only revisits what
//! changed. Fixes reported by rules can be applied automatically; the engine
//! reruns whatever a fix affects.
//!
//! # Architecture
//!
//! ```text
//! Host -> Reviewer -> Rule -> engine (stages + cache) -> visitors
//! ```
//!
//! The host owns file I/O and parsing: it fills a [`Project`] through a
//! [`SourceParser`] and hands it to [`Rule::review`] or [`Reviewer::review`].
//! Every review returns the rules holding their updated caches.
//!
//! # Writing a rule
//!
//! ```
//! use lintel::{Diagnostic, ModuleRuleSchema, Rule, VisitorSchema};
//!
//! let rule = Rule::from_module_schema(
//!     ModuleRuleSchema::new("NoDebugImport", ()).with_import_visitor(|import, _| {
//!         if import.value.module_name.value == ["Debug"] {
//!             vec![Diagnostic::new("Do not import Debug", ["Remove the import."], import.range)]
//!         } else {
//!             vec![]
//!         }
//!     }),
//! );
//! assert_eq!(rule.name(), "NoDebugImport");
//! ```

pub mod ast;
pub mod cache;
pub mod config;
pub mod context;
pub mod diagnostic;
pub mod driver;
mod engine;
pub mod error;
pub mod fix;
pub mod fixer;
pub mod graph;
pub mod hash;
pub mod lookup;
pub mod output;
pub mod project;
pub mod rule;
pub mod schema;
pub mod visitor;

// Re-export main types
pub use cache::CacheStats;
pub use config::{ConfigError, ReviewConfig};
pub use context::{ContextCreator, ModuleContextFunctions, ModuleInfo, RequestedData};
pub use diagnostic::{Diagnostic, Target};
pub use driver::{ReviewResult, Reviewer};
pub use error::ReviewError;
pub use fix::{apply_edits, Edit, FixProblem};
pub use fixer::{FixMode, FixedErrors, ReviewOptions};
pub use graph::{GraphCursor, ImportCycle, ModuleGraph};
pub use hash::{ContentHash, ContextHash};
pub use lookup::{ModuleNameLookupTable, NameResolver};
pub use output::{JsonFormatter, OutputFormatter, TextFormatter};
pub use project::{JsonAstParser, ParseError, Project, SourceParser};
pub use rule::{Exceptions, Rule, RulePriority, RuleReview};
pub use schema::{
    ModuleRuleSchema, ModuleVisitorSchema, ProjectRuleSchema, TraversalMode, VisitorSchema,
};
