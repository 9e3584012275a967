//! Shared helpers for integration tests: a line-based toy module syntax,
//! a name resolver for it, and sample rules.
//!
//! The syntax has one construct per line:
//!
//! ```text
//! module A exposing (x, y)
//! import B exposing (..)
//! -- a comment
//! x = f 1 + B.y
//! ```

#![allow(dead_code)]

use lintel::ast::{
    Declaration, Exposing, Expression, Function, Import, InfixDirection, Location, Module,
    ModuleHeader, ModuleName, Node, Range, TopLevelExpose,
};
use lintel::{
    ContextCreator, Diagnostic, Edit, ModuleContextFunctions, ModuleNameLookupTable,
    ModuleRuleSchema, NameResolver, ParseError, Project, ProjectRuleSchema, Rule, SourceParser,
    TraversalMode, VisitorSchema,
};
use lintel::project::ProjectModule;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

pub const MANIFEST: &str = r#"{
    "type": "application",
    "source-directories": ["src"],
    "dependencies": { "direct": {}, "indirect": {} }
}"#;

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a project out of `(path, source)` pairs
pub fn project(modules: &[(&str, &str)]) -> Project {
    let mut project = Project::new(LineParser).with_name_resolver(ImportResolver);
    project.add_manifest("elm.json", MANIFEST);
    for (path, source) in modules {
        project.add_module(path, source);
    }
    project
}

/// Parser for the line-based test syntax
pub struct LineParser;

impl SourceParser for LineParser {
    fn parse_module(&self, _path: &str, source: &str) -> Result<Module, ParseError> {
        parse(source)
    }
}

type Token<'a> = (&'a str, usize, usize);

fn syntax(row: usize, message: &str) -> ParseError {
    ParseError::Syntax {
        line: row as u32,
        message: message.to_string(),
    }
}

/// Range on one line, from 0-based byte offsets
fn span(row: usize, start: usize, end: usize) -> Range {
    Range::from_coords(
        (row as u32, start as u32 + 1),
        (row as u32, end as u32 + 1),
    )
}

/// Split a line into words and `(`, `)`, `,` punctuation
fn tokens(line: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut word_start = None;
    for (index, c) in line.char_indices() {
        let punctuation = matches!(c, '(' | ')' | ',');
        if c.is_whitespace() || punctuation {
            if let Some(start) = word_start.take() {
                tokens.push((&line[start..index], start, index));
            }
            if punctuation {
                tokens.push((&line[index..index + 1], index, index + 1));
            }
        } else if word_start.is_none() {
            word_start = Some(index);
        }
    }
    if let Some(start) = word_start {
        tokens.push((&line[start..], start, line.len()));
    }
    tokens
}

pub fn parse(source: &str) -> Result<Module, ParseError> {
    let mut lines = source.lines().enumerate().map(|(index, line)| (index + 1, line));
    let (row, first) = lines.next().ok_or_else(|| syntax(1, "empty module"))?;
    let header = parse_header(row, first)?;

    let mut module = Module {
        header,
        documentation: None,
        comments: Vec::new(),
        imports: Vec::new(),
        declarations: Vec::new(),
    };
    for (row, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("--") {
            module
                .comments
                .push(Node::new(span(row, 0, line.len()), line.to_string()));
        } else if line.starts_with("import ") {
            module.imports.push(parse_import(row, line)?);
        } else {
            module.declarations.push(parse_declaration(row, line)?);
        }
    }
    Ok(module)
}

fn module_name(row: usize, token: Token<'_>) -> Node<ModuleName> {
    let (text, start, end) = token;
    Node::new(
        span(row, start, end),
        text.split('.').map(String::from).collect(),
    )
}

fn parse_header(row: usize, line: &str) -> Result<Node<ModuleHeader>, ParseError> {
    let tokens = tokens(line);
    match tokens.as_slice() {
        [("module", ..), name, ("exposing", ..), rest @ ..] => {
            let exposing = parse_exposing(row, rest)?;
            Ok(Node::new(
                span(row, 0, line.len()),
                ModuleHeader {
                    kind: Default::default(),
                    name: module_name(row, *name),
                    exposing,
                },
            ))
        }
        _ => Err(syntax(row, "expected `module <Name> exposing (..)`")),
    }
}

fn parse_exposing(row: usize, tokens: &[Token<'_>]) -> Result<Node<Exposing>, ParseError> {
    let [("(", open, _), inner @ .., (")", _, close)] = tokens else {
        return Err(syntax(row, "expected a parenthesized exposing list"));
    };
    let range = span(row, *open, *close);

    if let [("..", start, end)] = inner {
        return Ok(Node::new(range, Exposing::All(span(row, *start, *end))));
    }

    let mut items = Vec::new();
    for item in inner.split(|(text, ..)| *text == ",") {
        let [(name, start, end)] = item else {
            return Err(syntax(row, "expected a single name per exposed item"));
        };
        let expose = if name.starts_with(char::is_uppercase) {
            TopLevelExpose::TypeOrAlias(name.to_string())
        } else {
            TopLevelExpose::Function(name.to_string())
        };
        items.push(Node::new(span(row, *start, *end), expose));
    }
    Ok(Node::new(range, Exposing::Explicit(items)))
}

fn parse_import(row: usize, line: &str) -> Result<Node<Import>, ParseError> {
    let tokens = tokens(line);
    let (name, exposing) = match tokens.as_slice() {
        [("import", ..), name] => (*name, None),
        [("import", ..), name, ("exposing", ..), rest @ ..] => {
            (*name, Some(parse_exposing(row, rest)?))
        }
        _ => return Err(syntax(row, "expected `import <Name>`")),
    };
    Ok(Node::new(
        span(row, 0, line.len()),
        Import {
            module_name: module_name(row, name),
            alias: None,
            exposing,
        },
    ))
}

fn parse_declaration(row: usize, line: &str) -> Result<Node<Declaration>, ParseError> {
    let tokens = tokens(line);
    let [(name, name_start, name_end), ("=", ..), body @ ..] = tokens.as_slice() else {
        return Err(syntax(row, "expected `<name> = <expression>`"));
    };
    if !name.starts_with(char::is_lowercase) {
        return Err(syntax(row, "declaration names start with a lowercase letter"));
    }
    let expression = parse_expression(row, body)?;
    Ok(Node::new(
        span(row, 0, line.len()),
        Declaration::Function(Function {
            documentation: None,
            signature: None,
            name: Node::new(span(row, *name_start, *name_end), name.to_string()),
            arguments: Vec::new(),
            expression,
        }),
    ))
}

/// Terms joined by left-associative `+`; a term is one or more atoms
fn parse_expression(row: usize, tokens: &[Token<'_>]) -> Result<Node<Expression>, ParseError> {
    let mut terms = tokens
        .split(|(text, ..)| *text == "+")
        .map(|term| parse_term(row, term));
    let first = terms
        .next()
        .ok_or_else(|| syntax(row, "expected an expression"))??;

    terms.try_fold(first, |left, right| -> Result<Node<Expression>, ParseError> {
        let right = right?;
        let range = left.range.combine(&right.range);
        Ok(Node::new(
            range,
            Expression::OperatorApplication {
                operator: "+".to_string(),
                direction: InfixDirection::Left,
                left: Box::new(left),
                right: Box::new(right),
            },
        ))
    })
}

fn parse_term(row: usize, tokens: &[Token<'_>]) -> Result<Node<Expression>, ParseError> {
    let mut atoms = tokens
        .iter()
        .map(|token| parse_atom(row, *token))
        .collect::<Result<Vec<_>, _>>()?;
    match atoms.len() {
        0 => Err(syntax(row, "expected an expression")),
        1 => Ok(atoms.remove(0)),
        count => {
            let range = atoms[0].range.combine(&atoms[count - 1].range);
            Ok(Node::new(range, Expression::Application(atoms)))
        }
    }
}

fn parse_atom(row: usize, (text, start, end): Token<'_>) -> Result<Node<Expression>, ParseError> {
    let range = span(row, start, end);
    if let Ok(value) = text.parse::<i64>() {
        return Ok(Node::new(range, Expression::Integer(value)));
    }
    if !text.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '_') {
        return Err(syntax(row, &format!("unexpected `{}`", text)));
    }
    let mut segments: Vec<String> = text.split('.').map(String::from).collect();
    let name = segments.pop().unwrap_or_default();
    Ok(Node::new(
        range,
        Expression::FunctionOrValue {
            module_name: segments,
            name,
        },
    ))
}

/// References of an expression tree: `(range, qualifier, name)`
fn references(expression: &Node<Expression>, found: &mut Vec<(Range, ModuleName, String)>) {
    if let Expression::FunctionOrValue { module_name, name } = &expression.value {
        found.push((expression.range, module_name.clone(), name.clone()));
    }
    for child in expression.value.children() {
        references(child, found);
    }
}

/// Resolves references through qualifiers, own declarations and exposing
/// imports
pub struct ImportResolver;

impl NameResolver for ImportResolver {
    fn resolve(&self, module: &ProjectModule, _project: &Project) -> ModuleNameLookupTable {
        let ast = &module.ast;
        let declared: BTreeSet<&str> = ast
            .declarations
            .iter()
            .filter_map(|declaration| declaration.value.name())
            .collect();

        let mut found = Vec::new();
        for declaration in &ast.declarations {
            if let Declaration::Function(function) = &declaration.value {
                references(&function.expression, &mut found);
            }
        }

        found
            .into_iter()
            .filter_map(|(range, qualifier, name)| {
                if !qualifier.is_empty() {
                    return Some((range, qualifier));
                }
                if declared.contains(name.as_str()) {
                    return Some((range, ast.name().to_vec()));
                }
                ast.imports
                    .iter()
                    .find(|import| {
                        import
                            .value
                            .exposing
                            .as_ref()
                            .is_some_and(|exposing| exposing.value.exposes(&name))
                    })
                    .map(|import| (range, import.value.module_name.value.clone()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// NoUnused.Exports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExposedItem {
    pub name: String,
    pub range: Range,
    /// Range to delete to stop exposing the item, when it is not the only one
    pub removal: Option<Range>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExposedModule {
    pub path: String,
    pub items: Vec<ExposedItem>,
}

/// Project context: what each module exposes and what other modules use
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExportsContext {
    pub modules: BTreeMap<String, ExposedModule>,
    pub used: BTreeSet<(String, String)>,
}

pub fn fold_exports(new: ExportsContext, mut accumulated: ExportsContext) -> ExportsContext {
    accumulated.modules.extend(new.modules);
    accumulated.used.extend(new.used);
    accumulated
}

#[derive(Debug, Clone)]
struct ExportsModuleContext {
    path: String,
    name: ModuleName,
    lookup_table: ModuleNameLookupTable,
    exposed: Vec<ExposedItem>,
    used: BTreeSet<(String, String)>,
}

fn removal_range(items: &[Node<TopLevelExpose>], index: usize) -> Option<Range> {
    if items.len() < 2 {
        return None;
    }
    match items.get(index + 1) {
        Some(next) => Some(Range::new(items[index].range.start, next.range.start)),
        None => Some(Range::new(items[index - 1].range.end, items[index].range.end)),
    }
}

/// Reports exposed values that no other module references
pub fn no_unused_exports(traversal: TraversalMode) -> Rule {
    let functions = ModuleContextFunctions::new(
        ContextCreator::new(|info, _: &ExportsContext| ExportsModuleContext {
            path: info.path().to_string(),
            name: info.module_name().to_vec(),
            lookup_table: info.lookup_table().cloned().unwrap_or_default(),
            exposed: Vec::new(),
            used: BTreeSet::new(),
        })
        .with_module_name_lookup_table(),
        ContextCreator::new(|_, context: &ExportsModuleContext| ExportsContext {
            modules: BTreeMap::from([(
                context.name.join("."),
                ExposedModule {
                    path: context.path.clone(),
                    items: context.exposed.clone(),
                },
            )]),
            used: context.used.clone(),
        }),
        fold_exports,
    );

    let schema =
        ProjectRuleSchema::<ExportsContext, ExportsModuleContext>::new(
            "NoUnused.Exports",
            ExportsContext::default(),
        )
            .with_module_visitor(|schema| {
                schema
                    .with_module_definition_visitor(|header, context| {
                        if let Exposing::Explicit(items) = &header.value.exposing.value {
                            context.exposed = items
                                .iter()
                                .enumerate()
                                .map(|(index, item)| ExposedItem {
                                    name: item.value.name().to_string(),
                                    range: item.range,
                                    removal: removal_range(items, index),
                                })
                                .collect();
                        }
                        vec![]
                    })
                    .with_expression_enter_visitor(|expression, context| {
                        if let Expression::FunctionOrValue { name, .. } = &expression.value {
                            if let Some(origin) = context.lookup_table.module_name_at(expression) {
                                if origin != context.name.as_slice() {
                                    context.used.insert((origin.join("."), name.clone()));
                                }
                            }
                        }
                        vec![]
                    })
            })
            .with_module_context(functions)
            .with_final_project_evaluation(|context| {
                let mut diagnostics = Vec::new();
                for (module_name, module) in &context.modules {
                    for item in &module.items {
                        if context.used.contains(&(module_name.clone(), item.name.clone())) {
                            continue;
                        }
                        let diagnostic = Diagnostic::for_module(
                            &module.path,
                            &format!(
                                "Exposed function or value `{}` is never used outside this module",
                                item.name
                            ),
                            ["This exposed element is never used. You may want to remove it \
                              to keep your project clean."],
                            item.range,
                        );
                        diagnostics.push(match item.removal {
                            Some(removal) => diagnostic.with_fixes(vec![Edit::remove_range(removal)]),
                            None => diagnostic,
                        });
                    }
                }
                diagnostics
            })
            .providing_fixes();

    let schema = match traversal {
        TraversalMode::ImportedModulesFirst => schema.with_context_from_imported_modules(),
        TraversalMode::AllModulesInParallel => schema,
    };
    Rule::from_project_schema(schema)
}

// ---------------------------------------------------------------------------
// Visit recorder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecorderContext {
    path: String,
    module: String,
    names: BTreeSet<String>,
}

/// Records the path of every module it visits into `visits`
///
/// Each module's result carries the declarations of the modules it was
/// seeded with, so in imported-first mode a change flows to importers.
pub fn visit_recorder(
    name: &str,
    traversal: TraversalMode,
    visits: Rc<RefCell<Vec<String>>>,
) -> Rule {
    let schema =
        ProjectRuleSchema::<BTreeSet<String>, RecorderContext>::new(name, BTreeSet::new())
            .with_module_visitor(move |schema| {
                schema
                    .with_module_definition_visitor(move |_, context| {
                        visits.borrow_mut().push(context.path.clone());
                        vec![]
                    })
                    .with_declaration_enter_visitor(|declaration, context| {
                        if let Some(name) = declaration.value.name() {
                            context.names.insert(format!("{}.{}", context.module, name));
                        }
                        vec![]
                    })
            })
            .with_module_context(ModuleContextFunctions::new(
                ContextCreator::new(|info, seen: &BTreeSet<String>| RecorderContext {
                    path: info.path().to_string(),
                    module: info.module_name().join("."),
                    names: seen.clone(),
                }),
                ContextCreator::new(|_, context: &RecorderContext| context.names.clone()),
                |new: BTreeSet<String>, mut accumulated: BTreeSet<String>| {
                    accumulated.extend(new);
                    accumulated
                },
            ))
            .with_data_extractor(|names| serde_json::json!(names));

    let schema = match traversal {
        TraversalMode::ImportedModulesFirst => schema.with_context_from_imported_modules(),
        TraversalMode::AllModulesInParallel => schema,
    };
    Rule::from_project_schema(schema)
}

// ---------------------------------------------------------------------------
// Misbehaving fixes
// ---------------------------------------------------------------------------

/// Reports the same fixable problem no matter what the module contains
pub fn always_fixing(name: &str) -> Rule {
    Rule::from_module_schema(
        ModuleRuleSchema::new(name, ())
            .with_module_definition_visitor(|header, _| {
                vec![Diagnostic::new(
                    "Module needs a marker",
                    ["Add a marker comment below the module line."],
                    header.value.name.range,
                )
                .with_fixes(vec![Edit::insert_at(Location::new(2, 1), "-- marker\n")])]
            })
            .providing_fixes(),
    )
}

/// Proposes a fix that breaks the module line
pub fn breaking_fix(name: &str) -> Rule {
    Rule::from_module_schema(
        ModuleRuleSchema::new(name, ())
            .with_module_definition_visitor(|header, _| {
                vec![Diagnostic::new(
                    "Shorten the keyword",
                    ["Nobody needs the last letter."],
                    header.range,
                )
                .with_fixes(vec![Edit::remove_range(Range::from_coords((1, 6), (1, 7)))])]
            })
            .providing_fixes(),
    )
}

/// Adds `import B` to module `A` once it has been visited
pub fn import_adder(name: &str) -> Rule {
    Rule::from_module_schema(
        ModuleRuleSchema::new(name, (false, false))
            .with_module_definition_visitor(|header, (is_a, _)| {
                *is_a = header.value.name.value == ["A"];
                vec![]
            })
            .with_import_visitor(|import, (_, imports_b)| {
                *imports_b |= import.value.module_name.value == ["B"];
                vec![]
            })
            .with_final_module_evaluation(|(is_a, imports_b)| {
                if !is_a || *imports_b {
                    return vec![];
                }
                vec![Diagnostic::new(
                    "Module A should import B",
                    ["Add the import below the module line."],
                    Range::empty(),
                )
                .with_fixes(vec![Edit::insert_at(Location::new(2, 1), "import B\n")])]
            })
            .providing_fixes(),
    )
}

/// Reports the names of all modules from the final evaluation, and a
/// fixable problem that never goes away in any module named `Loop`
pub fn module_lister(name: &str) -> Rule {
    let schema = ProjectRuleSchema::<BTreeSet<String>, String>::new(name, BTreeSet::new())
        .with_module_visitor(|schema| {
            schema.with_module_definition_visitor(|header, module| {
                if module.as_str() != "Loop" {
                    return vec![];
                }
                vec![Diagnostic::new(
                    "Loop needs a marker",
                    ["Add a marker comment below the module line."],
                    header.value.name.range,
                )
                .with_fixes(vec![Edit::insert_at(Location::new(2, 1), "-- marker\n")])]
            })
        })
        .with_module_context(ModuleContextFunctions::new(
            ContextCreator::new(|info, _: &BTreeSet<String>| info.module_name().join(".")),
            ContextCreator::new(|_, module: &String| BTreeSet::from([module.clone()])),
            |new: BTreeSet<String>, mut accumulated: BTreeSet<String>| {
                accumulated.extend(new);
                accumulated
            },
        ))
        .with_final_project_evaluation(|modules| {
            let names: Vec<&str> = modules.iter().map(String::as_str).collect();
            vec![Diagnostic::global(
                &format!("Modules: {}", names.join(", ")),
                ["Every module of the project."],
            )]
        })
        .providing_fixes();
    Rule::from_project_schema(schema)
}

/// Reports the source text of each module name, as far as the rule can see it
pub fn header_source(name: &str, with_extractor: bool) -> Rule {
    let creator = ContextCreator::new(|info, _: &()| {
        info.extract_source(info.ast().header.value.name.range)
            .map(String::from)
    });
    let creator = if with_extractor {
        creator.with_source_code_extractor()
    } else {
        creator
    };
    Rule::from_module_schema(
        ModuleRuleSchema::with_context_creator(name, creator).with_module_definition_visitor(
            |header, source: &mut Option<String>| {
                source
                    .iter()
                    .map(|text| {
                        Diagnostic::new(
                            &format!("Module name reads `{}`", text),
                            ["Taken from the source text."],
                            header.value.name.range,
                        )
                    })
                    .collect()
            },
        ),
    )
}

/// Records visited paths; the context optionally depends on whether the
/// module is ignored
pub fn ignore_aware_recorder(
    name: &str,
    request_ignored: bool,
    visits: Rc<RefCell<Vec<String>>>,
) -> Rule {
    let creator =
        ContextCreator::new(|info, _: &()| (info.path().to_string(), info.is_file_ignored()));
    let creator = if request_ignored {
        creator.with_is_file_ignored()
    } else {
        creator
    };
    Rule::from_module_schema(
        ModuleRuleSchema::with_context_creator(name, creator).with_module_definition_visitor(
            move |_, (path, _): &mut (String, bool)| {
                visits.borrow_mut().push(path.clone());
                vec![]
            },
        ),
    )
}
