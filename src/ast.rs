//! Syntax tree handed over by the source parser
//!
//! The engine never parses source text itself. A host-supplied
//! [`SourceParser`](crate::project::SourceParser) produces these nodes, either
//! natively or by deserializing them from JSON. Ranges are 1-based
//! row/column pairs and must be stable for a given source text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in a source file (1-based row and column)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Location {
    pub row: u32,
    pub column: u32,
}

impl Location {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

/// A half-open source range `[start, end)`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Range {
    pub start: Location,
    pub end: Location,
}

impl Range {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    /// Build a range from `(row, column)` pairs
    pub fn from_coords(start: (u32, u32), end: (u32, u32)) -> Self {
        Self {
            start: Location::new(start.0, start.1),
            end: Location::new(end.0, end.1),
        }
    }

    /// The empty range used for diagnostics that have no source position
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest range covering both ranges
    pub fn combine(&self, other: &Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A value paired with the source range it was parsed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node<T> {
    pub range: Range,
    pub value: T,
}

impl<T> Node<T> {
    pub fn new(range: Range, value: T) -> Self {
        Self { range, value }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Node<U> {
        Node {
            range: self.range,
            value: f(self.value),
        }
    }
}

/// Dotted module name, e.g. `["Html", "Attributes"]`
pub type ModuleName = Vec<String>;

/// Join a module name with dots
pub fn module_name_to_string(name: &[String]) -> String {
    name.join(".")
}

/// A parsed source module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub header: Node<ModuleHeader>,
    #[serde(default)]
    pub documentation: Option<Node<String>>,
    #[serde(default)]
    pub comments: Vec<Node<String>>,
    #[serde(default)]
    pub imports: Vec<Node<Import>>,
    #[serde(default)]
    pub declarations: Vec<Node<Declaration>>,
}

impl Module {
    /// The module's dotted name
    pub fn name(&self) -> &[String] {
        &self.header.value.name.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    Normal,
    Port,
    Effect,
}

/// `module Foo.Bar exposing (..)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleHeader {
    #[serde(default)]
    pub kind: ModuleKind,
    pub name: Node<ModuleName>,
    pub exposing: Node<Exposing>,
}

/// An exposing list, either `(..)` or explicit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposing {
    All(Range),
    Explicit(Vec<Node<TopLevelExpose>>),
}

impl Exposing {
    /// Whether a value or type named `name` is exposed
    pub fn exposes(&self, name: &str) -> bool {
        match self {
            Exposing::All(_) => true,
            Exposing::Explicit(items) => items.iter().any(|item| item.value.name() == name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopLevelExpose {
    Infix(String),
    Function(String),
    TypeOrAlias(String),
    /// `Type(..)`, with the range of the `(..)` part
    Type { name: String, open: Option<Range> },
}

impl TopLevelExpose {
    pub fn name(&self) -> &str {
        match self {
            TopLevelExpose::Infix(name)
            | TopLevelExpose::Function(name)
            | TopLevelExpose::TypeOrAlias(name) => name,
            TopLevelExpose::Type { name, .. } => name,
        }
    }
}

/// `import Foo.Bar as FB exposing (baz)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    pub module_name: Node<ModuleName>,
    #[serde(default)]
    pub alias: Option<Node<ModuleName>>,
    #[serde(default)]
    pub exposing: Option<Node<Exposing>>,
}

/// Top-level declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Declaration {
    Function(Function),
    TypeAlias {
        documentation: Option<Node<String>>,
        name: Node<String>,
        generics: Vec<Node<String>>,
        annotation: Node<TypeAnnotation>,
    },
    CustomType {
        documentation: Option<Node<String>>,
        name: Node<String>,
        generics: Vec<Node<String>>,
        constructors: Vec<Node<ValueConstructor>>,
    },
    Port {
        name: Node<String>,
        annotation: Node<TypeAnnotation>,
    },
    Infix {
        direction: Node<InfixDirection>,
        precedence: Node<u8>,
        operator: Node<String>,
        function: Node<String>,
    },
    Destructuring {
        pattern: Node<Pattern>,
        expression: Node<Expression>,
    },
}

impl Declaration {
    /// Name introduced by the declaration, if it has a single one
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Function(function) => Some(&function.name.value),
            Declaration::TypeAlias { name, .. } | Declaration::CustomType { name, .. } => {
                Some(&name.value)
            }
            Declaration::Port { name, .. } => Some(&name.value),
            Declaration::Infix { operator, .. } => Some(&operator.value),
            Declaration::Destructuring { .. } => None,
        }
    }
}

/// A function or value declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    #[serde(default)]
    pub documentation: Option<Node<String>>,
    #[serde(default)]
    pub signature: Option<Node<TypeAnnotation>>,
    pub name: Node<String>,
    #[serde(default)]
    pub arguments: Vec<Node<Pattern>>,
    pub expression: Node<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueConstructor {
    pub name: Node<String>,
    #[serde(default)]
    pub arguments: Vec<Node<TypeAnnotation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeAnnotation {
    Generic(String),
    Typed {
        module_name: ModuleName,
        name: String,
        arguments: Vec<Node<TypeAnnotation>>,
    },
    Unit,
    Tupled(Vec<Node<TypeAnnotation>>),
    Record(Vec<(Node<String>, Node<TypeAnnotation>)>),
    Function(Box<Node<TypeAnnotation>>, Box<Node<TypeAnnotation>>),
}

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfixDirection {
    Left,
    Right,
    Non,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    All,
    Unit,
    Char(char),
    String(String),
    Int(i64),
    Tuple(Vec<Node<Pattern>>),
    Record(Vec<Node<String>>),
    UnCons(Box<Node<Pattern>>, Box<Node<Pattern>>),
    List(Vec<Node<Pattern>>),
    Var(String),
    Named {
        module_name: ModuleName,
        name: String,
        arguments: Vec<Node<Pattern>>,
    },
    As(Box<Node<Pattern>>, Node<String>),
    Parenthesized(Box<Node<Pattern>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Unit,
    Application(Vec<Node<Expression>>),
    OperatorApplication {
        operator: String,
        direction: InfixDirection,
        left: Box<Node<Expression>>,
        right: Box<Node<Expression>>,
    },
    FunctionOrValue {
        module_name: ModuleName,
        name: String,
    },
    If {
        condition: Box<Node<Expression>>,
        then_branch: Box<Node<Expression>>,
        else_branch: Box<Node<Expression>>,
    },
    PrefixOperator(String),
    Operator(String),
    Integer(i64),
    Hex(i64),
    Float(f64),
    Negation(Box<Node<Expression>>),
    Literal(String),
    Char(char),
    Tupled(Vec<Node<Expression>>),
    Parenthesized(Box<Node<Expression>>),
    Let(LetBlock),
    Case(CaseBlock),
    Lambda(Lambda),
    Record(Vec<Node<RecordSetter>>),
    List(Vec<Node<Expression>>),
    RecordAccess {
        record: Box<Node<Expression>>,
        field: Node<String>,
    },
    RecordAccessFunction(String),
    RecordUpdate {
        record: Node<String>,
        updates: Vec<Node<RecordSetter>>,
    },
}

impl Expression {
    /// Direct sub-expressions, in visiting order
    ///
    /// Operator applications are ordered by associativity: right-associative
    /// operators yield their right operand first. `let` blocks yield each
    /// declaration's body and then the `in` expression; `case` blocks yield
    /// the scrutinee and then each branch.
    pub fn children(&self) -> Vec<&Node<Expression>> {
        match self {
            Expression::Application(items)
            | Expression::Tupled(items)
            | Expression::List(items) => items.iter().collect(),
            Expression::OperatorApplication {
                direction,
                left,
                right,
                ..
            } => match direction {
                InfixDirection::Right => vec![right.as_ref(), left.as_ref()],
                InfixDirection::Left | InfixDirection::Non => vec![left.as_ref(), right.as_ref()],
            },
            Expression::If {
                condition,
                then_branch,
                else_branch,
            } => vec![condition.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
            Expression::Negation(inner) | Expression::Parenthesized(inner) => vec![inner.as_ref()],
            Expression::RecordAccess { record, .. } => vec![record.as_ref()],
            Expression::Lambda(lambda) => vec![lambda.expression.as_ref()],
            Expression::Record(setters) | Expression::RecordUpdate { updates: setters, .. } => {
                setters.iter().map(|setter| &setter.value.value).collect()
            }
            Expression::Let(block) => {
                let mut children: Vec<&Node<Expression>> = block
                    .declarations
                    .iter()
                    .map(|declaration| declaration.value.expression())
                    .collect();
                children.push(block.expression.as_ref());
                children
            }
            Expression::Case(block) => {
                let mut children = vec![block.expression.as_ref()];
                children.extend(block.cases.iter().map(|branch| &branch.expression));
                children
            }
            Expression::Unit
            | Expression::FunctionOrValue { .. }
            | Expression::PrefixOperator(_)
            | Expression::Operator(_)
            | Expression::Integer(_)
            | Expression::Hex(_)
            | Expression::Float(_)
            | Expression::Literal(_)
            | Expression::Char(_)
            | Expression::RecordAccessFunction(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSetter {
    pub field: Node<String>,
    pub value: Node<Expression>,
}

/// `let ... in ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetBlock {
    pub declarations: Vec<Node<LetDeclaration>>,
    pub expression: Box<Node<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetDeclaration {
    Function(Function),
    Destructuring {
        pattern: Node<Pattern>,
        expression: Node<Expression>,
    },
}

impl LetDeclaration {
    /// The expression bound by this declaration
    pub fn expression(&self) -> &Node<Expression> {
        match self {
            LetDeclaration::Function(function) => &function.expression,
            LetDeclaration::Destructuring { expression, .. } => expression,
        }
    }
}

/// `case ... of ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBlock {
    pub expression: Box<Node<Expression>>,
    pub cases: Vec<CaseBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    pub pattern: Node<Pattern>,
    pub expression: Node<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub args: Vec<Node<Pattern>>,
    pub expression: Box<Node<Expression>>,
}
