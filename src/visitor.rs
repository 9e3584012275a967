//! Per-module visitor lists and the traversal that runs them
//!
//! Every node kind has its own ordered list of visitors. Enter and exit lists
//! of a node kind both run in registration order. A module is walked as:
//! module definition, documentation, comments, each import, the declaration
//! list, then each declaration (enter, its expression tree, exit), and
//! finally the module's final evaluation.

use crate::ast::{
    CaseBlock, CaseBranch, Declaration, Expression, Import, LetBlock, LetDeclaration, Module,
    ModuleHeader, Node,
};
use crate::diagnostic::Diagnostic;

pub(crate) type HeaderVisitor<C> = Box<dyn Fn(&Node<ModuleHeader>, &mut C) -> Vec<Diagnostic>>;
pub(crate) type DocumentationVisitor<C> =
    Box<dyn Fn(Option<&Node<String>>, &mut C) -> Vec<Diagnostic>>;
pub(crate) type CommentsVisitor<C> = Box<dyn Fn(&[Node<String>], &mut C) -> Vec<Diagnostic>>;
pub(crate) type ImportVisitor<C> = Box<dyn Fn(&Node<Import>, &mut C) -> Vec<Diagnostic>>;
pub(crate) type DeclarationListVisitor<C> =
    Box<dyn Fn(&[Node<Declaration>], &mut C) -> Vec<Diagnostic>>;
pub(crate) type DeclarationVisitor<C> =
    Box<dyn Fn(&Node<Declaration>, &mut C) -> Vec<Diagnostic>>;
pub(crate) type ExpressionVisitor<C> =
    Box<dyn Fn(&Node<Expression>, &mut C) -> Vec<Diagnostic>>;
pub(crate) type LetDeclarationVisitor<C> =
    Box<dyn Fn(&LetBlock, &Node<LetDeclaration>, &mut C) -> Vec<Diagnostic>>;
pub(crate) type CaseBranchVisitor<C> =
    Box<dyn Fn(&CaseBlock, &CaseBranch, &mut C) -> Vec<Diagnostic>>;
pub(crate) type FinalModuleVisitor<C> = Box<dyn Fn(&C) -> Vec<Diagnostic>>;

/// Visitors registered for each node kind of a module
pub struct ModuleVisitors<C> {
    pub(crate) module_definition: Vec<HeaderVisitor<C>>,
    pub(crate) module_documentation: Vec<DocumentationVisitor<C>>,
    pub(crate) comments: Vec<CommentsVisitor<C>>,
    pub(crate) imports: Vec<ImportVisitor<C>>,
    pub(crate) declaration_list: Vec<DeclarationListVisitor<C>>,
    pub(crate) declaration_enter: Vec<DeclarationVisitor<C>>,
    pub(crate) declaration_exit: Vec<DeclarationVisitor<C>>,
    pub(crate) expression_enter: Vec<ExpressionVisitor<C>>,
    pub(crate) expression_exit: Vec<ExpressionVisitor<C>>,
    pub(crate) let_declaration_enter: Vec<LetDeclarationVisitor<C>>,
    pub(crate) let_declaration_exit: Vec<LetDeclarationVisitor<C>>,
    pub(crate) case_branch_enter: Vec<CaseBranchVisitor<C>>,
    pub(crate) case_branch_exit: Vec<CaseBranchVisitor<C>>,
    pub(crate) final_evaluation: Vec<FinalModuleVisitor<C>>,
}

impl<C> Default for ModuleVisitors<C> {
    fn default() -> Self {
        Self {
            module_definition: Vec::new(),
            module_documentation: Vec::new(),
            comments: Vec::new(),
            imports: Vec::new(),
            declaration_list: Vec::new(),
            declaration_enter: Vec::new(),
            declaration_exit: Vec::new(),
            expression_enter: Vec::new(),
            expression_exit: Vec::new(),
            let_declaration_enter: Vec::new(),
            let_declaration_exit: Vec::new(),
            case_branch_enter: Vec::new(),
            case_branch_exit: Vec::new(),
            final_evaluation: Vec::new(),
        }
    }
}

impl<C> ModuleVisitors<C> {
    /// Total number of registered visitors
    pub fn len(&self) -> usize {
        self.module_definition.len()
            + self.module_documentation.len()
            + self.comments.len()
            + self.imports.len()
            + self.declaration_list.len()
            + self.declaration_enter.len()
            + self.declaration_exit.len()
            + self.expression_tree_len()
            + self.final_evaluation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expression_tree_len(&self) -> usize {
        self.expression_enter.len()
            + self.expression_exit.len()
            + self.let_declaration_enter.len()
            + self.let_declaration_exit.len()
            + self.case_branch_enter.len()
            + self.case_branch_exit.len()
    }

    /// Walk a module, returning diagnostics in report order
    pub(crate) fn visit(&self, module: &Module, context: &mut C) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for visitor in &self.module_definition {
            diagnostics.extend(visitor(&module.header, context));
        }
        for visitor in &self.module_documentation {
            diagnostics.extend(visitor(module.documentation.as_ref(), context));
        }
        for visitor in &self.comments {
            diagnostics.extend(visitor(&module.comments, context));
        }
        for import in &module.imports {
            for visitor in &self.imports {
                diagnostics.extend(visitor(import, context));
            }
        }
        for visitor in &self.declaration_list {
            diagnostics.extend(visitor(&module.declarations, context));
        }

        let walk_expressions = self.expression_tree_len() > 0;
        for declaration in &module.declarations {
            for visitor in &self.declaration_enter {
                diagnostics.extend(visitor(declaration, context));
            }
            if walk_expressions {
                if let Some(expression) = declaration_expression(&declaration.value) {
                    self.visit_expression(expression, context, &mut diagnostics);
                }
            }
            for visitor in &self.declaration_exit {
                diagnostics.extend(visitor(declaration, context));
            }
        }

        for visitor in &self.final_evaluation {
            diagnostics.extend(visitor(context));
        }
        diagnostics
    }

    fn visit_expression(
        &self,
        node: &Node<Expression>,
        context: &mut C,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for visitor in &self.expression_enter {
            diagnostics.extend(visitor(node, context));
        }

        match &node.value {
            Expression::Let(block) => {
                for declaration in &block.declarations {
                    for visitor in &self.let_declaration_enter {
                        diagnostics.extend(visitor(block, declaration, context));
                    }
                    self.visit_expression(declaration.value.expression(), context, diagnostics);
                    for visitor in &self.let_declaration_exit {
                        diagnostics.extend(visitor(block, declaration, context));
                    }
                }
                self.visit_expression(&block.expression, context, diagnostics);
            }
            Expression::Case(block) => {
                self.visit_expression(&block.expression, context, diagnostics);
                for branch in &block.cases {
                    for visitor in &self.case_branch_enter {
                        diagnostics.extend(visitor(block, branch, context));
                    }
                    self.visit_expression(&branch.expression, context, diagnostics);
                    for visitor in &self.case_branch_exit {
                        diagnostics.extend(visitor(block, branch, context));
                    }
                }
            }
            other => {
                for child in other.children() {
                    self.visit_expression(child, context, diagnostics);
                }
            }
        }

        for visitor in &self.expression_exit {
            diagnostics.extend(visitor(node, context));
        }
    }
}

fn declaration_expression(declaration: &Declaration) -> Option<&Node<Expression>> {
    match declaration {
        Declaration::Function(function) => Some(&function.expression),
        Declaration::Destructuring { expression, .. } => Some(expression),
        Declaration::TypeAlias { .. }
        | Declaration::CustomType { .. }
        | Declaration::Port { .. }
        | Declaration::Infix { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Exposing, Function, InfixDirection, Pattern, Range};
    use pretty_assertions::assert_eq;

    type Log = Vec<String>;

    fn node<T>(value: T) -> Node<T> {
        Node::new(Range::empty(), value)
    }

    fn int(value: i64) -> Node<Expression> {
        node(Expression::Integer(value))
    }

    fn label(expression: &Expression) -> String {
        match expression {
            Expression::Integer(value) => value.to_string(),
            Expression::OperatorApplication { operator, .. } => operator.clone(),
            Expression::Let(_) => "let".to_string(),
            Expression::Case(_) => "case".to_string(),
            other => format!("{:?}", other),
        }
    }

    fn module(declarations: Vec<(&str, Node<Expression>)>) -> Module {
        Module {
            header: node(ModuleHeader {
                kind: Default::default(),
                name: node(vec!["A".to_string()]),
                exposing: node(Exposing::All(Range::empty())),
            }),
            documentation: None,
            comments: vec![node("-- note".to_string())],
            imports: vec![node(Import {
                module_name: node(vec!["B".to_string()]),
                alias: None,
                exposing: None,
            })],
            declarations: declarations
                .into_iter()
                .map(|(name, expression)| {
                    node(Declaration::Function(Function {
                        documentation: None,
                        signature: None,
                        name: node(name.to_string()),
                        arguments: vec![],
                        expression,
                    }))
                })
                .collect(),
        }
    }

    fn declaration_name(declaration: &Node<Declaration>) -> String {
        declaration.value.name().unwrap_or("_").to_string()
    }

    #[test]
    fn test_module_level_order() {
        let mut visitors: ModuleVisitors<Log> = ModuleVisitors::default();
        visitors.final_evaluation.push(Box::new(|log: &Log| {
            assert_eq!(log.last().map(String::as_str), Some("exit a"));
            vec![]
        }));
        visitors.declaration_exit.push(Box::new(|d, log: &mut Log| {
            log.push(format!("exit {}", declaration_name(d)));
            vec![]
        }));
        visitors.declaration_enter.push(Box::new(|d, log: &mut Log| {
            log.push(format!("enter {}", declaration_name(d)));
            vec![]
        }));
        visitors.declaration_list.push(Box::new(|ds, log: &mut Log| {
            log.push(format!("declarations {}", ds.len()));
            vec![]
        }));
        visitors.imports.push(Box::new(|_, log: &mut Log| {
            log.push("import".to_string());
            vec![]
        }));
        visitors.comments.push(Box::new(|cs, log: &mut Log| {
            log.push(format!("comments {}", cs.len()));
            vec![]
        }));
        visitors.module_documentation.push(Box::new(|doc, log: &mut Log| {
            log.push(format!("documentation {}", doc.is_some()));
            vec![]
        }));
        visitors.module_definition.push(Box::new(|_, log: &mut Log| {
            log.push("definition".to_string());
            vec![]
        }));

        let mut log = Log::new();
        visitors.visit(&module(vec![("a", int(1))]), &mut log);
        assert_eq!(
            log,
            vec![
                "definition",
                "documentation false",
                "comments 1",
                "import",
                "declarations 1",
                "enter a",
                "exit a",
            ]
        );
    }

    #[test]
    fn test_enter_and_exit_lists_fire_in_registration_order() {
        let mut visitors: ModuleVisitors<Log> = ModuleVisitors::default();
        for index in 1..=3 {
            visitors.expression_enter.push(Box::new(move |e, log: &mut Log| {
                log.push(format!("enter{} {}", index, label(&e.value)));
                vec![]
            }));
            visitors.expression_exit.push(Box::new(move |e, log: &mut Log| {
                log.push(format!("exit{} {}", index, label(&e.value)));
                vec![]
            }));
        }

        let mut log = Log::new();
        visitors.visit(&module(vec![("a", int(7))]), &mut log);
        assert_eq!(
            log,
            vec!["enter1 7", "enter2 7", "enter3 7", "exit1 7", "exit2 7", "exit3 7"]
        );
    }

    #[test]
    fn test_declaration_let_and_case_lists_fire_in_registration_order() {
        let mut visitors: ModuleVisitors<Log> = ModuleVisitors::default();
        for index in 1..=2 {
            visitors.declaration_enter.push(Box::new(move |d, log: &mut Log| {
                log.push(format!("decl-enter{} {}", index, declaration_name(d)));
                vec![]
            }));
            visitors.declaration_exit.push(Box::new(move |d, log: &mut Log| {
                log.push(format!("decl-exit{} {}", index, declaration_name(d)));
                vec![]
            }));
            visitors.let_declaration_enter.push(Box::new(move |_, _, log: &mut Log| {
                log.push(format!("let-enter{}", index));
                vec![]
            }));
            visitors.let_declaration_exit.push(Box::new(move |_, _, log: &mut Log| {
                log.push(format!("let-exit{}", index));
                vec![]
            }));
            visitors.case_branch_enter.push(Box::new(move |_, _, log: &mut Log| {
                log.push(format!("branch-enter{}", index));
                vec![]
            }));
            visitors.case_branch_exit.push(Box::new(move |_, _, log: &mut Log| {
                log.push(format!("branch-exit{}", index));
                vec![]
            }));
        }

        // let x = 1 in case 2 of _ -> 3
        let expression = node(Expression::Let(LetBlock {
            declarations: vec![node(LetDeclaration::Destructuring {
                pattern: node(Pattern::Var("x".to_string())),
                expression: int(1),
            })],
            expression: Box::new(node(Expression::Case(CaseBlock {
                expression: Box::new(int(2)),
                cases: vec![CaseBranch {
                    pattern: node(Pattern::All),
                    expression: int(3),
                }],
            }))),
        }));

        let mut log = Log::new();
        visitors.visit(&module(vec![("a", expression)]), &mut log);
        assert_eq!(
            log,
            vec![
                "decl-enter1 a",
                "decl-enter2 a",
                "let-enter1",
                "let-enter2",
                "let-exit1",
                "let-exit2",
                "branch-enter1",
                "branch-enter2",
                "branch-exit1",
                "branch-exit2",
                "decl-exit1 a",
                "decl-exit2 a",
            ]
        );
    }

    #[test]
    fn test_expression_tree_pre_order_with_associativity() {
        let mut visitors: ModuleVisitors<Log> = ModuleVisitors::default();
        visitors.expression_enter.push(Box::new(|e, log: &mut Log| {
            log.push(label(&e.value));
            vec![]
        }));

        // 1 :: (2 + 3), with `::` right-associative
        let expression = node(Expression::OperatorApplication {
            operator: "::".to_string(),
            direction: InfixDirection::Right,
            left: Box::new(int(1)),
            right: Box::new(node(Expression::OperatorApplication {
                operator: "+".to_string(),
                direction: InfixDirection::Left,
                left: Box::new(int(2)),
                right: Box::new(int(3)),
            })),
        });

        let mut log = Log::new();
        visitors.visit(&module(vec![("a", expression)]), &mut log);
        assert_eq!(log, vec!["::", "+", "2", "3", "1"]);
    }

    #[test]
    fn test_let_and_case_hooks_wrap_nested_traversal() {
        let mut visitors: ModuleVisitors<Log> = ModuleVisitors::default();
        visitors.expression_enter.push(Box::new(|e, log: &mut Log| {
            log.push(label(&e.value));
            vec![]
        }));
        visitors.let_declaration_enter.push(Box::new(|_, _, log: &mut Log| {
            log.push("let-enter".to_string());
            vec![]
        }));
        visitors.let_declaration_exit.push(Box::new(|_, _, log: &mut Log| {
            log.push("let-exit".to_string());
            vec![]
        }));
        visitors.case_branch_enter.push(Box::new(|_, branch, log: &mut Log| {
            log.push(format!("branch-enter {:?}", branch.pattern.value));
            vec![]
        }));
        visitors.case_branch_exit.push(Box::new(|_, _, log: &mut Log| {
            log.push("branch-exit".to_string());
            vec![]
        }));

        let expression = node(Expression::Let(LetBlock {
            declarations: vec![node(LetDeclaration::Destructuring {
                pattern: node(Pattern::Var("x".to_string())),
                expression: int(1),
            })],
            expression: Box::new(node(Expression::Case(CaseBlock {
                expression: Box::new(int(2)),
                cases: vec![
                    CaseBranch {
                        pattern: node(Pattern::Int(0)),
                        expression: int(3),
                    },
                    CaseBranch {
                        pattern: node(Pattern::All),
                        expression: int(4),
                    },
                ],
            }))),
        }));

        let mut log = Log::new();
        visitors.visit(&module(vec![("a", expression)]), &mut log);
        assert_eq!(
            log,
            vec![
                "let",
                "let-enter",
                "1",
                "let-exit",
                "case",
                "2",
                "branch-enter Int(0)",
                "3",
                "branch-exit",
                "branch-enter All",
                "4",
                "branch-exit",
            ]
        );
    }

    #[test]
    fn test_diagnostics_in_report_order() {
        let mut visitors: ModuleVisitors<()> = ModuleVisitors::default();
        visitors.declaration_enter.push(Box::new(|d, _| {
            vec![Diagnostic::new(
                &format!("declaration {}", declaration_name(d)),
                ["details"],
                d.range,
            )]
        }));
        visitors.final_evaluation.push(Box::new(|_| {
            vec![Diagnostic::new("final", ["details"], Range::empty())]
        }));

        let diagnostics = visitors.visit(&module(vec![("a", int(1)), ("b", int(2))]), &mut ());
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["declaration a", "declaration b", "final"]);
        assert_eq!(visitors.len(), 2);
    }
}
