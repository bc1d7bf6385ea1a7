//! Yield lowerer: a pre-pass that splits expressions containing more than
//! one suspension point into sequential single-suspension steps through
//! synthetic temporaries, preserving left-to-right evaluation order.
//!
//! After lowering, the builder only ever sees at most one suspension per
//! statement. Shapes the split cannot express (deeper nesting, suspensions
//! behind short-circuit operators or inside call arguments) are declined
//! with a reason, never mis-compiled. The pass is idempotent: already
//! lowered statements contain at most one suspension and flow through
//! unchanged.

use crate::ast::{
    AssignmentExpression, AssignmentOperator, BinaryExpression, BlockStatement, Expression,
    ExpressionStatement, Identifier, ReturnStatement, Statement, SwitchCase, VariableDeclaration,
    VariableDeclarator, VariableKind,
};
use crate::value::JsString;

use super::Unsupported;

/// Does this expression contain a suspension point? Nested function bodies
/// have their own suspension domain and are not descended into.
pub fn contains_suspension(expr: &Expression) -> bool {
    count_suspensions(expr) > 0
}

pub fn count_suspensions(expr: &Expression) -> usize {
    match expr {
        Expression::Yield(y) => {
            1 + y.argument.as_deref().map_or(0, count_suspensions)
        }
        Expression::Await(a) => 1 + count_suspensions(&a.argument),
        Expression::Literal(_) | Expression::Identifier(_) | Expression::Function(_) => 0,
        Expression::Array(a) => a.elements.iter().map(count_suspensions).sum(),
        Expression::Object(o) => o.properties.iter().map(|(_, e)| count_suspensions(e)).sum(),
        Expression::Unary(u) => count_suspensions(&u.argument),
        Expression::Binary(b) => count_suspensions(&b.left) + count_suspensions(&b.right),
        Expression::Logical(l) => count_suspensions(&l.left) + count_suspensions(&l.right),
        Expression::Conditional(c) => {
            count_suspensions(&c.test)
                + count_suspensions(&c.consequent)
                + count_suspensions(&c.alternate)
        }
        Expression::Assignment(a) => count_suspensions(&a.value),
        Expression::Update(_) => 0,
        Expression::Member(m) => {
            count_suspensions(&m.object)
                + match &m.property {
                    crate::ast::MemberProperty::Computed(e) => count_suspensions(e),
                    crate::ast::MemberProperty::Dot(_) => 0,
                }
        }
        Expression::Call(c) => {
            count_suspensions(&c.callee)
                + c.arguments.iter().map(count_suspensions).sum::<usize>()
        }
    }
}

/// Does any expression position of this statement contain a suspension?
/// Control-flow substructure is descended into; nested functions are not.
pub fn statement_contains_suspension(stmt: &Statement) -> bool {
    match stmt {
        Statement::Empty | Statement::FunctionDeclaration(_) => false,
        Statement::Expression(e) => contains_suspension(&e.expression),
        Statement::VariableDeclaration(decl) => decl
            .declarations
            .iter()
            .any(|d| d.init.as_ref().is_some_and(contains_suspension)),
        Statement::Block(block) => block.body.iter().any(statement_contains_suspension),
        Statement::If(i) => {
            contains_suspension(&i.test)
                || statement_contains_suspension(&i.consequent)
                || i.alternate
                    .as_deref()
                    .is_some_and(statement_contains_suspension)
        }
        Statement::Switch(s) => {
            contains_suspension(&s.discriminant)
                || s.cases.iter().any(|case| {
                    case.test.as_ref().is_some_and(contains_suspension)
                        || case.consequent.iter().any(statement_contains_suspension)
                })
        }
        Statement::For(f) => {
            f.init.as_ref().is_some_and(|init| match init {
                crate::ast::ForInit::Declaration(d) => d
                    .declarations
                    .iter()
                    .any(|d| d.init.as_ref().is_some_and(contains_suspension)),
                crate::ast::ForInit::Expression(e) => contains_suspension(e),
            }) || f.test.as_ref().is_some_and(contains_suspension)
                || f.update.as_ref().is_some_and(contains_suspension)
                || statement_contains_suspension(&f.body)
        }
        Statement::ForOf(f) => {
            contains_suspension(&f.iterable) || statement_contains_suspension(&f.body)
        }
        Statement::While(w) => {
            contains_suspension(&w.test) || statement_contains_suspension(&w.body)
        }
        Statement::DoWhile(d) => {
            contains_suspension(&d.test) || statement_contains_suspension(&d.body)
        }
        Statement::Try(t) => {
            t.block.body.iter().any(statement_contains_suspension)
                || t.handler
                    .as_ref()
                    .is_some_and(|h| h.body.body.iter().any(statement_contains_suspension))
                || t.finalizer
                    .as_ref()
                    .is_some_and(|f| f.body.iter().any(statement_contains_suspension))
        }
        Statement::Return(r) => r.argument.as_ref().is_some_and(contains_suspension),
        Statement::Throw(t) => contains_suspension(&t.argument),
        Statement::Break(_) | Statement::Continue(_) => false,
        Statement::Labeled(l) => statement_contains_suspension(&l.body),
    }
}

/// Is this expression directly a suspension (`yield`, `yield*`, `await`)
/// whose own operand is suspension-free?
fn is_plain_suspension(expr: &Expression) -> bool {
    match expr {
        Expression::Yield(y) => !y.argument.as_deref().is_some_and(contains_suspension),
        Expression::Await(a) => !contains_suspension(&a.argument),
        _ => false,
    }
}

/// Lower a statement list. Statements that need no rewrite pass through
/// unchanged (including clones of their subtrees with lowered interiors).
pub fn lower_statements(
    statements: &[Statement],
    counter: &mut usize,
) -> Result<Vec<Statement>, Unsupported> {
    let mut result = Vec::with_capacity(statements.len());
    for stmt in statements {
        result.extend(lower_statement(stmt, counter)?);
    }
    Ok(result)
}

fn lower_statement(
    stmt: &Statement,
    counter: &mut usize,
) -> Result<Vec<Statement>, Unsupported> {
    match stmt {
        Statement::VariableDeclaration(decl) => lower_declaration(decl, counter),
        Statement::Expression(expr_stmt) => lower_expression_statement(expr_stmt, counter),
        Statement::Return(ret) => lower_return(ret, counter),
        Statement::Block(block) => Ok(vec![Statement::Block(BlockStatement {
            body: lower_statements(&block.body, counter)?,
        })]),
        Statement::If(i) => Ok(vec![Statement::If(crate::ast::IfStatement {
            test: i.test.clone(),
            consequent: Box::new(lower_substatement(&i.consequent, counter)?),
            alternate: match &i.alternate {
                Some(alt) => Some(Box::new(lower_substatement(alt, counter)?)),
                None => None,
            },
        })]),
        Statement::While(w) => Ok(vec![Statement::While(crate::ast::WhileStatement {
            test: w.test.clone(),
            body: Box::new(lower_substatement(&w.body, counter)?),
        })]),
        Statement::DoWhile(d) => Ok(vec![Statement::DoWhile(crate::ast::DoWhileStatement {
            body: Box::new(lower_substatement(&d.body, counter)?),
            test: d.test.clone(),
        })]),
        Statement::For(f) => Ok(vec![Statement::For(crate::ast::ForStatement {
            init: f.init.clone(),
            test: f.test.clone(),
            update: f.update.clone(),
            body: Box::new(lower_substatement(&f.body, counter)?),
        })]),
        Statement::ForOf(f) => Ok(vec![Statement::ForOf(crate::ast::ForOfStatement {
            declaration: f.declaration,
            binding: f.binding.clone(),
            iterable: f.iterable.clone(),
            body: Box::new(lower_substatement(&f.body, counter)?),
            awaited: f.awaited,
        })]),
        Statement::Try(t) => Ok(vec![Statement::Try(crate::ast::TryStatement {
            block: BlockStatement {
                body: lower_statements(&t.block.body, counter)?,
            },
            handler: match &t.handler {
                Some(h) => Some(crate::ast::CatchClause {
                    param: h.param.clone(),
                    body: BlockStatement {
                        body: lower_statements(&h.body.body, counter)?,
                    },
                }),
                None => None,
            },
            finalizer: match &t.finalizer {
                Some(f) => Some(BlockStatement {
                    body: lower_statements(&f.body, counter)?,
                }),
                None => None,
            },
        })]),
        Statement::Switch(s) => {
            let mut cases = Vec::with_capacity(s.cases.len());
            for case in &s.cases {
                cases.push(SwitchCase {
                    test: case.test.clone(),
                    consequent: lower_statements(&case.consequent, counter)?,
                });
            }
            Ok(vec![Statement::Switch(crate::ast::SwitchStatement {
                discriminant: s.discriminant.clone(),
                cases,
            })])
        }
        Statement::Labeled(l) => Ok(vec![Statement::Labeled(crate::ast::LabeledStatement {
            label: l.label.clone(),
            body: Box::new(lower_substatement(&l.body, counter)?),
        })]),
        other => Ok(vec![other.clone()]),
    }
}

/// Lower a single-statement position; multiple resulting statements are
/// wrapped back into a block.
fn lower_substatement(stmt: &Statement, counter: &mut usize) -> Result<Statement, Unsupported> {
    let mut lowered = lower_statement(stmt, counter)?;
    if lowered.len() == 1 {
        match lowered.pop() {
            Some(single) => Ok(single),
            None => Ok(Statement::Empty),
        }
    } else {
        Ok(Statement::Block(BlockStatement { body: lowered }))
    }
}

fn lower_declaration(
    decl: &VariableDeclaration,
    counter: &mut usize,
) -> Result<Vec<Statement>, Unsupported> {
    let mut result = Vec::new();
    for declarator in &decl.declarations {
        let Some(init) = &declarator.init else {
            result.push(single_declaration(decl.kind, declarator.clone()));
            continue;
        };
        match split_double_suspension(init, counter)? {
            Some((prologue, recombined)) => {
                result.extend(prologue);
                result.push(single_declaration(
                    decl.kind,
                    VariableDeclarator {
                        id: declarator.id.clone(),
                        init: Some(recombined),
                    },
                ));
            }
            None => result.push(single_declaration(decl.kind, declarator.clone())),
        }
    }
    Ok(result)
}

fn lower_expression_statement(
    stmt: &ExpressionStatement,
    counter: &mut usize,
) -> Result<Vec<Statement>, Unsupported> {
    if let Expression::Assignment(assign) = &stmt.expression {
        if assign.operator == AssignmentOperator::Assign {
            if let Some((mut prologue, recombined)) =
                split_double_suspension(&assign.value, counter)?
            {
                prologue.push(Statement::Expression(ExpressionStatement {
                    expression: Expression::Assignment(AssignmentExpression {
                        operator: AssignmentOperator::Assign,
                        target: assign.target.clone(),
                        value: Box::new(recombined),
                    }),
                }));
                return Ok(prologue);
            }
        }
    }
    guard_single(&stmt.expression)?;
    Ok(vec![Statement::Expression(stmt.clone())])
}

fn lower_return(
    ret: &ReturnStatement,
    counter: &mut usize,
) -> Result<Vec<Statement>, Unsupported> {
    let Some(argument) = &ret.argument else {
        return Ok(vec![Statement::Return(ret.clone())]);
    };
    match split_double_suspension(argument, counter)? {
        Some((mut prologue, recombined)) => {
            prologue.push(Statement::Return(ReturnStatement {
                argument: Some(recombined),
            }));
            Ok(prologue)
        }
        None => Ok(vec![Statement::Return(ret.clone())]),
    }
}

/// The one shape the pre-pass rewrites: two suspension expressions joined by
/// a binary operator. Returns the two feeding declarations plus the
/// recombined expression, or `None` when the expression needs no split.
/// Anything else with two or more suspensions is declined.
fn split_double_suspension(
    expr: &Expression,
    counter: &mut usize,
) -> Result<Option<(Vec<Statement>, Expression)>, Unsupported> {
    match count_suspensions(expr) {
        0 | 1 => Ok(None),
        2 => {
            if let Expression::Binary(binary) = expr {
                if is_plain_suspension(&binary.left) && is_plain_suspension(&binary.right) {
                    // A suspension before its right operand must resume
                    // before that operand runs, so the two halves become
                    // sequential declarations in source order.
                    let left_name = fresh_temp(counter);
                    let right_name = fresh_temp(counter);
                    let prologue = vec![
                        temp_declaration(&left_name, (*binary.left).clone()),
                        temp_declaration(&right_name, (*binary.right).clone()),
                    ];
                    let recombined = Expression::Binary(BinaryExpression {
                        operator: binary.operator,
                        left: Box::new(ident_expr(&left_name)),
                        right: Box::new(ident_expr(&right_name)),
                    });
                    return Ok(Some((prologue, recombined)));
                }
            }
            Err(Unsupported::new(
                "two suspension points in a shape the lowerer cannot split",
            ))
        }
        n => Err(Unsupported::new(format!(
            "{n} chained suspension points in one expression"
        ))),
    }
}

/// Positions the lowerer does not rewrite must still hold at most one
/// suspension.
fn guard_single(expr: &Expression) -> Result<(), Unsupported> {
    if count_suspensions(expr) > 1 {
        return Err(Unsupported::new(
            "multiple suspension points outside a splittable position",
        ));
    }
    Ok(())
}

fn fresh_temp(counter: &mut usize) -> JsString {
    let name = JsString::from(format!("%lower{counter}"));
    *counter += 1;
    name
}

fn temp_declaration(name: &JsString, init: Expression) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind: VariableKind::Let,
        declarations: vec![VariableDeclarator {
            id: Identifier {
                name: name.clone(),
            },
            init: Some(init),
        }],
    })
}

fn ident_expr(name: &JsString) -> Expression {
    Expression::Identifier(Identifier { name: name.clone() })
}

fn single_declaration(kind: VariableKind, declarator: VariableDeclarator) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![declarator],
    })
}
