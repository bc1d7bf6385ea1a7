//! Shared test harness: AST construction helpers (this crate consumes
//! pre-parsed trees, so tests build them directly) plus driving helpers for
//! generator instances and thenables.

#![allow(dead_code)]

use jsgen::ast::*;
use jsgen::value::{JsFunction, JsObject, NativeFunction};
use jsgen::{Engine, GeneratorInstance, JsString, JsValue, StepEvent};

// ===== Expression builders =====

pub fn num(n: f64) -> Expression {
    Expression::Literal(Literal::Number(n))
}

pub fn string(s: &str) -> Expression {
    Expression::Literal(Literal::String(JsString::from(s)))
}

pub fn boolean(b: bool) -> Expression {
    Expression::Literal(Literal::Boolean(b))
}

pub fn undefined() -> Expression {
    Expression::Literal(Literal::Undefined)
}

pub fn id(name: &str) -> Identifier {
    Identifier::new(name)
}

pub fn ident(name: &str) -> Expression {
    Expression::Identifier(id(name))
}

pub fn yield_(argument: Option<Expression>) -> Expression {
    Expression::Yield(YieldExpression {
        argument: argument.map(Box::new),
        delegate: false,
    })
}

pub fn yield_star(iterable: Expression) -> Expression {
    Expression::Yield(YieldExpression {
        argument: Some(Box::new(iterable)),
        delegate: true,
    })
}

pub fn await_(argument: Expression) -> Expression {
    Expression::Await(AwaitExpression {
        argument: Box::new(argument),
    })
}

pub fn bin(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn add(left: Expression, right: Expression) -> Expression {
    bin(BinaryOperator::Add, left, right)
}

pub fn lt(left: Expression, right: Expression) -> Expression {
    bin(BinaryOperator::LessThan, left, right)
}

pub fn strict_eq(left: Expression, right: Expression) -> Expression {
    bin(BinaryOperator::StrictEqual, left, right)
}

pub fn assign_expr(name: &str, value: Expression) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator: AssignmentOperator::Assign,
        target: id(name),
        value: Box::new(value),
    })
}

pub fn call(callee: &str, arguments: Vec<Expression>) -> Expression {
    Expression::Call(CallExpression {
        callee: Box::new(ident(callee)),
        arguments,
    })
}

pub fn array(elements: Vec<Expression>) -> Expression {
    Expression::Array(ArrayLiteral { elements })
}

// ===== Statement builders =====

pub fn expr_stmt(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement { expression })
}

pub fn yield_stmt(argument: Expression) -> Statement {
    expr_stmt(yield_(Some(argument)))
}

pub fn let_(name: &str, init: Expression) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind: VariableKind::Let,
        declarations: vec![VariableDeclarator {
            id: id(name),
            init: Some(init),
        }],
    })
}

pub fn assign(name: &str, value: Expression) -> Statement {
    expr_stmt(assign_expr(name, value))
}

pub fn ret(argument: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement { argument })
}

pub fn block(body: Vec<Statement>) -> Statement {
    Statement::Block(BlockStatement { body })
}

pub fn if_(test: Expression, consequent: Vec<Statement>) -> Statement {
    Statement::If(IfStatement {
        test,
        consequent: Box::new(block(consequent)),
        alternate: None,
    })
}

pub fn if_else(
    test: Expression,
    consequent: Vec<Statement>,
    alternate: Vec<Statement>,
) -> Statement {
    Statement::If(IfStatement {
        test,
        consequent: Box::new(block(consequent)),
        alternate: Some(Box::new(block(alternate))),
    })
}

pub fn while_(test: Expression, body: Vec<Statement>) -> Statement {
    Statement::While(WhileStatement {
        test,
        body: Box::new(block(body)),
    })
}

pub fn do_while(body: Vec<Statement>, test: Expression) -> Statement {
    Statement::DoWhile(DoWhileStatement {
        body: Box::new(block(body)),
        test,
    })
}

/// `for (let name = 0; name < limit; name = name + 1) { body }`
pub fn count_loop(name: &str, limit: Expression, body: Vec<Statement>) -> Statement {
    Statement::For(ForStatement {
        init: Some(ForInit::Declaration(VariableDeclaration {
            kind: VariableKind::Let,
            declarations: vec![VariableDeclarator {
                id: id(name),
                init: Some(num(0.0)),
            }],
        })),
        test: Some(lt(ident(name), limit)),
        update: Some(assign_expr(name, add(ident(name), num(1.0)))),
        body: Box::new(block(body)),
    })
}

pub fn for_of(name: &str, iterable: Expression, body: Vec<Statement>) -> Statement {
    Statement::ForOf(ForOfStatement {
        declaration: Some(VariableKind::Const),
        binding: id(name),
        iterable,
        body: Box::new(block(body)),
        awaited: false,
    })
}

pub fn for_await_of(name: &str, iterable: Expression, body: Vec<Statement>) -> Statement {
    Statement::ForOf(ForOfStatement {
        declaration: Some(VariableKind::Const),
        binding: id(name),
        iterable,
        body: Box::new(block(body)),
        awaited: true,
    })
}

pub fn try_catch(try_body: Vec<Statement>, param: &str, catch_body: Vec<Statement>) -> Statement {
    Statement::Try(TryStatement {
        block: BlockStatement { body: try_body },
        handler: Some(CatchClause {
            param: Some(id(param)),
            body: BlockStatement { body: catch_body },
        }),
        finalizer: None,
    })
}

pub fn try_finally(try_body: Vec<Statement>, finally_body: Vec<Statement>) -> Statement {
    Statement::Try(TryStatement {
        block: BlockStatement { body: try_body },
        handler: None,
        finalizer: Some(BlockStatement { body: finally_body }),
    })
}

pub fn try_catch_finally(
    try_body: Vec<Statement>,
    param: &str,
    catch_body: Vec<Statement>,
    finally_body: Vec<Statement>,
) -> Statement {
    Statement::Try(TryStatement {
        block: BlockStatement { body: try_body },
        handler: Some(CatchClause {
            param: Some(id(param)),
            body: BlockStatement { body: catch_body },
        }),
        finalizer: Some(BlockStatement { body: finally_body }),
    })
}

pub fn throw_(argument: Expression) -> Statement {
    Statement::Throw(ThrowStatement { argument })
}

pub fn brk(label: Option<&str>) -> Statement {
    Statement::Break(BreakStatement {
        label: label.map(id),
    })
}

pub fn cont(label: Option<&str>) -> Statement {
    Statement::Continue(ContinueStatement {
        label: label.map(id),
    })
}

pub fn labeled(label: &str, body: Statement) -> Statement {
    Statement::Labeled(LabeledStatement {
        label: id(label),
        body: Box::new(body),
    })
}

/// `cases`: `(None, …)` is the `default` clause.
pub fn switch(
    discriminant: Expression,
    cases: Vec<(Option<Expression>, Vec<Statement>)>,
) -> Statement {
    Statement::Switch(SwitchStatement {
        discriminant,
        cases: cases
            .into_iter()
            .map(|(test, consequent)| SwitchCase { test, consequent })
            .collect(),
    })
}

// ===== Driving helpers =====

/// Drive a generator to completion with `next(undefined)`, collecting every
/// yielded value and the final completion value.
#[allow(clippy::expect_used, clippy::panic)]
pub fn collect_yields(engine: &mut Engine, instance: &GeneratorInstance) -> (Vec<JsValue>, JsValue) {
    let mut yields = Vec::new();
    loop {
        match instance
            .next(engine, JsValue::Undefined)
            .expect("generator step failed")
        {
            StepEvent::Yielded(value) => yields.push(value),
            StepEvent::Done(value) => return (yields, value),
            StepEvent::AwaitPending { .. } => panic!("generator suspended on an unsettled await"),
        }
    }
}

#[allow(clippy::expect_used, clippy::panic)]
pub fn expect_yield(event: StepEvent) -> JsValue {
    match event {
        StepEvent::Yielded(value) => value,
        other => panic!("expected a yield, got {other:?}"),
    }
}

#[allow(clippy::expect_used, clippy::panic)]
pub fn expect_done(event: StepEvent) -> JsValue {
    match event {
        StepEvent::Done(value) => value,
        other => panic!("expected completion, got {other:?}"),
    }
}

// ===== Thenables =====

fn thenable(then: NativeFunction) -> JsValue {
    let object = JsObject::plain();
    object.borrow_mut().set(
        JsString::from("then"),
        JsValue::Object(JsObject::function(JsFunction::Native(then))),
    );
    JsValue::Object(object)
}

/// A thenable that resolves synchronously inside its `then` call.
pub fn resolved_thenable(value: JsValue) -> JsValue {
    thenable(NativeFunction::new("then", move |interp, args| {
        let resolve = args.first().cloned().unwrap_or(JsValue::Undefined);
        interp.call_value(&resolve, &[value.clone()])
    }))
}

/// A thenable that rejects synchronously inside its `then` call.
pub fn rejected_thenable(value: JsValue) -> JsValue {
    thenable(NativeFunction::new("then", move |interp, args| {
        let reject = args.get(1).cloned().unwrap_or(JsValue::Undefined);
        interp.call_value(&reject, &[value.clone()])
    }))
}

/// A thenable whose `then` never settles; the awaiting step surfaces
/// `AwaitPending` and the test settles the slot directly.
pub fn pending_thenable() -> JsValue {
    thenable(NativeFunction::new("then", |_interp, _args| {
        Ok(JsValue::Undefined)
    }))
}

/// Unwrap numeric yields for compact assertions.
#[allow(clippy::expect_used, clippy::panic)]
pub fn numbers(values: &[JsValue]) -> Vec<f64> {
    values
        .iter()
        .map(|value| match value {
            JsValue::Number(n) => *n,
            other => panic!("expected a number, got {other:?}"),
        })
        .collect()
}
