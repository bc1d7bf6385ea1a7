//! Loop normalizer: reduces `while`, `do-while`, and `for` to one canonical
//! loop shape the builder compiles uniformly.

use crate::ast::{
    BlockStatement, DoWhileStatement, Expression, ForInit, ForStatement, Literal, Statement,
    WhileStatement,
};

/// The canonical loop shape.
#[derive(Debug, Clone)]
pub struct LoopPlan {
    /// Statements run once before the first iteration (`for` initializer).
    pub leading: Vec<Statement>,
    /// Statements run before each condition evaluation. Empty after
    /// normalization; the builder fills it when the condition needs a
    /// suspension rewrite.
    pub condition_prologue: Vec<Statement>,
    pub condition: Expression,
    /// Always a block.
    pub body: Statement,
    /// Statements run after each iteration (`for` increment).
    pub post_iteration: Vec<Statement>,
    /// `do-while`: the body runs once before the first condition check.
    pub condition_after_body: bool,
}

pub fn normalize_while(stmt: &WhileStatement) -> LoopPlan {
    LoopPlan {
        leading: Vec::new(),
        condition_prologue: Vec::new(),
        condition: stmt.test.clone(),
        body: as_block(&stmt.body),
        post_iteration: Vec::new(),
        condition_after_body: false,
    }
}

pub fn normalize_do_while(stmt: &DoWhileStatement) -> LoopPlan {
    LoopPlan {
        leading: Vec::new(),
        condition_prologue: Vec::new(),
        condition: stmt.test.clone(),
        body: as_block(&stmt.body),
        post_iteration: Vec::new(),
        condition_after_body: true,
    }
}

pub fn normalize_for(stmt: &ForStatement) -> LoopPlan {
    let leading = match &stmt.init {
        Some(ForInit::Declaration(decl)) => {
            vec![Statement::VariableDeclaration(decl.clone())]
        }
        Some(ForInit::Expression(expr)) => vec![Statement::Expression(
            crate::ast::ExpressionStatement {
                expression: expr.clone(),
            },
        )],
        None => Vec::new(),
    };
    let post_iteration = match &stmt.update {
        Some(update) => vec![Statement::Expression(crate::ast::ExpressionStatement {
            expression: update.clone(),
        })],
        None => Vec::new(),
    };
    LoopPlan {
        leading,
        condition_prologue: Vec::new(),
        // A missing condition defaults to literal `true`.
        condition: stmt
            .test
            .clone()
            .unwrap_or(Expression::Literal(Literal::Boolean(true))),
        body: as_block(&stmt.body),
        post_iteration,
        condition_after_body: false,
    }
}

/// Wrap a bare statement body into a block.
fn as_block(body: &Statement) -> Statement {
    match body {
        block @ Statement::Block(_) => block.clone(),
        other => Statement::Block(BlockStatement {
            body: vec![other.clone()],
        }),
    }
}
