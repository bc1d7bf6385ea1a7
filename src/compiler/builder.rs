//! Back-to-front IR builder.
//!
//! Statement lists are compiled in reverse: each node receives the index of
//! "what happens next" and returns its own entry index, so no forward
//! references need patching. The one exception is a loop head, which
//! reserves a single `Jump` arena slot as its back-edge target and
//! overwrites it in place once the condition chain exists.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{
    AssignmentExpression, AssignmentOperator, BinaryExpression, BinaryOperator, Expression,
    ExpressionStatement, Identifier, IfStatement, Literal, LogicalExpression, LogicalOperator,
    ReturnStatement, Statement, SwitchStatement, ThrowStatement, TryStatement,
    VariableDeclaration, VariableDeclarator, VariableKind,
};
use crate::value::{CheapClone, FunctionKind, JsString};

use super::lower::{self, contains_suspension, statement_contains_suspension};
use super::normalize::{self, LoopPlan};
use super::plan::{CatchSite, Instruction, Next, Plan};
use super::{iterator, Unsupported};

/// Compile a (pre-normalized) generator body into a plan.
pub(crate) fn build_plan(
    name: Option<&JsString>,
    body: &[Statement],
    kind: FunctionKind,
) -> Result<Plan, Unsupported> {
    if !kind.is_generator() {
        return Err(Unsupported::new("not a generator function"));
    }
    let mut lower_counter = 0;
    let lowered = lower::lower_statements(body, &mut lower_counter)?;

    let mut builder = PlanBuilder::new(kind.is_async());
    let entry = builder.build_statements(&lowered, Next::Done)?;
    let plan = Plan {
        instructions: builder.instructions.into_boxed_slice(),
        entry,
        iterator_slots: builder.iterator_slots,
        async_mode: builder.async_mode,
        function_name: name.map(CheapClone::cheap_clone),
    };
    plan.debug_validate();
    Ok(plan)
}

/// Loop (or switch) context for break/continue resolution. Visible only to
/// statements built while pushed.
struct LoopScope {
    label: Option<JsString>,
    /// `None` for breakable non-loops (switch, labeled blocks).
    continue_target: Option<Next>,
    break_target: Next,
    /// Enclosing try regions at push time, to size `ExitRegions`.
    region_depth: usize,
    finally_depth: usize,
}

pub struct PlanBuilder {
    instructions: Vec<Instruction>,
    loop_scopes: Vec<LoopScope>,
    /// Label to loop-scope index mapping.
    labels: FxHashMap<JsString, usize>,
    /// Try regions live on the runtime stack at the current build point.
    try_nesting: usize,
    finally_depth: usize,
    iterator_slots: usize,
    synth: usize,
    pub(crate) async_mode: bool,
}

/// A suspension pulled out of an enclosing expression.
struct Extracted {
    /// Suspension-free statements that must run first (hoisted operands),
    /// in source order.
    prologue: Vec<Statement>,
    kind: SuspensionKind,
    resume_slot: JsString,
    /// The enclosing expression with the suspension replaced by a read of
    /// the resume slot.
    replaced: Expression,
}

enum SuspensionKind {
    Yield(Option<Expression>),
    Delegate(Expression),
    Await(Expression),
}

impl PlanBuilder {
    fn new(async_mode: bool) -> Self {
        PlanBuilder {
            instructions: Vec::new(),
            loop_scopes: Vec::new(),
            labels: FxHashMap::default(),
            try_nesting: 0,
            finally_depth: 0,
            iterator_slots: 0,
            synth: 0,
            async_mode,
        }
    }

    // ===== Arena primitives =====

    pub(crate) fn push(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Reserve an arena slot for a loop head; the target is filled in by
    /// `patch_jump` before the enclosing build returns.
    pub(crate) fn reserve_jump(&mut self) -> usize {
        self.push(Instruction::Jump { next: Next::Done })
    }

    pub(crate) fn patch_jump(&mut self, at: usize, target: Next) {
        if let Some(Instruction::Jump { next }) = self.instructions.get_mut(at) {
            *next = target;
        } else {
            debug_assert!(false, "patched a non-jump instruction at {at}");
        }
    }

    pub(crate) fn alloc_iterator_slot(&mut self) -> usize {
        let slot = self.iterator_slots;
        self.iterator_slots += 1;
        slot
    }

    fn fresh_resume_slot(&mut self) -> JsString {
        let name = JsString::from(format!("%resume{}", self.synth));
        self.synth += 1;
        name
    }

    fn fresh_temp(&mut self) -> JsString {
        let name = JsString::from(format!("%tmp{}", self.synth));
        self.synth += 1;
        name
    }

    // ===== Scopes =====

    pub(crate) fn push_scope(
        &mut self,
        label: Option<&JsString>,
        continue_target: Option<Next>,
        break_target: Next,
    ) {
        let index = self.loop_scopes.len();
        if let Some(label) = label {
            self.labels.insert(label.cheap_clone(), index);
        }
        self.loop_scopes.push(LoopScope {
            label: label.map(CheapClone::cheap_clone),
            continue_target,
            break_target,
            region_depth: self.try_nesting,
            finally_depth: self.finally_depth,
        });
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(scope) = self.loop_scopes.pop() {
            if let Some(label) = &scope.label {
                self.labels.remove(label);
            }
        }
    }

    // ===== Statements =====

    pub(crate) fn build_statements(
        &mut self,
        statements: &[Statement],
        next: Next,
    ) -> Result<Next, Unsupported> {
        let mut entry = next;
        for stmt in statements.iter().rev() {
            entry = self.build_statement(stmt, entry)?;
        }
        Ok(entry)
    }

    /// Build one statement, rolling back every instruction it appended on
    /// failure so the plan under construction is unaffected.
    pub(crate) fn build_statement(
        &mut self,
        stmt: &Statement,
        next: Next,
    ) -> Result<Next, Unsupported> {
        let mark = self.instructions.len();
        match self.build_statement_inner(stmt, next) {
            Ok(entry) => Ok(entry),
            Err(failure) => {
                self.instructions.truncate(mark);
                Err(failure)
            }
        }
    }

    fn build_statement_inner(
        &mut self,
        stmt: &Statement,
        next: Next,
    ) -> Result<Next, Unsupported> {
        match stmt {
            Statement::Empty => Ok(next),
            Statement::Block(block) => self.build_statements(&block.body, next),
            Statement::FunctionDeclaration(_) => self.emit_exec(stmt.clone(), next),
            Statement::Expression(expr_stmt) => self.build_expression_statement(expr_stmt, next),
            Statement::VariableDeclaration(decl) => self.build_declaration(decl, next),
            Statement::Return(ret) => self.build_return(ret, next),
            Statement::Throw(throw_stmt) => self.build_throw(throw_stmt, next),
            Statement::If(if_stmt) => self.build_if(if_stmt, next),
            Statement::While(w) => self.build_loop(normalize::normalize_while(w), None, next),
            Statement::DoWhile(d) => self.build_loop(normalize::normalize_do_while(d), None, next),
            Statement::For(f) => self.build_loop(normalize::normalize_for(f), None, next),
            Statement::ForOf(for_of) => iterator::build_for_of(self, for_of, None, next),
            Statement::Switch(switch_stmt) => self.build_switch(switch_stmt, None, next),
            Statement::Try(try_stmt) => self.build_try(try_stmt, next),
            Statement::Break(brk) => self.resolve_break(brk.label.as_ref()),
            Statement::Continue(cont) => self.resolve_continue(cont.label.as_ref()),
            Statement::Labeled(labeled) => self.build_labeled(labeled, next),
        }
    }

    fn build_expression_statement(
        &mut self,
        stmt: &ExpressionStatement,
        next: Next,
    ) -> Result<Next, Unsupported> {
        if !contains_suspension(&stmt.expression) {
            return self.emit_exec(Statement::Expression(stmt.clone()), next);
        }
        let extracted = self.extract_suspension(&stmt.expression)?;
        // A bare suspension needs no trailing statement; its resume value is
        // simply discarded.
        let tail = if is_slot_read(&extracted.replaced, &extracted.resume_slot) {
            next
        } else {
            self.emit_exec(
                Statement::Expression(ExpressionStatement {
                    expression: extracted.replaced.clone(),
                }),
                next,
            )?
        };
        self.emit_suspension_chain(extracted, tail)
    }

    fn build_declaration(
        &mut self,
        decl: &VariableDeclaration,
        next: Next,
    ) -> Result<Next, Unsupported> {
        if !statement_contains_suspension(&Statement::VariableDeclaration(decl.clone())) {
            return self.emit_exec(Statement::VariableDeclaration(decl.clone()), next);
        }
        if decl.declarations.len() > 1 {
            // The lowerer splits multi-declarator statements; reaching this
            // with one still means un-lowered input, so split here too.
            let singles: Vec<Statement> = decl
                .declarations
                .iter()
                .map(|d| single_declaration(decl.kind, d.clone()))
                .collect();
            return self.build_statements(&singles, next);
        }
        let Some(declarator) = decl.declarations.first() else {
            return Ok(next);
        };
        let Some(init) = &declarator.init else {
            return self.emit_exec(Statement::VariableDeclaration(decl.clone()), next);
        };
        let extracted = self.extract_suspension(init)?;
        let tail = self.emit_exec(
            single_declaration(
                decl.kind,
                VariableDeclarator {
                    id: declarator.id.clone(),
                    init: Some(extracted.replaced.clone()),
                },
            ),
            next,
        )?;
        self.emit_suspension_chain(extracted, tail)
    }

    fn build_return(&mut self, ret: &ReturnStatement, _next: Next) -> Result<Next, Unsupported> {
        if self.finally_depth > 0 {
            // A return whose finally has already started would have to
            // override the pending completion; the compiled path declines.
            return Err(Unsupported::new("return out of a finally block"));
        }
        match &ret.argument {
            None => Ok(Next::At(self.push(Instruction::Return { operand: None }))),
            Some(argument) if !contains_suspension(argument) => {
                Ok(Next::At(self.push(Instruction::Return {
                    operand: Some(Rc::new(argument.clone())),
                })))
            }
            Some(argument) => {
                // `return yield …` and friends: suspend first, then return
                // the resumed value.
                let extracted = self.extract_suspension(argument)?;
                let tail = Next::At(self.push(Instruction::Return {
                    operand: Some(Rc::new(extracted.replaced.clone())),
                }));
                self.emit_suspension_chain(extracted, tail)
            }
        }
    }

    fn build_throw(&mut self, stmt: &ThrowStatement, next: Next) -> Result<Next, Unsupported> {
        if !contains_suspension(&stmt.argument) {
            return self.emit_exec(Statement::Throw(stmt.clone()), next);
        }
        let extracted = self.extract_suspension(&stmt.argument)?;
        let tail = self.emit_exec(
            Statement::Throw(ThrowStatement {
                argument: extracted.replaced.clone(),
            }),
            next,
        )?;
        self.emit_suspension_chain(extracted, tail)
    }

    fn build_if(&mut self, if_stmt: &IfStatement, next: Next) -> Result<Next, Unsupported> {
        let consequent = self.build_statement(&if_stmt.consequent, next)?;
        let alternate = match &if_stmt.alternate {
            Some(alternate) => self.build_statement(alternate, next)?,
            None => next,
        };
        self.build_condition(&if_stmt.test, consequent, alternate)
    }

    /// Emit the branch for a condition. A condition containing a suspension
    /// is rewritten so the suspension runs first into a resume slot and the
    /// branch reads that slot, re-evaluated once per arrival, matching
    /// source order.
    fn build_condition(
        &mut self,
        test: &Expression,
        if_true: Next,
        if_false: Next,
    ) -> Result<Next, Unsupported> {
        if !contains_suspension(test) {
            return Ok(Next::At(self.push(Instruction::Branch {
                test: Rc::new(test.clone()),
                if_true,
                if_false,
            })));
        }
        let extracted = self.extract_suspension(test)?;
        let branch = Next::At(self.push(Instruction::Branch {
            test: Rc::new(extracted.replaced.clone()),
            if_true,
            if_false,
        }));
        self.emit_suspension_chain(extracted, branch)
    }

    fn build_loop(
        &mut self,
        plan: LoopPlan,
        label: Option<&JsString>,
        next: Next,
    ) -> Result<Next, Unsupported> {
        let head = self.reserve_jump();
        self.push_scope(label, Some(Next::At(head)), next);
        let body_result = self.build_statement(&plan.body, Next::At(head));
        self.pop_scope();
        let body_entry = body_result?;

        let condition_entry = self.build_condition(&plan.condition, body_entry, next)?;
        let condition_entry = self.build_statements(&plan.condition_prologue, condition_entry)?;
        let back_edge = self.build_statements(&plan.post_iteration, condition_entry)?;
        self.patch_jump(head, back_edge);

        let entry = if plan.condition_after_body {
            body_entry
        } else {
            condition_entry
        };
        self.build_statements(&plan.leading, entry)
    }

    fn build_try(&mut self, try_stmt: &TryStatement, next: Next) -> Result<Next, Unsupported> {
        let finally_entry = match &try_stmt.finalizer {
            Some(finalizer) => {
                let end_finally = self.push(Instruction::EndFinally);
                // The region is still on the runtime stack while its finally
                // runs (phase Finally), so nesting stays incremented.
                self.try_nesting += 1;
                self.finally_depth += 1;
                let entry = self.build_statements(&finalizer.body, Next::At(end_finally));
                self.finally_depth -= 1;
                self.try_nesting -= 1;
                Some(entry?)
            }
            None => None,
        };

        self.try_nesting += 1;
        let leave = self.push(Instruction::LeaveTry);
        let body_result = self.build_statements(&try_stmt.block.body, Next::At(leave));
        let catch_result = match &try_stmt.handler {
            Some(handler) => {
                let leave_catch = self.push(Instruction::LeaveTry);
                self.build_statements(&handler.body.body, Next::At(leave_catch))
                    .map(|entry| {
                        Some(CatchSite {
                            entry,
                            slot: handler.param.as_ref().map(|p| p.name.cheap_clone()),
                        })
                    })
            }
            None => Ok(None),
        };
        self.try_nesting -= 1;

        let body_entry = body_result?;
        let catch = catch_result?;
        let enter = self.push(Instruction::EnterTry {
            catch,
            finally: finally_entry,
            after: next,
            body: body_entry,
        });
        Ok(Next::At(enter))
    }

    fn build_labeled(
        &mut self,
        labeled: &crate::ast::LabeledStatement,
        next: Next,
    ) -> Result<Next, Unsupported> {
        let label = &labeled.label.name;
        match labeled.body.as_ref() {
            Statement::While(w) => {
                self.build_loop(normalize::normalize_while(w), Some(label), next)
            }
            Statement::DoWhile(d) => {
                self.build_loop(normalize::normalize_do_while(d), Some(label), next)
            }
            Statement::For(f) => self.build_loop(normalize::normalize_for(f), Some(label), next),
            Statement::ForOf(f) => iterator::build_for_of(self, f, Some(label), next),
            Statement::Switch(s) => self.build_switch(s, Some(label), next),
            other => {
                // Labeled non-loop: breakable, not continuable.
                self.push_scope(Some(label), None, next);
                let result = self.build_statement(other, next);
                self.pop_scope();
                result
            }
        }
    }

    // ===== Break / continue =====

    fn resolve_break(&mut self, label: Option<&Identifier>) -> Result<Next, Unsupported> {
        let index = match label {
            Some(label) => self.lookup_label(label)?,
            None => self
                .loop_scopes
                .len()
                .checked_sub(1)
                .ok_or_else(|| Unsupported::new("'break' outside a loop or switch"))?,
        };
        let (target, regions) = {
            let scope = self.scope_at(index)?;
            (scope.break_target, self.exit_regions_for(index)?)
        };
        self.emit_jump_out(target, regions)
    }

    fn resolve_continue(&mut self, label: Option<&Identifier>) -> Result<Next, Unsupported> {
        let index = match label {
            Some(label) => self.lookup_label(label)?,
            None => self
                .loop_scopes
                .iter()
                .rposition(|scope| scope.continue_target.is_some())
                .ok_or_else(|| Unsupported::new("'continue' outside a loop"))?,
        };
        let (target, regions) = {
            let scope = self.scope_at(index)?;
            let target = scope
                .continue_target
                .ok_or_else(|| Unsupported::new("continue target is not a loop"))?;
            (target, self.exit_regions_for(index)?)
        };
        self.emit_jump_out(target, regions)
    }

    fn lookup_label(&self, label: &Identifier) -> Result<usize, Unsupported> {
        self.labels
            .get(&label.name)
            .copied()
            .ok_or_else(|| Unsupported::new(format!("undefined label '{}'", label.name)))
    }

    fn scope_at(&self, index: usize) -> Result<&LoopScope, Unsupported> {
        self.loop_scopes
            .get(index)
            .ok_or_else(|| Unsupported::new("loop scope index out of range"))
    }

    /// How many try regions a jump to the given scope leaves. Jumps that
    /// would escape a running finally are declined.
    fn exit_regions_for(&self, index: usize) -> Result<usize, Unsupported> {
        let scope = self.scope_at(index)?;
        if scope.finally_depth != self.finally_depth {
            return Err(Unsupported::new("break or continue out of a finally block"));
        }
        Ok(self.try_nesting - scope.region_depth)
    }

    fn emit_jump_out(&mut self, target: Next, regions: usize) -> Result<Next, Unsupported> {
        if regions == 0 {
            Ok(target)
        } else {
            Ok(Next::At(
                self.push(Instruction::ExitRegions { regions, target }),
            ))
        }
    }

    // ===== Switch desugaring =====

    /// Switch compiles to a let/if desugaring over two synthetic bindings
    /// (the matched-clause index and a fallthrough flag), so no dedicated
    /// dispatch instruction exists. `default` participates at its source
    /// position but is selected only if no case matched.
    fn build_switch(
        &mut self,
        switch_stmt: &SwitchStatement,
        label: Option<&JsString>,
        next: Next,
    ) -> Result<Next, Unsupported> {
        let desugared = self.desugar_switch(switch_stmt)?;
        self.push_scope(label, None, next);
        let result = self.build_statements(&desugared, next);
        self.pop_scope();
        result
    }

    fn desugar_switch(
        &mut self,
        switch_stmt: &SwitchStatement,
    ) -> Result<Vec<Statement>, Unsupported> {
        if contains_suspension(&switch_stmt.discriminant) {
            return Err(Unsupported::new(
                "suspension inside a switch discriminant",
            ));
        }
        if switch_stmt
            .cases
            .iter()
            .any(|case| case.test.as_ref().is_some_and(contains_suspension))
        {
            return Err(Unsupported::new("suspension inside a case test"));
        }

        let id = self.synth;
        self.synth += 1;
        let value_name = JsString::from(format!("%switch{id}_value"));
        let match_name = JsString::from(format!("%switch{id}_match"));
        let fall_name = JsString::from(format!("%switch{id}_fall"));

        let mut desugared = vec![
            let_statement(&value_name, switch_stmt.discriminant.clone()),
            let_statement(&match_name, number(-1.0)),
        ];

        // First matching case wins; tests are evaluated lazily in order.
        let mut match_chain: Option<Statement> = None;
        for (index, case) in switch_stmt.cases.iter().enumerate().rev() {
            let Some(test) = &case.test else { continue };
            match_chain = Some(Statement::If(IfStatement {
                test: strict_eq(ident(&value_name), test.clone()),
                consequent: Box::new(assign_statement(&match_name, number(index as f64))),
                alternate: match_chain.take().map(Box::new),
            }));
        }
        if let Some(chain) = match_chain {
            desugared.push(chain);
        }
        if let Some(default_index) = switch_stmt.cases.iter().position(|c| c.test.is_none()) {
            desugared.push(Statement::If(IfStatement {
                test: strict_eq(ident(&match_name), number(-1.0)),
                consequent: Box::new(assign_statement(&match_name, number(default_index as f64))),
                alternate: None,
            }));
        }

        desugared.push(let_statement(&fall_name, bool_literal(false)));
        for (index, case) in switch_stmt.cases.iter().enumerate() {
            let mut body = vec![assign_statement(&fall_name, bool_literal(true))];
            body.extend(case.consequent.iter().cloned());
            desugared.push(Statement::If(IfStatement {
                test: Expression::Logical(LogicalExpression {
                    operator: LogicalOperator::Or,
                    left: Box::new(ident(&fall_name)),
                    right: Box::new(strict_eq(ident(&match_name), number(index as f64))),
                }),
                consequent: Box::new(Statement::Block(crate::ast::BlockStatement { body })),
                alternate: None,
            }));
        }
        Ok(desugared)
    }

    // ===== Suspension extraction =====

    /// Pull the single suspension out of an expression, hoisting operands
    /// that must evaluate before it so source order is preserved.
    fn extract_suspension(&mut self, expr: &Expression) -> Result<Extracted, Unsupported> {
        match expr {
            Expression::Yield(y) => {
                if y.argument.as_deref().is_some_and(contains_suspension) {
                    return Err(Unsupported::new("nested suspension inside a yield operand"));
                }
                let resume_slot = self.fresh_resume_slot();
                let kind = if y.delegate {
                    let argument = y.argument.as_deref().cloned().ok_or_else(|| {
                        Unsupported::new("yield* without an iterable operand")
                    })?;
                    SuspensionKind::Delegate(argument)
                } else {
                    SuspensionKind::Yield(y.argument.as_deref().cloned())
                };
                Ok(Extracted {
                    prologue: Vec::new(),
                    kind,
                    replaced: ident(&resume_slot),
                    resume_slot,
                })
            }
            Expression::Await(a) => {
                if contains_suspension(&a.argument) {
                    return Err(Unsupported::new(
                        "nested suspension inside an await operand",
                    ));
                }
                let resume_slot = self.fresh_resume_slot();
                Ok(Extracted {
                    prologue: Vec::new(),
                    kind: SuspensionKind::Await((*a.argument).clone()),
                    replaced: ident(&resume_slot),
                    resume_slot,
                })
            }
            Expression::Binary(binary) => {
                let in_left = contains_suspension(&binary.left);
                let in_right = contains_suspension(&binary.right);
                match (in_left, in_right) {
                    (true, true) => Err(Unsupported::new(
                        "multiple suspension points in one expression",
                    )),
                    (true, false) => {
                        let mut extracted = self.extract_suspension(&binary.left)?;
                        extracted.replaced = Expression::Binary(BinaryExpression {
                            operator: binary.operator,
                            left: Box::new(extracted.replaced),
                            right: binary.right.clone(),
                        });
                        Ok(extracted)
                    }
                    (false, true) => {
                        // The left operand runs before the suspension; hoist
                        // it so it is not re-evaluated after resumption.
                        let temp = self.fresh_temp();
                        let mut extracted = self.extract_suspension(&binary.right)?;
                        let mut prologue =
                            vec![let_statement(&temp, (*binary.left).clone())];
                        prologue.append(&mut extracted.prologue);
                        extracted.prologue = prologue;
                        extracted.replaced = Expression::Binary(BinaryExpression {
                            operator: binary.operator,
                            left: Box::new(ident(&temp)),
                            right: Box::new(extracted.replaced),
                        });
                        Ok(extracted)
                    }
                    (false, false) => Err(Unsupported::new("no suspension point to extract")),
                }
            }
            Expression::Unary(unary) => {
                let mut extracted = self.extract_suspension(&unary.argument)?;
                extracted.replaced = Expression::Unary(crate::ast::UnaryExpression {
                    operator: unary.operator,
                    argument: Box::new(extracted.replaced),
                });
                Ok(extracted)
            }
            Expression::Logical(logical) => {
                if contains_suspension(&logical.right) {
                    return Err(Unsupported::new(
                        "suspension on the right of a short-circuit operator",
                    ));
                }
                let mut extracted = self.extract_suspension(&logical.left)?;
                extracted.replaced = Expression::Logical(LogicalExpression {
                    operator: logical.operator,
                    left: Box::new(extracted.replaced),
                    right: logical.right.clone(),
                });
                Ok(extracted)
            }
            Expression::Assignment(assign) => {
                if assign.operator != AssignmentOperator::Assign {
                    return Err(Unsupported::new(
                        "suspension inside a compound assignment",
                    ));
                }
                let mut extracted = self.extract_suspension(&assign.value)?;
                extracted.replaced = Expression::Assignment(AssignmentExpression {
                    operator: AssignmentOperator::Assign,
                    target: assign.target.clone(),
                    value: Box::new(extracted.replaced),
                });
                Ok(extracted)
            }
            Expression::Conditional(_) => Err(Unsupported::new(
                "suspension inside a conditional expression",
            )),
            _ => Err(Unsupported::new(
                "suspension in an unsupported expression position",
            )),
        }
    }

    /// Emit prologue + suspension instruction, chaining into `tail`.
    fn emit_suspension_chain(
        &mut self,
        extracted: Extracted,
        tail: Next,
    ) -> Result<Next, Unsupported> {
        let suspension = match extracted.kind {
            SuspensionKind::Yield(operand) => Next::At(self.push(Instruction::Yield {
                operand: operand.map(Rc::new),
                resume_slot: extracted.resume_slot,
                next: tail,
            })),
            SuspensionKind::Delegate(iterable) => {
                let state_slot = self.alloc_iterator_slot();
                Next::At(self.push(Instruction::YieldDelegate {
                    iterable: Rc::new(iterable),
                    state_slot,
                    resume_slot: extracted.resume_slot,
                    next: tail,
                }))
            }
            SuspensionKind::Await(operand) => {
                if !self.async_mode {
                    return Err(Unsupported::new("await outside an async generator"));
                }
                Next::At(self.push(Instruction::Await {
                    operand: Rc::new(operand),
                    resume_slot: extracted.resume_slot,
                    next: tail,
                }))
            }
        };
        self.build_statements(&extracted.prologue, suspension)
    }

    /// Append a suspension-free statement payload.
    fn emit_exec(&mut self, stmt: Statement, next: Next) -> Result<Next, Unsupported> {
        if statement_contains_suspension(&stmt) {
            return Err(Unsupported::new(
                "suspension in an unsupported statement position",
            ));
        }
        Ok(Next::At(self.push(Instruction::Exec {
            stmt: Rc::new(stmt),
            next,
        })))
    }
}

fn is_slot_read(expr: &Expression, slot: &JsString) -> bool {
    matches!(expr, Expression::Identifier(id) if &id.name == slot)
}

// ===== Synthetic AST constructors =====

fn ident(name: &JsString) -> Expression {
    Expression::Identifier(Identifier {
        name: name.cheap_clone(),
    })
}

fn number(value: f64) -> Expression {
    Expression::Literal(Literal::Number(value))
}

fn bool_literal(value: bool) -> Expression {
    Expression::Literal(Literal::Boolean(value))
}

fn strict_eq(left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator: BinaryOperator::StrictEqual,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn let_statement(name: &JsString, init: Expression) -> Statement {
    single_declaration(
        VariableKind::Let,
        VariableDeclarator {
            id: Identifier {
                name: name.cheap_clone(),
            },
            init: Some(init),
        },
    )
}

fn assign_statement(name: &JsString, value: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression: Expression::Assignment(AssignmentExpression {
            operator: AssignmentOperator::Assign,
            target: Identifier {
                name: name.cheap_clone(),
            },
            value: Box::new(value),
        }),
    })
}

fn single_declaration(kind: VariableKind, declarator: VariableDeclarator) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![declarator],
    })
}
