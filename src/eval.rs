//! General evaluator: synchronous tree-walking execution of suspension-free
//! statements and expressions.
//!
//! The generator stepper uses this for every non-suspension instruction
//! payload. Suspension expressions (`yield`, `yield*`, `await`) never reach
//! it from a well-formed plan; encountering one is an internal error, not a
//! guest-visible condition.

use std::rc::Rc;

use crate::ast::{
    AssignmentOperator, BinaryOperator, Expression, ForInit, LogicalOperator, Statement,
    UnaryOperator, UpdateOperator, VariableDeclaration,
};
use crate::compiler::BuildStats;
use crate::env::Environment;
use crate::error::EngineError;
use crate::value::{
    CheapClone, DeclaredFunction, ExoticObject, FunctionKind, JsFunction, JsObject, JsString,
    JsValue, NativeFunction,
};

/// Statement completion: normal, or one of the abrupt kinds.
#[derive(Debug)]
pub enum Completion {
    Normal(JsValue),
    Return(JsValue),
    Break(Option<JsString>),
    Continue(Option<JsString>),
}

/// The evaluator plus the engine-wide state it carries (global scope and
/// build diagnostics).
pub struct Interpreter {
    globals: Rc<Environment>,
    pub build_stats: BuildStats,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            globals: Environment::new(),
            build_stats: BuildStats::default(),
        }
    }

    pub fn global_env(&self) -> Rc<Environment> {
        self.globals.cheap_clone()
    }

    pub fn define_global(&self, name: impl Into<JsString>, value: JsValue) {
        self.globals.define(name.into(), value);
    }

    /// Bind a native Rust function into the global scope.
    pub fn define_native(
        &self,
        name: &'static str,
        func: impl Fn(&mut Interpreter, &[JsValue]) -> Result<JsValue, EngineError> + 'static,
    ) {
        let value = JsValue::Object(JsObject::function(JsFunction::Native(NativeFunction::new(
            name, func,
        ))));
        self.define_global(name, value);
    }

    // ===== Statements =====

    pub fn exec_statements(
        &mut self,
        statements: &[Statement],
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        let mut last = JsValue::Undefined;
        for stmt in statements {
            match self.exec_statement(stmt, env)? {
                Completion::Normal(value) => last = value,
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(last))
    }

    pub fn exec_statement(
        &mut self,
        stmt: &Statement,
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        match stmt {
            Statement::Empty => Ok(Completion::Normal(JsValue::Undefined)),
            Statement::Expression(expr_stmt) => {
                let value = self.eval_expression(&expr_stmt.expression, env)?;
                Ok(Completion::Normal(value))
            }
            Statement::VariableDeclaration(decl) => {
                self.exec_variable_declaration(decl, env)?;
                Ok(Completion::Normal(JsValue::Undefined))
            }
            Statement::FunctionDeclaration(decl) => {
                let function = DeclaredFunction::new(
                    Some(decl.id.name.cheap_clone()),
                    decl.params.clone(),
                    decl.body.clone(),
                    function_kind(decl.generator, decl.async_)?,
                    env.cheap_clone(),
                );
                env.define(
                    decl.id.name.cheap_clone(),
                    JsValue::Object(JsObject::function(JsFunction::Declared(function))),
                );
                Ok(Completion::Normal(JsValue::Undefined))
            }
            Statement::Block(block) => {
                let scope = Environment::child(env);
                self.exec_statements(&block.body, &scope)
            }
            Statement::If(if_stmt) => {
                if self.eval_expression(&if_stmt.test, env)?.is_truthy() {
                    self.exec_statement(&if_stmt.consequent, env)
                } else if let Some(alternate) = &if_stmt.alternate {
                    self.exec_statement(alternate, env)
                } else {
                    Ok(Completion::Normal(JsValue::Undefined))
                }
            }
            Statement::While(while_stmt) => {
                self.exec_while(&while_stmt.test, &while_stmt.body, false, None, env)
            }
            Statement::DoWhile(do_stmt) => {
                self.exec_while(&do_stmt.test, &do_stmt.body, true, None, env)
            }
            Statement::For(for_stmt) => self.exec_for(for_stmt, None, env),
            Statement::ForOf(for_of) => self.exec_for_of(for_of, None, env),
            Statement::Switch(switch_stmt) => self.exec_switch(switch_stmt, env),
            Statement::Try(try_stmt) => self.exec_try(try_stmt, env),
            Statement::Return(ret) => {
                let value = match &ret.argument {
                    Some(expr) => self.eval_expression(expr, env)?,
                    None => JsValue::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Statement::Break(brk) => Ok(Completion::Break(
                brk.label.as_ref().map(|l| l.name.cheap_clone()),
            )),
            Statement::Continue(cont) => Ok(Completion::Continue(
                cont.label.as_ref().map(|l| l.name.cheap_clone()),
            )),
            Statement::Throw(throw_stmt) => {
                let value = self.eval_expression(&throw_stmt.argument, env)?;
                Err(EngineError::Thrown(value))
            }
            Statement::Labeled(labeled) => self.exec_labeled(labeled, env),
        }
    }

    fn exec_variable_declaration(
        &mut self,
        decl: &VariableDeclaration,
        env: &Rc<Environment>,
    ) -> Result<(), EngineError> {
        for declarator in &decl.declarations {
            let value = match &declarator.init {
                Some(init) => self.eval_expression(init, env)?,
                None => JsValue::Undefined,
            };
            env.define(declarator.id.name.cheap_clone(), value);
        }
        Ok(())
    }

    fn exec_labeled(
        &mut self,
        labeled: &crate::ast::LabeledStatement,
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        let label = &labeled.label.name;
        let completion = match labeled.body.as_ref() {
            Statement::While(w) => self.exec_while(&w.test, &w.body, false, Some(label), env)?,
            Statement::DoWhile(d) => self.exec_while(&d.test, &d.body, true, Some(label), env)?,
            Statement::For(f) => self.exec_for(f, Some(label), env)?,
            Statement::ForOf(f) => self.exec_for_of(f, Some(label), env)?,
            other => self.exec_statement(other, env)?,
        };
        match completion {
            Completion::Break(Some(l)) if &l == label => Ok(Completion::Normal(JsValue::Undefined)),
            other => Ok(other),
        }
    }

    fn exec_while(
        &mut self,
        test: &Expression,
        body: &Statement,
        test_after_body: bool,
        label: Option<&JsString>,
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        let mut first = true;
        loop {
            let run_body = test_after_body && first || self.eval_expression(test, env)?.is_truthy();
            first = false;
            if !run_body {
                return Ok(Completion::Normal(JsValue::Undefined));
            }
            match self.loop_iteration(body, label, env)? {
                LoopStep::Continue => {}
                LoopStep::Done => return Ok(Completion::Normal(JsValue::Undefined)),
                LoopStep::Abrupt(completion) => return Ok(completion),
            }
        }
    }

    fn exec_for(
        &mut self,
        for_stmt: &crate::ast::ForStatement,
        label: Option<&JsString>,
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        let scope = Environment::child(env);
        match &for_stmt.init {
            Some(ForInit::Declaration(decl)) => self.exec_variable_declaration(decl, &scope)?,
            Some(ForInit::Expression(expr)) => {
                self.eval_expression(expr, &scope)?;
            }
            None => {}
        }
        loop {
            if let Some(test) = &for_stmt.test {
                if !self.eval_expression(test, &scope)?.is_truthy() {
                    return Ok(Completion::Normal(JsValue::Undefined));
                }
            }
            match self.loop_iteration(&for_stmt.body, label, &scope)? {
                LoopStep::Continue => {}
                LoopStep::Done => return Ok(Completion::Normal(JsValue::Undefined)),
                LoopStep::Abrupt(completion) => return Ok(completion),
            }
            if let Some(update) = &for_stmt.update {
                self.eval_expression(update, &scope)?;
            }
        }
    }

    fn exec_for_of(
        &mut self,
        for_of: &crate::ast::ForOfStatement,
        label: Option<&JsString>,
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        if for_of.awaited {
            return Err(EngineError::internal(
                "for-await-of reached the general evaluator",
            ));
        }
        let iterable = self.eval_expression(&for_of.iterable, env)?;
        let mut iterator = crate::runtime::get_iterator(&iterable)?;
        loop {
            let step = iterator.next(self, JsValue::Undefined)?;
            if step.done {
                return Ok(Completion::Normal(JsValue::Undefined));
            }
            let scope = Environment::child(env);
            if for_of.declaration.is_some() {
                scope.define(for_of.binding.name.cheap_clone(), step.value);
            } else {
                env.set(&for_of.binding.name, step.value)?;
            }
            match self.loop_iteration(&for_of.body, label, &scope)? {
                LoopStep::Continue => {}
                LoopStep::Done => return Ok(Completion::Normal(JsValue::Undefined)),
                LoopStep::Abrupt(completion) => return Ok(completion),
            }
        }
    }

    /// Run one loop iteration and fold its completion into a loop action.
    fn loop_iteration(
        &mut self,
        body: &Statement,
        label: Option<&JsString>,
        env: &Rc<Environment>,
    ) -> Result<LoopStep, EngineError> {
        match self.exec_statement(body, env)? {
            Completion::Normal(_) => Ok(LoopStep::Continue),
            Completion::Continue(None) => Ok(LoopStep::Continue),
            Completion::Continue(Some(l)) if Some(&l) == label => Ok(LoopStep::Continue),
            Completion::Break(None) => Ok(LoopStep::Done),
            abrupt => Ok(LoopStep::Abrupt(abrupt)),
        }
    }

    fn exec_switch(
        &mut self,
        switch_stmt: &crate::ast::SwitchStatement,
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        let discriminant = self.eval_expression(&switch_stmt.discriminant, env)?;
        let mut matched = None;
        for (index, case) in switch_stmt.cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let test_value = self.eval_expression(test, env)?;
                if discriminant.strict_equals(&test_value) {
                    matched = Some(index);
                    break;
                }
            }
        }
        // `default` is selected only when no case matched, wherever it sits.
        if matched.is_none() {
            matched = switch_stmt.cases.iter().position(|c| c.test.is_none());
        }
        let Some(start) = matched else {
            return Ok(Completion::Normal(JsValue::Undefined));
        };
        let scope = Environment::child(env);
        for case in switch_stmt.cases.iter().skip(start) {
            match self.exec_statements(&case.consequent, &scope)? {
                Completion::Normal(_) => {}
                Completion::Break(None) => return Ok(Completion::Normal(JsValue::Undefined)),
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal(JsValue::Undefined))
    }

    fn exec_try(
        &mut self,
        try_stmt: &crate::ast::TryStatement,
        env: &Rc<Environment>,
    ) -> Result<Completion, EngineError> {
        let scope = Environment::child(env);
        let mut outcome = self.exec_statements(&try_stmt.block.body, &scope);

        if outcome.is_err() {
            if let Some(handler) = &try_stmt.handler {
                let err = match outcome {
                    Err(e) => e,
                    Ok(_) => return Err(EngineError::internal("try outcome changed shape")),
                };
                let thrown = err.into_guest_value()?;
                let catch_scope = Environment::child(env);
                if let Some(param) = &handler.param {
                    catch_scope.define(param.name.cheap_clone(), thrown);
                }
                outcome = self.exec_statements(&handler.body.body, &catch_scope);
            }
        }

        if let Some(finalizer) = &try_stmt.finalizer {
            let finally_scope = Environment::child(env);
            match self.exec_statements(&finalizer.body, &finally_scope)? {
                Completion::Normal(_) => {}
                // An abrupt finally completion overrides the try outcome.
                abrupt => return Ok(abrupt),
            }
        }

        outcome
    }

    // ===== Expressions =====

    pub fn eval_expression(
        &mut self,
        expr: &Expression,
        env: &Rc<Environment>,
    ) -> Result<JsValue, EngineError> {
        match expr {
            Expression::Literal(literal) => Ok(match literal {
                crate::ast::Literal::Number(n) => JsValue::Number(*n),
                crate::ast::Literal::String(s) => JsValue::String(s.cheap_clone()),
                crate::ast::Literal::Boolean(b) => JsValue::Boolean(*b),
                crate::ast::Literal::Null => JsValue::Null,
                crate::ast::Literal::Undefined => JsValue::Undefined,
            }),
            Expression::Identifier(ident) => env.get(&ident.name),
            Expression::Array(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(self.eval_expression(element, env)?);
                }
                Ok(JsValue::Object(JsObject::array(elements)))
            }
            Expression::Object(object) => {
                let result = JsObject::plain();
                for (key, value_expr) in &object.properties {
                    let value = self.eval_expression(value_expr, env)?;
                    result.borrow_mut().set(key.cheap_clone(), value);
                }
                Ok(JsValue::Object(result))
            }
            Expression::Unary(unary) => self.eval_unary(unary, env),
            Expression::Binary(binary) => {
                let left = self.eval_expression(&binary.left, env)?;
                let right = self.eval_expression(&binary.right, env)?;
                Ok(eval_binary_op(binary.operator, &left, &right))
            }
            Expression::Logical(logical) => {
                let left = self.eval_expression(&logical.left, env)?;
                let take_right = match logical.operator {
                    LogicalOperator::And => left.is_truthy(),
                    LogicalOperator::Or => !left.is_truthy(),
                    LogicalOperator::Nullish => left.is_null_or_undefined(),
                };
                if take_right {
                    self.eval_expression(&logical.right, env)
                } else {
                    Ok(left)
                }
            }
            Expression::Conditional(cond) => {
                if self.eval_expression(&cond.test, env)?.is_truthy() {
                    self.eval_expression(&cond.consequent, env)
                } else {
                    self.eval_expression(&cond.alternate, env)
                }
            }
            Expression::Assignment(assign) => {
                let value = self.eval_expression(&assign.value, env)?;
                let value = match assign.operator {
                    AssignmentOperator::Assign => value,
                    AssignmentOperator::AddAssign => {
                        let old = env.get(&assign.target.name)?;
                        eval_binary_op(BinaryOperator::Add, &old, &value)
                    }
                    AssignmentOperator::SubtractAssign => {
                        let old = env.get(&assign.target.name)?;
                        eval_binary_op(BinaryOperator::Subtract, &old, &value)
                    }
                };
                env.set(&assign.target.name, value.cheap_clone())?;
                Ok(value)
            }
            Expression::Update(update) => {
                let old = env.get(&update.target.name)?.to_number();
                let new = match update.operator {
                    UpdateOperator::Increment => old + 1.0,
                    UpdateOperator::Decrement => old - 1.0,
                };
                env.set(&update.target.name, JsValue::Number(new))?;
                Ok(JsValue::Number(if update.prefix { new } else { old }))
            }
            Expression::Member(member) => {
                let object = self.eval_expression(&member.object, env)?;
                let key = match &member.property {
                    crate::ast::MemberProperty::Dot(name) => name.cheap_clone(),
                    crate::ast::MemberProperty::Computed(expr) => {
                        JsString::from(self.eval_expression(expr, env)?.to_string())
                    }
                };
                self.get_property(&object, &key)
            }
            Expression::Call(call) => {
                let callee = self.eval_expression(&call.callee, env)?;
                let mut args = Vec::with_capacity(call.arguments.len());
                for arg in &call.arguments {
                    args.push(self.eval_expression(arg, env)?);
                }
                self.call_value(&callee, &args)
            }
            Expression::Function(func) => {
                let declared = DeclaredFunction::new(
                    func.id.as_ref().map(|id| id.name.cheap_clone()),
                    func.params.clone(),
                    func.body.clone(),
                    function_kind(func.generator, func.async_)?,
                    env.cheap_clone(),
                );
                Ok(JsValue::Object(JsObject::function(JsFunction::Declared(
                    declared,
                ))))
            }
            Expression::Yield(_) | Expression::Await(_) => Err(EngineError::internal(
                "suspension expression reached the general evaluator",
            )),
        }
    }

    fn eval_unary(
        &mut self,
        unary: &crate::ast::UnaryExpression,
        env: &Rc<Environment>,
    ) -> Result<JsValue, EngineError> {
        // `typeof missing` must not raise a ReferenceError.
        if unary.operator == UnaryOperator::TypeOf {
            if let Expression::Identifier(ident) = unary.argument.as_ref() {
                if !env.has(&ident.name) {
                    return Ok(JsValue::string("undefined"));
                }
            }
        }
        let value = self.eval_expression(&unary.argument, env)?;
        Ok(match unary.operator {
            UnaryOperator::Not => JsValue::Boolean(!value.is_truthy()),
            UnaryOperator::Minus => JsValue::Number(-value.to_number()),
            UnaryOperator::Plus => JsValue::Number(value.to_number()),
            UnaryOperator::TypeOf => JsValue::string(value.type_of()),
            UnaryOperator::Void => JsValue::Undefined,
        })
    }

    pub fn get_property(&self, object: &JsValue, key: &JsString) -> Result<JsValue, EngineError> {
        match object {
            JsValue::Object(obj) => Ok(obj.borrow().get(key.as_str())),
            JsValue::String(s) => Ok(if key.as_str() == "length" {
                JsValue::Number(s.as_str().chars().count() as f64)
            } else {
                JsValue::Undefined
            }),
            other => Err(EngineError::type_error(format!(
                "cannot read property '{key}' of {other}"
            ))),
        }
    }

    /// Invoke a callable value.
    pub fn call_value(
        &mut self,
        callee: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, EngineError> {
        let JsValue::Object(obj) = callee else {
            return Err(EngineError::type_error(format!("{callee} is not a function")));
        };
        let function = match &obj.borrow().exotic {
            ExoticObject::Function(function) => function.clone(),
            _ => return Err(EngineError::type_error(format!("{callee} is not a function"))),
        };
        match function {
            JsFunction::Native(native) => {
                let func = native.func.cheap_clone();
                func(self, args)
            }
            JsFunction::Declared(declared) => {
                if declared.kind.is_generator() {
                    return crate::runtime::instantiate_generator_value(self, &declared, args);
                }
                let scope = Environment::child(&declared.closure);
                bind_parameters(&declared.params, args, &scope);
                match self.exec_statements(&declared.body.body, &scope)? {
                    Completion::Return(value) => Ok(value),
                    Completion::Normal(_) => Ok(JsValue::Undefined),
                    Completion::Break(_) | Completion::Continue(_) => Err(EngineError::internal(
                        "break/continue escaped a function body",
                    )),
                }
            }
        }
    }
}

enum LoopStep {
    Continue,
    Done,
    Abrupt(Completion),
}

pub(crate) fn bind_parameters(
    params: &[crate::ast::Identifier],
    args: &[JsValue],
    scope: &Rc<Environment>,
) {
    for (index, param) in params.iter().enumerate() {
        let value = args.get(index).cloned().unwrap_or(JsValue::Undefined);
        scope.define(param.name.cheap_clone(), value);
    }
}

fn function_kind(generator: bool, async_: bool) -> Result<FunctionKind, EngineError> {
    match (generator, async_) {
        (true, false) => Ok(FunctionKind::Generator),
        (true, true) => Ok(FunctionKind::AsyncGenerator),
        (false, false) => Ok(FunctionKind::Normal),
        (false, true) => Err(EngineError::type_error(
            "plain async functions are outside this engine core",
        )),
    }
}

/// Binary operators never throw in this model; mismatched operands coerce.
fn eval_binary_op(op: BinaryOperator, left: &JsValue, right: &JsValue) -> JsValue {
    match op {
        BinaryOperator::Add => {
            if matches!(left, JsValue::String(_)) || matches!(right, JsValue::String(_)) {
                JsValue::string(format!("{left}{right}"))
            } else {
                JsValue::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOperator::Subtract => JsValue::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiply => JsValue::Number(left.to_number() * right.to_number()),
        BinaryOperator::Divide => JsValue::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => JsValue::Number(left.to_number() % right.to_number()),
        BinaryOperator::LessThan => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOperator::LessEqual => compare(left, right, |o| o != std::cmp::Ordering::Greater),
        BinaryOperator::GreaterThan => compare(left, right, |o| o == std::cmp::Ordering::Greater),
        BinaryOperator::GreaterEqual => compare(left, right, |o| o != std::cmp::Ordering::Less),
        BinaryOperator::Equal => JsValue::Boolean(left.loose_equals(right)),
        BinaryOperator::NotEqual => JsValue::Boolean(!left.loose_equals(right)),
        BinaryOperator::StrictEqual => JsValue::Boolean(left.strict_equals(right)),
        BinaryOperator::StrictNotEqual => JsValue::Boolean(!left.strict_equals(right)),
    }
}

fn compare(left: &JsValue, right: &JsValue, pick: impl Fn(std::cmp::Ordering) -> bool) -> JsValue {
    if let (JsValue::String(a), JsValue::String(b)) = (left, right) {
        return JsValue::Boolean(pick(a.as_str().cmp(b.as_str())));
    }
    match left.to_number().partial_cmp(&right.to_number()) {
        Some(ordering) => JsValue::Boolean(pick(ordering)),
        // NaN comparisons are always false.
        None => JsValue::Boolean(false),
    }
}
