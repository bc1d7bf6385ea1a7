//! An embeddable generator and async-generator core for a small JavaScript
//! engine.
//!
//! Generator function bodies are compiled once into a flat, immutable
//! [`compiler::Plan`], an instruction array where every instruction names
//! its successor, and each invocation is driven by a
//! [`runtime::Stepper`] holding a program counter, a try-region stack, and
//! iterator slots. Suspension is a return to the caller, not a thread or a
//! native coroutine, so a host can hold thousands of suspended generators
//! and advance any of them at will.
//!
//! Bodies the compiler cannot express (for example two suspension points in
//! a shape the lowerer cannot split) are declined with a reasoned
//! [`compiler::Unsupported`] rather than miscompiled.
//!
//! ```
//! use jsgen::ast::*;
//! use jsgen::{Engine, FunctionKind, JsValue, StepEvent};
//!
//! # fn main() -> Result<(), jsgen::EngineError> {
//! let mut engine = Engine::new();
//! // function* count() { yield 1; }
//! let body = vec![Statement::Expression(ExpressionStatement {
//!     expression: Expression::Yield(YieldExpression {
//!         argument: Some(Box::new(Expression::Literal(Literal::Number(1.0)))),
//!         delegate: false,
//!     }),
//! })];
//! let count = engine.define_generator("count", Vec::new(), body, FunctionKind::Generator);
//! let instance = engine.instantiate(&count, &[])?;
//! let event = instance.next(&mut engine, JsValue::Undefined)?;
//! assert!(matches!(event, StepEvent::Yielded(JsValue::Number(n)) if n == 1.0));
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod compiler;
pub mod env;
pub mod error;
pub mod eval;
pub mod runtime;
pub mod value;

use std::cell::RefCell;
use std::rc::Rc;

pub use compiler::{BuildObserver, BuildStats, NullObserver, Unsupported};
pub use error::EngineError;
pub use eval::Interpreter;
pub use runtime::{StepEvent, Stepper};
pub use value::{CheapClone, FunctionKind, JsString, JsValue};

use ast::{BlockStatement, Identifier, Statement};
use value::{DeclaredFunction, ExoticObject, JsFunction, JsObject};

/// Convenience facade over an [`Interpreter`]: define guest functions and
/// globals, run statements, and drive generator instances.
pub struct Engine {
    interp: Interpreter,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            interp: Interpreter::new(),
        }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    pub fn define_global(&mut self, name: impl Into<JsString>, value: JsValue) {
        self.interp.define_global(name, value);
    }

    pub fn define_native(
        &mut self,
        name: &'static str,
        func: impl Fn(&mut Interpreter, &[JsValue]) -> Result<JsValue, EngineError> + 'static,
    ) {
        self.interp.define_native(name, func);
    }

    /// Declare a generator (or async generator) function in the global
    /// scope and return its definition for direct instantiation.
    pub fn define_generator(
        &mut self,
        name: &str,
        params: Vec<Identifier>,
        body: Vec<Statement>,
        kind: FunctionKind,
    ) -> Rc<DeclaredFunction> {
        let function = DeclaredFunction::new(
            Some(JsString::from(name)),
            params,
            BlockStatement { body },
            kind,
            self.interp.global_env(),
        );
        self.interp.define_global(
            name,
            JsValue::Object(JsObject::function(JsFunction::Declared(
                function.cheap_clone(),
            ))),
        );
        function
    }

    /// Run top-level statements in the global scope, returning the value of
    /// the last expression statement.
    pub fn run_statements(&mut self, statements: &[Statement]) -> Result<JsValue, EngineError> {
        let env = self.interp.global_env();
        match self.interp.exec_statements(statements, &env)? {
            eval::Completion::Normal(value) | eval::Completion::Return(value) => Ok(value),
            eval::Completion::Break(_) | eval::Completion::Continue(_) => Err(
                EngineError::internal("break/continue escaped the top level"),
            ),
        }
    }

    /// Instantiate a generator function: compiles (or reuses) its plan and
    /// returns a fresh suspended instance. Runs none of the body.
    pub fn instantiate(
        &mut self,
        function: &Rc<DeclaredFunction>,
        args: &[JsValue],
    ) -> Result<GeneratorInstance, EngineError> {
        let value = runtime::instantiate_generator_value(&mut self.interp, function, args)?;
        GeneratorInstance::from_value(&value)
            .ok_or_else(|| EngineError::internal("instantiation did not produce a generator"))
    }

    /// Build diagnostics accumulated by this engine's interpreter.
    pub fn build_stats(&self) -> &BuildStats {
        &self.interp.build_stats
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// A handle on one generator instance.
#[derive(Clone)]
pub struct GeneratorInstance {
    stepper: Rc<RefCell<Stepper>>,
}

impl GeneratorInstance {
    /// Unwrap a guest value produced by calling a generator function.
    pub fn from_value(value: &JsValue) -> Option<Self> {
        let JsValue::Object(object) = value else {
            return None;
        };
        let ExoticObject::Generator(stepper) = &object.borrow().exotic else {
            return None;
        };
        Some(GeneratorInstance {
            stepper: stepper.cheap_clone(),
        })
    }

    pub fn next(&self, engine: &mut Engine, value: JsValue) -> Result<StepEvent, EngineError> {
        self.borrow()?.next(&mut engine.interp, value)
    }

    pub fn throw(&self, engine: &mut Engine, error: JsValue) -> Result<StepEvent, EngineError> {
        self.borrow()?.throw_value(&mut engine.interp, error)
    }

    pub fn return_value(
        &self,
        engine: &mut Engine,
        value: JsValue,
    ) -> Result<StepEvent, EngineError> {
        self.borrow()?.return_value(&mut engine.interp, value)
    }

    /// Continue after an [`StepEvent::AwaitPending`] once its slot has been
    /// settled.
    pub fn resume_await(&self, engine: &mut Engine) -> Result<StepEvent, EngineError> {
        self.borrow()?.resume_await(&mut engine.interp)
    }

    pub fn is_completed(&self) -> bool {
        self.stepper
            .try_borrow()
            .map(|stepper| stepper.is_completed())
            .unwrap_or(false)
    }

    fn borrow(&self) -> Result<std::cell::RefMut<'_, Stepper>, EngineError> {
        self.stepper
            .try_borrow_mut()
            .map_err(|_| EngineError::type_error("generator already running"))
    }
}
