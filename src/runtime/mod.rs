//! Runtime support: iterator handles, the await scheduler, and the
//! generator stepper.

pub mod awaiter;
pub mod stepper;

use std::cell::RefCell;
use std::rc::Rc;

pub use awaiter::{await_or_suspend, await_synchronously, is_thenable, AwaitOutcome, PendingSlot};
pub use stepper::{StepEvent, Stepper};

use crate::compiler;
use crate::env::Environment;
use crate::error::EngineError;
use crate::eval::{bind_parameters, Interpreter};
use crate::value::{
    CheapClone, DeclaredFunction, ExoticObject, JsObject, JsValue,
};

/// One protocol step of an iterator.
#[derive(Debug, Clone)]
pub struct IterStep {
    pub value: JsValue,
    pub done: bool,
}

impl IterStep {
    fn done_with(value: JsValue) -> Self {
        IterStep { value, done: true }
    }
}

/// A live iterator the runtime can advance. Arrays and strings iterate over
/// a snapshot; generators forward to their stepper.
#[derive(Debug)]
pub enum IteratorHandle {
    Array { values: Vec<JsValue>, index: usize },
    Generator(Rc<RefCell<Stepper>>),
}

impl IteratorHandle {
    pub fn next(
        &mut self,
        interp: &mut Interpreter,
        sent: JsValue,
    ) -> Result<IterStep, EngineError> {
        match self {
            IteratorHandle::Array { values, index } => {
                let step = match values.get(*index) {
                    Some(value) => IterStep {
                        value: value.cheap_clone(),
                        done: false,
                    },
                    None => IterStep::done_with(JsValue::Undefined),
                };
                *index += 1;
                Ok(step)
            }
            IteratorHandle::Generator(stepper) => {
                let event = borrow_stepper(stepper)?.next(interp, sent)?;
                event_to_step(event)
            }
        }
    }

    /// Forward an injected exception. Snapshot iterators have nothing to
    /// unwind, so the exception propagates immediately.
    pub fn throw_value(
        &mut self,
        interp: &mut Interpreter,
        error: JsValue,
    ) -> Result<IterStep, EngineError> {
        match self {
            IteratorHandle::Array { .. } => Err(EngineError::Thrown(error)),
            IteratorHandle::Generator(stepper) => {
                let event = borrow_stepper(stepper)?.throw_value(interp, error)?;
                event_to_step(event)
            }
        }
    }

    /// Forward an early return, closing the iterator.
    pub fn return_value(
        &mut self,
        interp: &mut Interpreter,
        value: JsValue,
    ) -> Result<IterStep, EngineError> {
        match self {
            IteratorHandle::Array { values, index } => {
                *index = values.len();
                Ok(IterStep::done_with(value))
            }
            IteratorHandle::Generator(stepper) => {
                let event = borrow_stepper(stepper)?.return_value(interp, value)?;
                event_to_step(event)
            }
        }
    }
}

fn borrow_stepper(
    stepper: &Rc<RefCell<Stepper>>,
) -> Result<std::cell::RefMut<'_, Stepper>, EngineError> {
    stepper
        .try_borrow_mut()
        .map_err(|_| EngineError::type_error("generator already running"))
}

fn event_to_step(event: StepEvent) -> Result<IterStep, EngineError> {
    match event {
        StepEvent::Yielded(value) => Ok(IterStep { value, done: false }),
        StepEvent::Done(value) => Ok(IterStep::done_with(value)),
        // Driving an async inner iterator from a synchronous protocol step
        // requires its awaits to settle synchronously.
        StepEvent::AwaitPending { .. } => Err(EngineError::UnsettledAwait),
    }
}

/// Obtain an iterator for a guest value.
pub fn get_iterator(value: &JsValue) -> Result<IteratorHandle, EngineError> {
    match value {
        JsValue::Object(object) => match &object.borrow().exotic {
            ExoticObject::Array(elements) => Ok(IteratorHandle::Array {
                values: elements.clone(),
                index: 0,
            }),
            ExoticObject::Generator(stepper) => {
                Ok(IteratorHandle::Generator(stepper.cheap_clone()))
            }
            _ => Err(EngineError::type_error(format!("{value} is not iterable"))),
        },
        JsValue::String(string) => Ok(IteratorHandle::Array {
            values: string
                .as_str()
                .chars()
                .map(|c| JsValue::string(c.to_string()))
                .collect(),
            index: 0,
        }),
        _ => Err(EngineError::type_error(format!("{value} is not iterable"))),
    }
}

/// Calling a generator function runs none of its body; it compiles the plan
/// (once per definition) and returns a suspended generator object.
pub fn instantiate_generator_value(
    interp: &mut Interpreter,
    declared: &Rc<DeclaredFunction>,
    args: &[JsValue],
) -> Result<JsValue, EngineError> {
    let plan = ensure_plan(interp, declared)?;
    let scope = Environment::child(&declared.closure);
    bind_parameters(&declared.params, args, &scope);
    let stepper = Stepper::new(plan, scope);
    Ok(JsValue::Object(JsObject::generator(Rc::new(RefCell::new(
        stepper,
    )))))
}

fn ensure_plan(
    interp: &mut Interpreter,
    declared: &Rc<DeclaredFunction>,
) -> Result<Rc<compiler::plan::Plan>, EngineError> {
    if let Some(plan) = declared.plan.borrow().as_ref() {
        return Ok(plan.cheap_clone());
    }
    let built = compiler::try_build(
        declared.name.as_ref(),
        &declared.body.body,
        declared.kind,
        &mut interp.build_stats,
    );
    match built {
        Ok(plan) => {
            *declared.plan.borrow_mut() = Some(plan.cheap_clone());
            Ok(plan)
        }
        Err(unsupported) => Err(EngineError::type_error(format!(
            "cannot compile generator: {unsupported}"
        ))),
    }
}
