//! The await scheduler.
//!
//! `await` is modeled without an event loop: a thenable's `then` is invoked
//! immediately with native resolve/reject callbacks that write into a shared
//! settlement slot. If the slot is filled by the time `then` returns, the
//! await settled synchronously and execution proceeds inline. If not, the
//! outcome is `Pending` and the caller decides whether to surface a
//! suspension (async stepping) or fail (the synchronous path).

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::EngineError;
use crate::eval::Interpreter;
use crate::value::{JsFunction, JsObject, JsString, JsValue, NativeFunction};

/// Shared settlement slot written by the resolve/reject callbacks handed to
/// a thenable. `Ok` is resolution, `Err` is rejection (a guest value, not a
/// host error). First write wins.
pub type PendingSlot = Rc<RefCell<Option<Result<JsValue, JsValue>>>>;

pub enum AwaitOutcome {
    /// The operand was not a thenable, or its `then` settled before
    /// returning.
    Settled(Result<JsValue, JsValue>),
    /// `then` returned without settling. The slot will be written whenever
    /// the host settles it; the original thenable rides along for
    /// diagnostics.
    Pending { promise: JsValue, slot: PendingSlot },
}

/// An object with a callable `then` property participates in `await`.
pub fn is_thenable(interp: &Interpreter, value: &JsValue) -> Result<bool, EngineError> {
    if !matches!(value, JsValue::Object(_)) {
        return Ok(false);
    }
    let then = interp.get_property(value, &JsString::from("then"))?;
    Ok(then.is_callable())
}

/// Resolve an awaited operand, suspending on unsettled thenables.
pub fn await_or_suspend(
    interp: &mut Interpreter,
    value: JsValue,
) -> Result<AwaitOutcome, EngineError> {
    if !is_thenable(interp, &value)? {
        return Ok(AwaitOutcome::Settled(Ok(value)));
    }
    let slot = subscribe(interp, &value)?;
    let settled = slot.borrow().clone();
    match settled {
        Some(result) => Ok(AwaitOutcome::Settled(result)),
        None => Ok(AwaitOutcome::Pending {
            promise: value,
            slot,
        }),
    }
}

/// Resolve an awaited operand on the blocking path, where an unsettled
/// thenable is fatal rather than a suspension.
pub fn await_synchronously(
    interp: &mut Interpreter,
    value: JsValue,
) -> Result<JsValue, EngineError> {
    match await_or_suspend(interp, value)? {
        AwaitOutcome::Settled(Ok(resolved)) => Ok(resolved),
        AwaitOutcome::Settled(Err(rejected)) => Err(EngineError::Thrown(rejected)),
        AwaitOutcome::Pending { .. } => Err(EngineError::UnsettledAwait),
    }
}

/// Call the thenable's `then` with resolve/reject callbacks wired to a
/// fresh settlement slot.
fn subscribe(interp: &mut Interpreter, thenable: &JsValue) -> Result<PendingSlot, EngineError> {
    let slot: PendingSlot = Rc::new(RefCell::new(None));
    subscribe_into(interp, thenable, &slot)?;
    Ok(slot)
}

/// Wire one thenable's `then` into `slot`. A resolution value that is
/// itself a thenable chains into the same slot instead of settling it, so
/// nested thenables flatten to their innermost settlement.
fn subscribe_into(
    interp: &mut Interpreter,
    thenable: &JsValue,
    slot: &PendingSlot,
) -> Result<(), EngineError> {
    let then = interp.get_property(thenable, &JsString::from("then"))?;

    let resolve_slot = Rc::clone(slot);
    let resolve = native_callback("resolve", move |interp, args| {
        if resolve_slot.borrow().is_some() {
            return Ok(());
        }
        let value = first_arg(args);
        if is_thenable(interp, &value)? {
            subscribe_into(interp, &value, &resolve_slot)
        } else {
            *resolve_slot.borrow_mut() = Some(Ok(value));
            Ok(())
        }
    });
    let reject_slot = Rc::clone(slot);
    let reject = native_callback("reject", move |_interp, args| {
        let mut cell = reject_slot.borrow_mut();
        if cell.is_none() {
            *cell = Some(Err(first_arg(args)));
        }
        Ok(())
    });

    interp.call_value(&then, &[resolve, reject])?;
    Ok(())
}

fn native_callback(
    name: &'static str,
    effect: impl Fn(&mut Interpreter, &[JsValue]) -> Result<(), EngineError> + 'static,
) -> JsValue {
    JsValue::Object(JsObject::function(JsFunction::Native(NativeFunction::new(
        name,
        move |interp, args| {
            effect(interp, args)?;
            Ok(JsValue::Undefined)
        },
    ))))
}

fn first_arg(args: &[JsValue]) -> JsValue {
    args.first().cloned().unwrap_or(JsValue::Undefined)
}
