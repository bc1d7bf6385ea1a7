//! The generator stepper: a program counter walking a compiled [`Plan`].
//!
//! One stepper exists per generator instance. Between external calls it
//! holds where execution suspended and what the runtime try-region stack
//! looked like; everything else (variables, resume slots, catch slots)
//! lives in the instance's environment, so the general evaluator reads
//! resumed values with no special casing.

use std::rc::Rc;

use crate::compiler::plan::{CatchSite, Instruction, Next, Plan};
use crate::env::Environment;
use crate::error::EngineError;
use crate::eval::{Completion, Interpreter};
use crate::value::{JsString, JsValue};

use super::awaiter::{self, AwaitOutcome, PendingSlot};
use super::{get_iterator, IteratorHandle};

/// Outcome of one external step.
#[derive(Debug)]
pub enum StepEvent {
    /// The generator suspended at a yield, surfacing this value.
    Yielded(JsValue),
    /// The generator completed with this value. Repeat calls keep
    /// producing `Done(undefined)`.
    Done(JsValue),
    /// An async generator hit an await whose thenable did not settle
    /// synchronously. Settle `slot`, then call
    /// [`Stepper::resume_await`].
    AwaitPending { promise: JsValue, slot: PendingSlot },
}

/// A try region live on the stepper's runtime stack.
#[derive(Debug)]
struct TryRegion {
    catch: Option<CatchSite>,
    finally: Option<Next>,
    after: Next,
    phase: RegionPhase,
    /// What to do after the finally body finishes, when phase is `Finally`.
    pending: Option<PendingCompletion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionPhase {
    Try,
    Catch,
    Finally,
}

/// The completion a finally body defers.
#[derive(Debug)]
enum PendingCompletion {
    Normal { next: Next },
    Throw(JsValue),
    Return(JsValue),
    /// A break/continue still needing to exit `regions` more regions
    /// before transferring to `target`.
    Jump { target: Next, regions: usize },
}

#[derive(Debug)]
enum StepperState {
    /// Created, never stepped.
    SuspendedStart,
    SuspendedYield(Suspension),
    Executing,
    Completed,
}

/// Where and how execution suspended.
#[derive(Debug)]
struct Suspension {
    kind: SuspendKind,
}

#[derive(Debug)]
enum SuspendKind {
    /// The resume value lands in `resume_slot`; execution continues at
    /// `next`.
    Yield { resume_slot: JsString, next: Next },
    /// Suspended inside `yield*`; external calls forward to the inner
    /// iterator behind the `YieldDelegate` at this instruction index.
    Delegate { index: usize },
    /// Suspended on an unsettled await.
    Await {
        resume_slot: JsString,
        next: Next,
        slot: PendingSlot,
    },
    /// Suspended awaiting the element value of a `for await…of` step; the
    /// `IteratorNext` at this index says how to bind it.
    AwaitIterator { index: usize, slot: PendingSlot },
}

/// Instruction dispatch outcome: transfer control or surface an event.
enum Flow {
    Goto(Next),
    Event(StepEvent),
}

enum Unwound {
    Continue(Next),
    Finished(JsValue),
}

/// Operation forwarded through a `yield*` delegation.
enum DelegateOp {
    Next(JsValue),
    Throw(JsValue),
    Return(JsValue),
}

pub struct Stepper {
    plan: Rc<Plan>,
    /// Function-activation scope: parameters, locals, resume and catch
    /// slots.
    env: Rc<Environment>,
    state: StepperState,
    regions: Vec<TryRegion>,
    iterators: Vec<Option<IteratorHandle>>,
}

impl std::fmt::Debug for Stepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self
            .plan
            .function_name
            .as_ref()
            .map(JsString::as_str)
            .unwrap_or("<anonymous>");
        write!(f, "[stepper {name} {:?}]", self.state)
    }
}

impl Stepper {
    pub fn new(plan: Rc<Plan>, env: Rc<Environment>) -> Self {
        let iterators = (0..plan.iterator_slots).map(|_| None).collect();
        Stepper {
            plan,
            env,
            state: StepperState::SuspendedStart,
            regions: Vec::new(),
            iterators,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, StepperState::Completed)
    }

    /// Advance the generator, supplying `value` as the result of the yield
    /// it suspended at. On a fresh generator the value is discarded.
    pub fn next(
        &mut self,
        interp: &mut Interpreter,
        value: JsValue,
    ) -> Result<StepEvent, EngineError> {
        match std::mem::replace(&mut self.state, StepperState::Executing) {
            StepperState::Completed => {
                self.state = StepperState::Completed;
                Ok(StepEvent::Done(JsValue::Undefined))
            }
            StepperState::Executing => {
                self.state = StepperState::Executing;
                Err(EngineError::type_error("generator already running"))
            }
            StepperState::SuspendedStart => self.run(interp, self.plan.entry),
            StepperState::SuspendedYield(suspension) => match suspension.kind {
                SuspendKind::Yield { resume_slot, next } => {
                    self.env.define(resume_slot, value);
                    self.run(interp, next)
                }
                SuspendKind::Delegate { index } => {
                    let flow = self.delegate_step(interp, index, DelegateOp::Next(value))?;
                    self.continue_flow(interp, flow)
                }
                awaiting => self.resume_if_settled(interp, awaiting),
            },
        }
    }

    /// Inject an exception at the suspension point.
    pub fn throw_value(
        &mut self,
        interp: &mut Interpreter,
        error: JsValue,
    ) -> Result<StepEvent, EngineError> {
        match std::mem::replace(&mut self.state, StepperState::Executing) {
            // A completed instance swallows the injected exception, same as
            // `next`: every call reports "already done".
            StepperState::Completed => {
                self.state = StepperState::Completed;
                Ok(StepEvent::Done(JsValue::Undefined))
            }
            StepperState::Executing => {
                self.state = StepperState::Executing;
                Err(EngineError::type_error("generator already running"))
            }
            // Never started: no regions exist, so the exception cannot be
            // caught by the body.
            StepperState::SuspendedStart => {
                self.state = StepperState::Completed;
                Err(EngineError::Thrown(error))
            }
            StepperState::SuspendedYield(suspension) => match suspension.kind {
                SuspendKind::Yield { .. } => self.throw_at(interp, error),
                SuspendKind::Delegate { index } => {
                    let flow = self.delegate_step(interp, index, DelegateOp::Throw(error))?;
                    self.continue_flow(interp, flow)
                }
                awaiting => {
                    self.state = StepperState::SuspendedYield(Suspension { kind: awaiting });
                    Err(EngineError::type_error("generator is awaiting a promise"))
                }
            },
        }
    }

    /// Inject a return at the suspension point, running pending finallies
    /// on the way out.
    pub fn return_value(
        &mut self,
        interp: &mut Interpreter,
        value: JsValue,
    ) -> Result<StepEvent, EngineError> {
        match std::mem::replace(&mut self.state, StepperState::Executing) {
            StepperState::Completed => {
                self.state = StepperState::Completed;
                Ok(StepEvent::Done(JsValue::Undefined))
            }
            StepperState::Executing => {
                self.state = StepperState::Executing;
                Err(EngineError::type_error("generator already running"))
            }
            StepperState::SuspendedStart => {
                self.state = StepperState::Completed;
                Ok(StepEvent::Done(value))
            }
            StepperState::SuspendedYield(suspension) => match suspension.kind {
                SuspendKind::Yield { .. } => match self.begin_return(value) {
                    Unwound::Continue(next) => self.run(interp, next),
                    Unwound::Finished(result) => Ok(self.finish(result)),
                },
                SuspendKind::Delegate { index } => {
                    let flow = self.delegate_step(interp, index, DelegateOp::Return(value))?;
                    self.continue_flow(interp, flow)
                }
                awaiting => {
                    self.state = StepperState::SuspendedYield(Suspension { kind: awaiting });
                    Err(EngineError::type_error("generator is awaiting a promise"))
                }
            },
        }
    }

    /// Continue after an `AwaitPending` event once the slot has been
    /// settled.
    pub fn resume_await(&mut self, interp: &mut Interpreter) -> Result<StepEvent, EngineError> {
        match std::mem::replace(&mut self.state, StepperState::Executing) {
            StepperState::SuspendedYield(suspension)
                if matches!(
                    suspension.kind,
                    SuspendKind::Await { .. } | SuspendKind::AwaitIterator { .. }
                ) =>
            {
                self.resume_if_settled(interp, suspension.kind)
            }
            other => {
                self.state = other;
                Err(EngineError::type_error(
                    "generator is not suspended on an await",
                ))
            }
        }
    }

    fn resume_if_settled(
        &mut self,
        interp: &mut Interpreter,
        awaiting: SuspendKind,
    ) -> Result<StepEvent, EngineError> {
        let settled = match &awaiting {
            SuspendKind::Await { slot, .. } | SuspendKind::AwaitIterator { slot, .. } => {
                slot.borrow_mut().take()
            }
            _ => {
                self.state = StepperState::Completed;
                return Err(EngineError::internal("await resume without an await"));
            }
        };
        match settled {
            None => {
                self.state = StepperState::SuspendedYield(Suspension { kind: awaiting });
                Err(EngineError::UnsettledAwait)
            }
            Some(Ok(value)) => match awaiting {
                SuspendKind::Await {
                    resume_slot, next, ..
                } => {
                    self.env.define(resume_slot, value);
                    self.run(interp, next)
                }
                SuspendKind::AwaitIterator { index, .. } => {
                    let flow = self.bind_iteration(interp, index, value)?;
                    self.continue_flow(interp, flow)
                }
                _ => Err(EngineError::internal("await resume without an await")),
            },
            Some(Err(rejected)) => self.throw_at(interp, rejected),
        }
    }

    // ===== Execution loop =====

    fn run(&mut self, interp: &mut Interpreter, entry: Next) -> Result<StepEvent, EngineError> {
        self.state = StepperState::Executing;
        let mut next = entry;
        loop {
            let index = match next {
                Next::Done => {
                    debug_assert!(self.regions.is_empty(), "plan completed inside a try region");
                    return Ok(self.finish(JsValue::Undefined));
                }
                Next::At(index) => index,
            };
            match self.step(interp, index)? {
                Flow::Goto(target) => next = target,
                Flow::Event(event) => return Ok(event),
            }
        }
    }

    fn continue_flow(
        &mut self,
        interp: &mut Interpreter,
        flow: Flow,
    ) -> Result<StepEvent, EngineError> {
        match flow {
            Flow::Goto(next) => self.run(interp, next),
            Flow::Event(event) => Ok(event),
        }
    }

    /// Execute one instruction.
    fn step(&mut self, interp: &mut Interpreter, index: usize) -> Result<Flow, EngineError> {
        let instruction = match self.plan.get(index) {
            Some(instruction) => instruction.clone(),
            None => return self.fatal("instruction index out of range"),
        };
        match instruction {
            Instruction::Exec { stmt, next } => match interp.exec_statement(&stmt, &self.env) {
                Ok(Completion::Normal(_)) => Ok(Flow::Goto(next)),
                Ok(_) => self.fatal("abrupt completion escaped a plan instruction"),
                Err(error) => self.handle_error(error).map(Flow::Goto),
            },
            Instruction::Branch {
                test,
                if_true,
                if_false,
            } => match interp.eval_expression(&test, &self.env) {
                Ok(value) => Ok(Flow::Goto(if value.is_truthy() { if_true } else { if_false })),
                Err(error) => self.handle_error(error).map(Flow::Goto),
            },
            Instruction::Jump { next } => Ok(Flow::Goto(next)),
            Instruction::ExitRegions { regions, target } => {
                self.exit_regions(regions, target).map(Flow::Goto)
            }
            Instruction::Yield {
                operand,
                resume_slot,
                next,
            } => {
                let value = match operand {
                    Some(expr) => match interp.eval_expression(&expr, &self.env) {
                        Ok(value) => value,
                        Err(error) => return self.handle_error(error).map(Flow::Goto),
                    },
                    None => JsValue::Undefined,
                };
                self.state = StepperState::SuspendedYield(Suspension {
                    kind: SuspendKind::Yield { resume_slot, next },
                });
                Ok(Flow::Event(StepEvent::Yielded(value)))
            }
            Instruction::YieldDelegate {
                iterable,
                state_slot,
                ..
            } => {
                // First arrival: create the inner iterator, then drive it
                // exactly like a resumed delegation with no input.
                let iterator = match interp.eval_expression(&iterable, &self.env) {
                    Ok(value) => match get_iterator(&value) {
                        Ok(iterator) => iterator,
                        Err(error) => return self.handle_error(error).map(Flow::Goto),
                    },
                    Err(error) => return self.handle_error(error).map(Flow::Goto),
                };
                self.set_iterator(state_slot, iterator)?;
                self.delegate_step(interp, index, DelegateOp::Next(JsValue::Undefined))
            }
            Instruction::Await {
                operand,
                resume_slot,
                next,
            } => {
                let value = match interp.eval_expression(&operand, &self.env) {
                    Ok(value) => value,
                    Err(error) => return self.handle_error(error).map(Flow::Goto),
                };
                match awaiter::await_or_suspend(interp, value) {
                    Ok(AwaitOutcome::Settled(Ok(resolved))) => {
                        self.env.define(resume_slot, resolved);
                        Ok(Flow::Goto(next))
                    }
                    Ok(AwaitOutcome::Settled(Err(rejected))) => self
                        .dispatch_throw(rejected)
                        .map(Flow::Goto),
                    Ok(AwaitOutcome::Pending { promise, slot }) => {
                        self.state = StepperState::SuspendedYield(Suspension {
                            kind: SuspendKind::Await {
                                resume_slot,
                                next,
                                slot: Rc::clone(&slot),
                            },
                        });
                        Ok(Flow::Event(StepEvent::AwaitPending { promise, slot }))
                    }
                    Err(error) => self.handle_error(error).map(Flow::Goto),
                }
            }
            Instruction::Return { operand } => {
                let value = match operand {
                    Some(expr) => match interp.eval_expression(&expr, &self.env) {
                        Ok(value) => value,
                        Err(error) => return self.handle_error(error).map(Flow::Goto),
                    },
                    None => JsValue::Undefined,
                };
                match self.begin_return(value) {
                    Unwound::Continue(next) => Ok(Flow::Goto(next)),
                    Unwound::Finished(result) => Ok(Flow::Event(self.finish(result))),
                }
            }
            Instruction::EnterTry {
                catch,
                finally,
                after,
                body,
            } => {
                self.regions.push(TryRegion {
                    catch,
                    finally,
                    after,
                    phase: RegionPhase::Try,
                    pending: None,
                });
                Ok(Flow::Goto(body))
            }
            Instruction::LeaveTry => {
                let Some(region) = self.regions.last_mut() else {
                    return self.fatal("leave without an open try region");
                };
                match region.finally {
                    Some(finally) => {
                        region.phase = RegionPhase::Finally;
                        region.pending = Some(PendingCompletion::Normal {
                            next: region.after,
                        });
                        Ok(Flow::Goto(finally))
                    }
                    None => {
                        let after = region.after;
                        self.regions.pop();
                        Ok(Flow::Goto(after))
                    }
                }
            }
            Instruction::EndFinally => {
                let Some(region) = self.regions.pop() else {
                    return self.fatal("finally ended without an open try region");
                };
                match region.pending {
                    Some(PendingCompletion::Normal { next }) => Ok(Flow::Goto(next)),
                    Some(PendingCompletion::Throw(value)) => {
                        self.dispatch_throw(value).map(Flow::Goto)
                    }
                    Some(PendingCompletion::Return(value)) => match self.begin_return(value) {
                        Unwound::Continue(next) => Ok(Flow::Goto(next)),
                        Unwound::Finished(result) => Ok(Flow::Event(self.finish(result))),
                    },
                    Some(PendingCompletion::Jump { target, regions }) => {
                        self.exit_regions(regions, target).map(Flow::Goto)
                    }
                    None => self.fatal("finally ended with no pending completion"),
                }
            }
            Instruction::IteratorInit {
                iterable,
                state_slot,
                awaited,
                next,
            } => {
                let value = match interp.eval_expression(&iterable, &self.env) {
                    Ok(value) => value,
                    Err(error) => return self.handle_error(error).map(Flow::Goto),
                };
                // An awaited driver accepts a thenable iterable, as long as
                // it settles during its `then` call.
                let value = if awaited {
                    match awaiter::await_synchronously(interp, value) {
                        Ok(value) => value,
                        Err(error) => return self.handle_error(error).map(Flow::Goto),
                    }
                } else {
                    value
                };
                let iterator = match get_iterator(&value) {
                    Ok(iterator) => iterator,
                    Err(error) => return self.handle_error(error).map(Flow::Goto),
                };
                self.set_iterator(state_slot, iterator)?;
                Ok(Flow::Goto(next))
            }
            Instruction::IteratorNext {
                state_slot,
                awaited,
                done,
                ..
            } => {
                let step = {
                    let Some(Some(iterator)) = self.iterators.get_mut(state_slot) else {
                        return self.fatal("iterator slot used before initialization");
                    };
                    iterator.next(interp, JsValue::Undefined)
                };
                match step {
                    Err(error) => self.handle_error(error).map(Flow::Goto),
                    Ok(step) if step.done => Ok(Flow::Goto(done)),
                    Ok(step) if awaited => match awaiter::await_or_suspend(interp, step.value) {
                        Ok(AwaitOutcome::Settled(Ok(resolved))) => {
                            self.bind_iteration(interp, index, resolved)
                        }
                        Ok(AwaitOutcome::Settled(Err(rejected))) => {
                            self.dispatch_throw(rejected).map(Flow::Goto)
                        }
                        Ok(AwaitOutcome::Pending { promise, slot }) => {
                            self.state = StepperState::SuspendedYield(Suspension {
                                kind: SuspendKind::AwaitIterator {
                                    index,
                                    slot: Rc::clone(&slot),
                                },
                            });
                            Ok(Flow::Event(StepEvent::AwaitPending { promise, slot }))
                        }
                        Err(error) => self.handle_error(error).map(Flow::Goto),
                    },
                    Ok(step) => self.bind_iteration(interp, index, step.value),
                }
            }
        }
    }

    /// Bind one iteration value per the `IteratorNext` at `index` and enter
    /// the loop body.
    fn bind_iteration(
        &mut self,
        _interp: &mut Interpreter,
        index: usize,
        value: JsValue,
    ) -> Result<Flow, EngineError> {
        let Some(Instruction::IteratorNext {
            binding,
            declares,
            body,
            ..
        }) = self.plan.get(index).cloned()
        else {
            return self.fatal("iteration resume at a non-iterator instruction");
        };
        if declares {
            self.env.define(binding, value);
        } else if let Err(error) = self.env.set(&binding, value) {
            return self.handle_error(error).map(Flow::Goto);
        }
        Ok(Flow::Goto(body))
    }

    // ===== yield* delegation =====

    fn delegate_step(
        &mut self,
        interp: &mut Interpreter,
        index: usize,
        op: DelegateOp,
    ) -> Result<Flow, EngineError> {
        let Some(Instruction::YieldDelegate {
            state_slot,
            resume_slot,
            next,
            ..
        }) = self.plan.get(index).cloned()
        else {
            return self.fatal("delegation resume at a non-delegate instruction");
        };
        let forwarded_return = matches!(op, DelegateOp::Return(_));
        let result = {
            let Some(Some(iterator)) = self.iterators.get_mut(state_slot) else {
                return self.fatal("delegation without an inner iterator");
            };
            match op {
                DelegateOp::Next(value) => iterator.next(interp, value),
                DelegateOp::Throw(value) => iterator.throw_value(interp, value),
                DelegateOp::Return(value) => iterator.return_value(interp, value),
            }
        };
        match result {
            Err(error) => {
                self.clear_iterator(state_slot);
                self.handle_error(error).map(Flow::Goto)
            }
            Ok(step) if step.done => {
                self.clear_iterator(state_slot);
                if forwarded_return {
                    // The inner iterator honored the return; keep unwinding
                    // the outer generator with its completion value.
                    match self.begin_return(step.value) {
                        Unwound::Continue(next) => Ok(Flow::Goto(next)),
                        Unwound::Finished(result) => Ok(Flow::Event(self.finish(result))),
                    }
                } else {
                    self.env.define(resume_slot, step.value);
                    Ok(Flow::Goto(next))
                }
            }
            Ok(step) => {
                self.state = StepperState::SuspendedYield(Suspension {
                    kind: SuspendKind::Delegate { index },
                });
                Ok(Flow::Event(StepEvent::Yielded(step.value)))
            }
        }
    }

    // ===== Completion plumbing =====

    /// Route a guest exception through the region stack. Uncaught, the
    /// generator completes and the exception propagates to the caller.
    fn dispatch_throw(&mut self, value: JsValue) -> Result<Next, EngineError> {
        loop {
            let Some(region) = self.regions.last_mut() else {
                self.state = StepperState::Completed;
                return Err(EngineError::Thrown(value));
            };
            match region.phase {
                RegionPhase::Try => {
                    if let Some(catch) = region.catch.clone() {
                        region.phase = RegionPhase::Catch;
                        if let Some(slot) = catch.slot {
                            self.env.define(slot, value);
                        }
                        return Ok(catch.entry);
                    }
                    if let Some(finally) = region.finally {
                        region.phase = RegionPhase::Finally;
                        region.pending = Some(PendingCompletion::Throw(value));
                        return Ok(finally);
                    }
                    self.regions.pop();
                }
                RegionPhase::Catch => {
                    if let Some(finally) = region.finally {
                        region.phase = RegionPhase::Finally;
                        region.pending = Some(PendingCompletion::Throw(value));
                        return Ok(finally);
                    }
                    self.regions.pop();
                }
                // An exception raised while a finally body runs replaces
                // whatever completion that finally was deferring.
                RegionPhase::Finally => {
                    self.regions.pop();
                }
            }
        }
    }

    /// Begin unwinding for a return completion, entering each pending
    /// finally on the way out.
    fn begin_return(&mut self, value: JsValue) -> Unwound {
        while let Some(region) = self.regions.last_mut() {
            match region.phase {
                RegionPhase::Try | RegionPhase::Catch => {
                    if let Some(finally) = region.finally {
                        region.phase = RegionPhase::Finally;
                        region.pending = Some(PendingCompletion::Return(value));
                        return Unwound::Continue(finally);
                    }
                    self.regions.pop();
                }
                // A return arriving while this region's finally already ran
                // (or is running) skips the remainder of that finally.
                RegionPhase::Finally => {
                    self.regions.pop();
                }
            }
        }
        Unwound::Finished(value)
    }

    /// Leave `regions` try regions for a break/continue, running each
    /// pending finally before transferring to `target`.
    fn exit_regions(&mut self, regions: usize, target: Next) -> Result<Next, EngineError> {
        let mut remaining = regions;
        while remaining > 0 {
            let Some(region) = self.regions.last_mut() else {
                self.state = StepperState::Completed;
                return Err(EngineError::internal("jump exits more regions than exist"));
            };
            match (region.finally, region.phase) {
                (Some(finally), RegionPhase::Try | RegionPhase::Catch) => {
                    region.phase = RegionPhase::Finally;
                    region.pending = Some(PendingCompletion::Jump {
                        target,
                        regions: remaining - 1,
                    });
                    return Ok(finally);
                }
                _ => {
                    self.regions.pop();
                    remaining -= 1;
                }
            }
        }
        Ok(target)
    }

    fn throw_at(
        &mut self,
        interp: &mut Interpreter,
        value: JsValue,
    ) -> Result<StepEvent, EngineError> {
        let next = self.dispatch_throw(value)?;
        self.run(interp, next)
    }

    /// Convert an evaluator error into either a catch transfer or a fatal
    /// propagation.
    fn handle_error(&mut self, error: EngineError) -> Result<Next, EngineError> {
        match error.into_guest_value() {
            Ok(value) => self.dispatch_throw(value),
            Err(fatal) => {
                self.state = StepperState::Completed;
                Err(fatal)
            }
        }
    }

    fn finish(&mut self, value: JsValue) -> StepEvent {
        self.state = StepperState::Completed;
        self.regions.clear();
        StepEvent::Done(value)
    }

    fn fatal(&mut self, message: &str) -> Result<Flow, EngineError> {
        self.state = StepperState::Completed;
        Err(EngineError::internal(message))
    }

    fn set_iterator(
        &mut self,
        state_slot: usize,
        iterator: IteratorHandle,
    ) -> Result<(), EngineError> {
        match self.iterators.get_mut(state_slot) {
            Some(slot) => {
                *slot = Some(iterator);
                Ok(())
            }
            None => {
                self.state = StepperState::Completed;
                Err(EngineError::internal("iterator slot out of range"))
            }
        }
    }

    fn clear_iterator(&mut self, state_slot: usize) {
        if let Some(slot) = self.iterators.get_mut(state_slot) {
            *slot = None;
        }
    }
}
