//! The flat, indexable program representation a generator body compiles to.
//!
//! A [`Plan`] is an immutable instruction array plus an entry index. Every
//! instruction carries its own successor; `Next::Done` is the implicit
//! terminal return. Instruction payloads are suspension-free AST fragments
//! executed by the general evaluator.

use std::rc::Rc;

use crate::ast::{Expression, Statement};
use crate::value::JsString;

/// A control-flow successor: another instruction in the same plan, or the
/// implicit terminal return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    At(usize),
    Done,
}

/// Catch landing site of a try region.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchSite {
    pub entry: Next,
    /// Binding that receives the in-flight exception while the catch body
    /// executes (`None` for a parameterless catch).
    pub slot: Option<JsString>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Run a suspension-free statement for its effects.
    Exec { stmt: Rc<Statement>, next: Next },

    /// Evaluate a suspension-free test and pick a successor.
    Branch {
        test: Rc<Expression>,
        if_true: Next,
        if_false: Next,
    },

    /// Unconditional transfer. Loop heads reserve one of these so the
    /// back-edge target is known before the condition chain is appended.
    Jump { next: Next },

    /// `break`/`continue` that leaves `regions` enclosing try regions before
    /// transferring to `target`, running each pending finally on the way.
    ExitRegions { regions: usize, target: Next },

    /// Suspend, surfacing the operand. The value supplied by the next
    /// external call lands in `resume_slot`.
    Yield {
        operand: Option<Rc<Expression>>,
        resume_slot: JsString,
        next: Next,
    },

    /// `yield*`: delegate to an inner iterable through the stepper's
    /// iterator slot `state_slot`; the inner iterator's completion value
    /// lands in `resume_slot`.
    YieldDelegate {
        iterable: Rc<Expression>,
        state_slot: usize,
        resume_slot: JsString,
        next: Next,
    },

    /// Resolve a possibly-thenable operand through the await scheduler,
    /// storing the settled value in `resume_slot`.
    Await {
        operand: Rc<Expression>,
        resume_slot: JsString,
        next: Next,
    },

    /// Terminal return.
    Return { operand: Option<Rc<Expression>> },

    /// Open a try region, then continue into the try body.
    EnterTry {
        catch: Option<CatchSite>,
        finally: Option<Next>,
        /// Continuation after the whole try statement completes normally.
        after: Next,
        body: Next,
    },

    /// Normal-completion funnel at the end of a try or catch body: run the
    /// region's finally if it has one, otherwise continue past the region.
    LeaveTry,

    /// End of a finally body: resume whatever completion (normal,
    /// exceptional, jump, or return) was pending before the finally ran.
    EndFinally,

    /// Evaluate an iterable and store its iterator in slot `state_slot`.
    IteratorInit {
        iterable: Rc<Expression>,
        state_slot: usize,
        awaited: bool,
        next: Next,
    },

    /// Advance the iterator in `state_slot`: on exhaustion transfer to
    /// `done`, otherwise bind the value and run `body`.
    IteratorNext {
        state_slot: usize,
        binding: JsString,
        /// Declare a fresh binding per iteration vs. assign an existing one.
        declares: bool,
        awaited: bool,
        body: Next,
        done: Next,
    },
}

impl Instruction {
    /// Successor indices, for validation.
    fn targets(&self) -> Vec<Next> {
        match self {
            Instruction::Exec { next, .. }
            | Instruction::Jump { next }
            | Instruction::Yield { next, .. }
            | Instruction::YieldDelegate { next, .. }
            | Instruction::Await { next, .. }
            | Instruction::IteratorInit { next, .. } => vec![*next],
            Instruction::Branch {
                if_true, if_false, ..
            } => vec![*if_true, *if_false],
            Instruction::ExitRegions { target, .. } => vec![*target],
            Instruction::Return { .. } | Instruction::LeaveTry | Instruction::EndFinally => {
                Vec::new()
            }
            Instruction::EnterTry {
                catch,
                finally,
                after,
                body,
            } => {
                let mut targets = vec![*after, *body];
                if let Some(site) = catch {
                    targets.push(site.entry);
                }
                if let Some(finally) = finally {
                    targets.push(*finally);
                }
                targets
            }
            Instruction::IteratorNext { body, done, .. } => vec![*body, *done],
        }
    }
}

/// The compiled, immutable instruction program for one generator or
/// async-generator function. Built once per function definition and shared
/// by every invocation.
#[derive(Debug, PartialEq)]
pub struct Plan {
    pub instructions: Box<[Instruction]>,
    pub entry: Next,
    /// Number of iterator slots the stepper must allocate.
    pub iterator_slots: usize,
    /// Whether awaits surface pending promises (async generator).
    pub async_mode: bool,
    pub function_name: Option<JsString>,
}

impl Plan {
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Every successor must land inside the plan. A violation is a builder
    /// programming error, unreachable from well-formed input, so it trips in
    /// development rather than being handled at runtime.
    pub(crate) fn debug_validate(&self) {
        let in_range = |next: Next| match next {
            Next::Done => true,
            Next::At(index) => index < self.instructions.len(),
        };
        debug_assert!(in_range(self.entry), "plan entry out of range");
        for instruction in &self.instructions {
            for target in instruction.targets() {
                debug_assert!(in_range(target), "jump target out of range: {instruction:?}");
            }
        }
    }
}
