//! The `for…of` driver template.
//!
//! Every `for…of` (and `for await…of`) compiles to the same two-instruction
//! shape: an `IteratorInit` that evaluates the iterable once into a stepper
//! iterator slot, and an `IteratorNext` loop head that advances it, binds the
//! element, and runs the body. `continue` re-enters at the `IteratorNext`
//! through the reserved loop-head jump; `break` leaves to the driver's
//! `done` continuation.

use std::rc::Rc;

use crate::ast::ForOfStatement;
use crate::value::{CheapClone, JsString};

use super::builder::PlanBuilder;
use super::lower::contains_suspension;
use super::plan::{Instruction, Next};
use super::Unsupported;

pub(crate) fn build_for_of(
    builder: &mut PlanBuilder,
    stmt: &ForOfStatement,
    label: Option<&JsString>,
    next: Next,
) -> Result<Next, Unsupported> {
    if stmt.awaited && !builder.async_mode {
        return Err(Unsupported::new("for await outside an async generator"));
    }
    if contains_suspension(&stmt.iterable) {
        return Err(Unsupported::new("suspension inside a for-of iterable"));
    }

    let state_slot = builder.alloc_iterator_slot();
    let head = builder.reserve_jump();
    builder.push_scope(label, Some(Next::At(head)), next);
    let body_result = builder.build_statement(&stmt.body, Next::At(head));
    builder.pop_scope();
    let body_entry = body_result?;

    let advance = builder.push(Instruction::IteratorNext {
        state_slot,
        binding: stmt.binding.name.cheap_clone(),
        declares: stmt.declaration.is_some(),
        awaited: stmt.awaited,
        body: body_entry,
        done: next,
    });
    builder.patch_jump(head, Next::At(advance));

    Ok(Next::At(builder.push(Instruction::IteratorInit {
        iterable: Rc::new(stmt.iterable.clone()),
        state_slot,
        awaited: stmt.awaited,
        next: Next::At(advance),
    })))
}
