//! Generator/async-generator compiler.
//!
//! Compiles a normalized function body into a flat, resumable [`Plan`]
//! executed by the runtime stepper. Unsupported shapes are reported by
//! value as [`Unsupported`], never thrown, so the caller can fall back to
//! a general tree-walking evaluator outside this core.

pub mod builder;
pub mod iterator;
pub mod lower;
pub mod normalize;
pub mod plan;

pub use builder::PlanBuilder;
pub use plan::{CatchSite, Instruction, Next, Plan};

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::ast::Statement;
use crate::value::{FunctionKind, JsString};

/// A shape the compiled path does not handle. Carried as a value, never
/// thrown; triggers fallback to general evaluation rather than a
/// user-visible failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsupported {
    pub reason: String,
}

impl Unsupported {
    pub fn new(reason: impl Into<String>) -> Self {
        Unsupported {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported for compilation: {}", self.reason)
    }
}

/// Build diagnostics sink, injected into [`try_build`] rather than living
/// in process-wide state. Observability only, not part of the execution
/// contract.
pub trait BuildObserver {
    fn build_attempted(&mut self, _function: Option<&JsString>) {}
    fn build_succeeded(&mut self, _function: Option<&JsString>, _plan: &Plan) {}
    fn build_failed(&mut self, _function: Option<&JsString>, _reason: &str) {}
}

/// Observer that records nothing.
pub struct NullObserver;

impl BuildObserver for NullObserver {}

/// Counting observer: build attempt/success/failure totals plus the most
/// recent failure and the function it implicates.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BuildStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_failure: Option<LastFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LastFailure {
    pub function: String,
    pub reason: String,
}

impl BuildObserver for BuildStats {
    fn build_attempted(&mut self, _function: Option<&JsString>) {
        self.attempts += 1;
    }

    fn build_succeeded(&mut self, _function: Option<&JsString>, _plan: &Plan) {
        self.successes += 1;
    }

    fn build_failed(&mut self, function: Option<&JsString>, reason: &str) {
        self.failures += 1;
        self.last_failure = Some(LastFailure {
            function: function
                .map(|name| name.as_str().to_owned())
                .unwrap_or_else(|| "<anonymous>".to_owned()),
            reason: reason.to_owned(),
        });
    }
}

/// Compile a generator function body into a shared, immutable plan.
pub fn try_build(
    name: Option<&JsString>,
    body: &[Statement],
    kind: FunctionKind,
    observer: &mut dyn BuildObserver,
) -> Result<Rc<Plan>, Unsupported> {
    observer.build_attempted(name);
    match builder::build_plan(name, body, kind) {
        Ok(plan) => {
            let plan = Rc::new(plan);
            observer.build_succeeded(name, &plan);
            Ok(plan)
        }
        Err(failure) => {
            observer.build_failed(name, &failure.reason);
            Err(failure)
        }
    }
}
