//! Error types for the engine.
//!
//! Build failures are deliberately *not* represented here: an unsupported
//! shape is reported by value as [`crate::compiler::Unsupported`] so the
//! caller can fall back to general evaluation. `EngineError` covers guest
//! exceptions and host-level failures only.

use thiserror::Error;

use crate::value::{JsString, JsValue};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("ReferenceError: {name} is not defined")]
    ReferenceError { name: JsString },

    /// A guest value was thrown (`throw x`, an injected `throw()`, or a
    /// rejected thenable). Catchable by guest `try`/`catch`.
    #[error("uncaught exception: {0}")]
    Thrown(JsValue),

    /// Synchronous await of a thenable that did not settle during its `then`
    /// call. The blocking path requires full synchronous resolvability.
    #[error("await of an unsettled promise on the synchronous path")]
    UnsettledAwait,

    /// A builder or stepper invariant was violated (for example an
    /// out-of-range jump target). Unreachable from well-formed input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn type_error(message: impl Into<String>) -> Self {
        EngineError::TypeError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    /// The guest-visible value for a catchable error, or `Err(self)` for
    /// errors that must not be intercepted by guest `try`/`catch`.
    pub fn into_guest_value(self) -> Result<JsValue, EngineError> {
        match self {
            EngineError::Thrown(value) => Ok(value),
            EngineError::TypeError { .. } | EngineError::ReferenceError { .. } => {
                Ok(JsValue::string(self.to_string()))
            }
            err @ (EngineError::UnsettledAwait | EngineError::Internal(_)) => Err(err),
        }
    }
}
