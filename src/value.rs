//! JavaScript value representation.
//!
//! The value model is deliberately small: enough for the generator subsystem
//! and its instruction payloads. Objects are `Rc<RefCell<…>>` with
//! insertion-ordered properties; host memory management is assumed, so there
//! is no collector.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BlockStatement, Identifier};
use crate::compiler::Plan;
use crate::error::EngineError;
use crate::eval::Interpreter;
use crate::runtime::Stepper;

/// Marker trait for values whose `clone()` is O(1) (a reference-count bump).
pub trait CheapClone: Clone {
    /// Create a cheap (reference-counted) clone of this value.
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// An immutable, cheaply clonable string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// A JavaScript value.
#[derive(Debug, Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Object(JsObjectRef),
}

impl CheapClone for JsValue {}

/// Strict-equality semantics; objects compare by identity.
impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl JsValue {
    pub fn string(s: impl Into<JsString>) -> Self {
        JsValue::String(s.into())
    }

    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => matches!(obj.borrow().exotic, ExoticObject::Function(_)),
            _ => false,
        }
    }

    /// `typeof` semantics.
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object", // Historical quirk
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Object(obj) => {
                if matches!(obj.borrow().exotic, ExoticObject::Function(_)) {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// ToBoolean.
    pub fn is_truthy(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Object(_) => true,
        }
    }

    /// ToNumber, without the object-to-primitive machinery.
    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            JsValue::Number(n) => *n,
            JsValue::String(s) => {
                let trimmed = s.as_str().trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            JsValue::Object(_) => f64::NAN,
        }
    }

    /// Strict equality (`===`).
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality (`==`), covering the coercions the evaluator needs.
    pub fn loose_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined | JsValue::Null, JsValue::Undefined | JsValue::Null) => true,
            (JsValue::Number(_), JsValue::String(_))
            | (JsValue::String(_), JsValue::Number(_))
            | (JsValue::Boolean(_), _)
            | (_, JsValue::Boolean(_)) => {
                if self.is_null_or_undefined() || other.is_null_or_undefined() {
                    false
                } else {
                    self.to_number() == other.to_number()
                }
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    write!(f, "{}Infinity", if *n < 0.0 { "-" } else { "" })
                } else if *n == 0.0 {
                    // Covers negative zero.
                    write!(f, "0")
                } else if n.fract() == 0.0 && n.abs() < 1e21 {
                    write!(f, "{n:.0}")
                } else {
                    write!(f, "{n}")
                }
            }
            JsValue::String(s) => write!(f, "{s}"),
            JsValue::Object(obj) => match &obj.borrow().exotic {
                ExoticObject::Array(_) => write!(f, "[object Array]"),
                ExoticObject::Function(_) => write!(f, "[object Function]"),
                ExoticObject::Generator(_) => write!(f, "[object Generator]"),
                ExoticObject::Plain => write!(f, "[object Object]"),
            },
        }
    }
}

/// A JavaScript object: insertion-ordered properties plus an exotic payload.
#[derive(Debug, Default)]
pub struct JsObject {
    pub properties: IndexMap<JsString, JsValue>,
    pub exotic: ExoticObject,
}

impl JsObject {
    pub fn plain() -> JsObjectRef {
        Rc::new(RefCell::new(JsObject::default()))
    }

    pub fn array(elements: Vec<JsValue>) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject {
            properties: IndexMap::new(),
            exotic: ExoticObject::Array(elements),
        }))
    }

    pub fn function(function: JsFunction) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject {
            properties: IndexMap::new(),
            exotic: ExoticObject::Function(function),
        }))
    }

    pub fn generator(stepper: Rc<RefCell<Stepper>>) -> JsObjectRef {
        Rc::new(RefCell::new(JsObject {
            properties: IndexMap::new(),
            exotic: ExoticObject::Generator(stepper),
        }))
    }

    pub fn get(&self, key: &str) -> JsValue {
        if let ExoticObject::Array(elements) = &self.exotic {
            if key == "length" {
                return JsValue::Number(elements.len() as f64);
            }
            if let Ok(index) = key.parse::<usize>() {
                return elements.get(index).cloned().unwrap_or(JsValue::Undefined);
            }
        }
        self.properties.get(key).cloned().unwrap_or(JsValue::Undefined)
    }

    pub fn set(&mut self, key: JsString, value: JsValue) {
        self.properties.insert(key, value);
    }
}

#[derive(Debug, Default)]
pub enum ExoticObject {
    #[default]
    Plain,
    Array(Vec<JsValue>),
    Function(JsFunction),
    Generator(Rc<RefCell<Stepper>>),
}

/// Function representation.
#[derive(Clone)]
pub enum JsFunction {
    /// Native Rust function.
    Native(NativeFunction),
    /// Guest function declared in the consumed syntax tree.
    Declared(Rc<DeclaredFunction>),
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsFunction::Native(n) => write!(f, "[native {}]", n.name),
            JsFunction::Declared(d) => {
                let name = d.name.as_ref().map(JsString::as_str).unwrap_or("<anonymous>");
                write!(f, "[function {name}]")
            }
        }
    }
}

pub type NativeFn = dyn Fn(&mut Interpreter, &[JsValue]) -> Result<JsValue, EngineError>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub func: Rc<NativeFn>,
}

impl CheapClone for NativeFunction {}

impl NativeFunction {
    pub fn new(
        name: &'static str,
        func: impl Fn(&mut Interpreter, &[JsValue]) -> Result<JsValue, EngineError> + 'static,
    ) -> Self {
        NativeFunction {
            name,
            func: Rc::new(func),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Generator,
    AsyncGenerator,
}

impl FunctionKind {
    pub fn is_generator(self) -> bool {
        matches!(self, FunctionKind::Generator | FunctionKind::AsyncGenerator)
    }

    pub fn is_async(self) -> bool {
        matches!(self, FunctionKind::AsyncGenerator)
    }
}

/// A guest function definition plus its captured environment.
///
/// For generator kinds the compiled [`Plan`] is cached here after the first
/// instantiation: built once per function definition, shared by every call.
#[derive(Debug)]
pub struct DeclaredFunction {
    pub name: Option<JsString>,
    pub params: Vec<Identifier>,
    pub body: BlockStatement,
    pub kind: FunctionKind,
    pub closure: Rc<crate::env::Environment>,
    pub plan: RefCell<Option<Rc<Plan>>>,
}

impl DeclaredFunction {
    pub fn new(
        name: Option<JsString>,
        params: Vec<Identifier>,
        body: BlockStatement,
        kind: FunctionKind,
        closure: Rc<crate::env::Environment>,
    ) -> Rc<Self> {
        Rc::new(DeclaredFunction {
            name,
            params,
            body,
            kind,
            closure,
            plan: RefCell::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_display() {
        assert_eq!(JsValue::Number(3.0).to_string(), "3");
        assert_eq!(JsValue::Number(-4.0).to_string(), "-4");
        assert_eq!(JsValue::Number(-0.0).to_string(), "0");
        assert_eq!(JsValue::Number(1.5).to_string(), "1.5");
        // Integral values past i64::MAX still print exactly.
        assert_eq!(
            JsValue::Number(2f64.powi(63)).to_string(),
            "9223372036854775808"
        );
        assert_eq!(
            JsValue::Number(1e20).to_string(),
            "100000000000000000000"
        );
        assert_eq!(JsValue::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(JsValue::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    }
}
