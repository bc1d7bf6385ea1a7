//! Lexical environments: a chain of scopes mapping names to values.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::EngineError;
use crate::value::{CheapClone, JsString, JsValue};

#[derive(Debug, Default)]
pub struct Environment {
    bindings: RefCell<FxHashMap<JsString, JsValue>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Rc::new(Environment::default())
    }

    pub fn child(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(FxHashMap::default()),
            parent: Some(parent.cheap_clone()),
        })
    }

    /// Declare (or redeclare) a binding in this scope.
    pub fn define(&self, name: JsString, value: JsValue) {
        self.bindings.borrow_mut().insert(name, value);
    }

    pub fn get(&self, name: &JsString) -> Result<JsValue, EngineError> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Ok(value.cheap_clone());
        }
        match &self.parent {
            Some(parent) => parent.get(name),
            None => Err(EngineError::ReferenceError {
                name: name.cheap_clone(),
            }),
        }
    }

    /// Assign to an existing binding, walking the scope chain outward.
    pub fn set(&self, name: &JsString, value: JsValue) -> Result<(), EngineError> {
        if let Some(slot) = self.bindings.borrow_mut().get_mut(name) {
            *slot = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.set(name, value),
            None => Err(EngineError::ReferenceError {
                name: name.cheap_clone(),
            }),
        }
    }

    pub fn has(&self, name: &JsString) -> bool {
        if self.bindings.borrow().contains_key(name) {
            return true;
        }
        self.parent.as_ref().is_some_and(|p| p.has(name))
    }
}
