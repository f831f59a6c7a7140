//! Scope frames.
//!
//! An `Environment` maps names to values and holds an optional reference to
//! its enclosing frame, fixed at creation.  Frames are shared
//! (`Rc<RefCell<_>>`): a frame outlives its creating block whenever a closure
//! captured it, and mutation through one alias is visible through all others.
//!
//! `get` / `assign` walk the chain outward and report an undefined-variable
//! runtime error at the global boundary.  `get_at` / `assign_at` jump exactly
//! `distance` enclosing links using the resolver's hop annotation; a miss on
//! that path is a scope-nesting bug in the interpreter itself, not a user
//! error, and panics accordingly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::value::Value;

#[derive(Debug)]
pub struct Environment<'a> {
    values: HashMap<&'a str, Value<'a>>,
    enclosing: Option<Rc<RefCell<Environment<'a>>>>,
}

impl<'a> Environment<'a> {
    /// The global frame: no enclosing link.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// A frame nested inside `enclosing`.  The link never changes afterward.
    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'a>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert or overwrite `name` in this frame.  Redeclaration in the same
    /// frame is deliberate; it is what lets a global rebind itself.
    pub fn define(&mut self, name: &'a str, value: Value<'a>) {
        self.values.insert(name, value);
    }

    /// Dynamic lookup: walk the enclosing chain outward.
    pub fn get(&self, name: &str, line: usize) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Dynamic assignment: walk the enclosing chain outward.
    pub fn assign(&mut self, name: &'a str, value: Value<'a>, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name, value);
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Jump exactly `distance` enclosing links from `env`.
    fn ancestor(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
    ) -> Rc<RefCell<Environment<'a>>> {
        let mut frame = Rc::clone(env);

        for _ in 0..distance {
            let next = frame
                .borrow()
                .enclosing
                .as_ref()
                .expect("resolver and interpreter scope nesting out of sync")
                .clone();
            frame = next;
        }

        frame
    }

    /// Direct-hop read at a resolved distance.  O(distance), no name search.
    pub fn get_at(env: &Rc<RefCell<Environment<'a>>>, distance: usize, name: &str) -> Value<'a> {
        Environment::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .expect("resolved variable missing from its frame")
    }

    /// Direct-hop write at a resolved distance.
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'a>>>,
        distance: usize,
        name: &'a str,
        value: Value<'a>,
    ) {
        Environment::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name, value);
    }
}

impl<'a> Default for Environment<'a> {
    fn default() -> Self {
        Environment::new()
    }
}
