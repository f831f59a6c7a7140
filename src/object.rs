//! The object model: user functions, classes, and instances.
//!
//! All three are built on [`LoxCallable`], the arity-checked invocation
//! capability.  A [`LoxFunction`] pairs its declaration with the environment
//! frame captured at definition time; calling it layers a fresh frame on that
//! closure, never on the caller's frame.  A [`LoxClass`] is itself callable
//! as a constructor.  Method binding is per call: `bind` produces a new
//! function whose closure is a one-entry frame defining `this`, so the shared
//! unbound method is never mutated.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Capability for arity-checked invocation, implemented by user functions
/// and classes.  The interpreter checks arity before dispatching.
pub trait LoxCallable<'a> {
    fn arity(&self) -> usize;

    fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>>;
}

/// A user-defined function or method.
#[derive(Debug, Clone)]
pub struct LoxFunction<'a> {
    declaration: Rc<FunctionDecl<'a>>,

    /// The frame that was current when the declaration executed.
    closure: Rc<RefCell<Environment<'a>>>,

    is_initializer: bool,
}

impl<'a> LoxFunction<'a> {
    pub fn new(
        declaration: Rc<FunctionDecl<'a>>,
        closure: Rc<RefCell<Environment<'a>>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &'a str {
        self.declaration.name.lexeme
    }

    /// Produce a copy of this method with the receiver bound: a fresh frame
    /// defining `this` is wedged between the call frame and the original
    /// closure.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance<'a>>>) -> LoxFunction<'a> {
        debug!("Binding method '{}' to a receiver", self.name());

        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }
}

impl<'a> LoxCallable<'a> for LoxFunction<'a> {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Calling function '{}'", self.name());

        // The new frame encloses the captured closure, not the call site.
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(param.lexeme, argument);
        }

        let flow = interpreter
            .execute_block(&self.declaration.body, Rc::new(RefCell::new(environment)))?;

        // An initializer answers with its bound instance no matter how the
        // body finished, an explicit `return` included.
        if self.is_initializer {
            return Ok(Environment::get_at(&self.closure, 0, "this"));
        }

        match flow {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }
}

/// A class: a name, an optional superclass, and a method table.
#[derive(Debug)]
pub struct LoxClass<'a> {
    pub name: &'a str,
    superclass: Option<Rc<LoxClass<'a>>>,
    methods: HashMap<&'a str, LoxFunction<'a>>,
}

impl<'a> LoxClass<'a> {
    pub fn new(
        name: &'a str,
        superclass: Option<Rc<LoxClass<'a>>>,
        methods: HashMap<&'a str, LoxFunction<'a>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            methods,
        }
    }

    /// Nearest-definition-wins lookup: this class's table first, then the
    /// superclass chain.
    pub fn find_method(&self, name: &str) -> Option<LoxFunction<'a>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }
}

impl<'a> LoxCallable<'a> for Rc<LoxClass<'a>> {
    /// A class's arity is its initializer's, or zero without one.
    fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }

    /// Construct an instance, running `init` bound to it when defined.
    fn call(
        &self,
        interpreter: &mut Interpreter<'a>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Constructing instance of '{}'", self.name);

        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(self))));

        if let Some(init) = self.find_method("init") {
            init.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// An instance: a shared class reference plus a mutable field map.
#[derive(Debug)]
pub struct LoxInstance<'a> {
    class: Rc<LoxClass<'a>>,
    fields: HashMap<&'a str, Value<'a>>,
}

impl<'a> LoxInstance<'a> {
    pub fn new(class: Rc<LoxClass<'a>>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &'a str {
        self.class.name
    }

    /// Property read.  Fields shadow methods; a method is bound to the
    /// receiver at lookup time.
    pub fn get(instance: &Rc<RefCell<LoxInstance<'a>>>, name: &Token<'a>) -> Result<Value<'a>> {
        if let Some(value) = instance.borrow().fields.get(name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = instance.borrow().class.find_method(name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance)))));
        }

        Err(LoxError::runtime(
            name.line,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    /// Property write.  Creates the field when absent.
    pub fn set(&mut self, name: &'a str, value: Value<'a>) {
        self.fields.insert(name, value);
    }
}
