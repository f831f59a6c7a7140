use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::object::{LoxClass, LoxFunction, LoxInstance};

/// A runtime value.  Numbers, strings, and booleans are owned; functions,
/// classes, and instances are shared references so aliases observe the same
/// underlying object.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Nil,

    Bool(bool),

    Number(f64),

    String(String),

    NativeFunction {
        name: &'static str,
        arity: usize,
        func: fn(&[Value<'a>]) -> Result<Value<'a>, String>,
    },

    Function(Rc<LoxFunction<'a>>),

    Class(Rc<LoxClass<'a>>),

    Instance(Rc<RefCell<LoxInstance<'a>>>),
}

impl<'a> fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                // Integer-valued numbers (within epsilon) print without a
                // decimal point; everything else uses shortest round-trip
                // formatting, which never shows float noise.
                let rounded = n.round();
                if (n - rounded).abs() < 1e-8 {
                    let mut buf: itoa::Buffer = itoa::Buffer::new();
                    f.write_str(buf.format(rounded as i64))
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::NativeFunction { name, .. } => write!(f, "<native fn {}>", name),

            Value::Function(function) => write!(f, "<fn {}>", function.name()),

            Value::Class(class) => write!(f, "<class {}>", class.name),

            Value::Instance(instance) => {
                write!(f, "<instance {}>", instance.borrow().class_name())
            }
        }
    }
}
