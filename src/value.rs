use std::rc::Rc;

use crate::class::{LoxClass, LoxInstance};
use crate::function::{LoxFunction, LoxLambda};

/// A runtime Lox value.  Cheap to clone: every compound variant holds an
/// `Rc`, so copies share the underlying object.
#[derive(Debug, Clone)]
pub enum Value<'src> {
    /// Built-in function implemented in Rust.
    NativeFunction {
        name: &'static str,
        arity: usize,
        func: fn(&[Value<'src>]) -> Result<Value<'src>, String>,
    },
    /// User-declared named function or bound method.
    Function(Rc<LoxFunction<'src>>),
    /// Anonymous function literal.
    Lambda(Rc<LoxLambda<'src>>),
    Class(Rc<LoxClass<'src>>),
    Instance(Rc<LoxInstance<'src>>),
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

impl<'src> Value<'src> {
    /// `nil` and `false` are falsy; every other value is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl PartialEq for Value<'_> {
    /// Value equality for primitives, identity for callables and instances.
    /// Values of different kinds never compare equal, and there is no
    /// implicit coercion.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction { name: a, .. }, Value::NativeFunction { name: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::NativeFunction { name, .. } => write!(f, "<native fn {}>", name),

            Value::Function(fun) => write!(f, "<fn {}>", fun.name()),

            Value::Lambda(_) => write!(f, "<anonymous>"),

            Value::Class(class) => write!(f, "{}", class.name()),

            Value::Instance(instance) => write!(f, "{} instance", instance.class_name()),

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Nil => write!(f, "nil"),
        }
    }
}
