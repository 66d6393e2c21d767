//! Classes and instances.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::function::LoxFunction;
use crate::token::Token;
use crate::value::Value;

/// A class declaration's runtime value.  Method lookup walks the superclass
/// chain; the superclass is shared, never owned.
pub struct LoxClass<'src> {
    name: &'src Token<'src>,
    superclass: Option<Rc<LoxClass<'src>>>,
    methods: HashMap<&'src str, Rc<LoxFunction<'src>>>,
}

impl<'src> LoxClass<'src> {
    pub fn new(
        name: &'src Token<'src>,
        superclass: Option<Rc<LoxClass<'src>>>,
        methods: HashMap<&'src str, Rc<LoxFunction<'src>>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    pub fn name(&self) -> &'src str {
        self.name.lexeme
    }

    /// Own methods first, then the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction<'src>>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        match &self.superclass {
            Some(superclass) => superclass.find_method(name),
            None => None,
        }
    }

    /// Calling a class runs `init` if declared, so the constructor arity is
    /// the initializer's arity (0 without one).
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

impl fmt::Debug for LoxClass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.lexeme)
    }
}

/// One object created by calling a class.  Fields live behind a `RefCell`
/// because instances are shared via `Rc` and mutated through `Set`.
pub struct LoxInstance<'src> {
    class: Rc<LoxClass<'src>>,
    fields: RefCell<HashMap<&'src str, Value<'src>>>,
}

impl<'src> LoxInstance<'src> {
    pub fn new(class: Rc<LoxClass<'src>>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn class_name(&self) -> &'src str {
        self.class.name()
    }

    /// Property read: fields shadow methods; a found method comes back
    /// bound to `instance`.
    pub fn get(instance: &Rc<LoxInstance<'src>>, name: &Token<'src>) -> Result<Value<'src>> {
        if let Some(value) = instance.fields.borrow().get(name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = instance.class.find_method(name.lexeme) {
            return Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance)))));
        }

        Err(LoxError::runtime(
            name.line,
            format!("Undefined property '{}'", name.lexeme),
        ))
    }

    /// Property write.  Creates the field if it does not exist yet.
    pub fn set(&self, name: &'src str, value: Value<'src>) {
        self.fields.borrow_mut().insert(name, value);
    }
}

impl fmt::Debug for LoxInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name())
    }
}
