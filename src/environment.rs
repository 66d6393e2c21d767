use crate::error::{LoxError, Result};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One scope frame.  A slot holding `None` is declared but uninitialized,
/// which is not the same as holding `nil`: reading it is a runtime error.
pub struct Environment<'src> {
    values: HashMap<&'src str, Option<Value<'src>>>,
    enclosing: Option<Rc<RefCell<Environment<'src>>>>,
}

impl<'src> Environment<'src> {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment<'src>>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Declare `name` in this frame.  `None` leaves the slot uninitialized.
    pub fn define(&mut self, name: &'src str, value: Option<Value<'src>>) {
        self.values.insert(name, value);
    }

    /// Dynamic lookup walking the whole chain.  Used for globals, which the
    /// resolver does not track.
    pub fn get(&self, name: &str, line: usize) -> Result<Value<'src>> {
        if let Some(slot) = self.values.get(name) {
            Self::read_slot(slot, name, line)
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Dynamic assignment walking the whole chain.
    pub fn assign(&mut self, name: &'src str, value: Value<'src>, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name, Some(value));

            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            ))
        }
    }

    /// Read from the frame exactly `distance` links up.  The resolver has
    /// already proven the slot exists there.
    pub fn get_at(
        env: &Rc<RefCell<Environment<'src>>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value<'src>> {
        let frame: Rc<RefCell<Environment<'src>>> = Self::ancestor(env, distance);

        let result: Result<Value<'src>> = match frame.borrow().values.get(name) {
            Some(slot) => Self::read_slot(slot, name, line),
            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'", name),
            )),
        };

        result
    }

    /// Write into the frame exactly `distance` links up.
    pub fn assign_at(
        env: &Rc<RefCell<Environment<'src>>>,
        distance: usize,
        name: &'src str,
        value: Value<'src>,
    ) {
        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name, Some(value));
    }

    fn read_slot(slot: &Option<Value<'src>>, name: &str, line: usize) -> Result<Value<'src>> {
        match slot {
            Some(value) => Ok(value.clone()),
            None => Err(LoxError::runtime(
                line,
                format!("Attempted to use uninitialized variable '{}'", name),
            )),
        }
    }

    fn ancestor(
        env: &Rc<RefCell<Environment<'src>>>,
        distance: usize,
    ) -> Rc<RefCell<Environment<'src>>> {
        let mut current: Rc<RefCell<Environment<'src>>> = Rc::clone(env);

        for _ in 0..distance {
            let next: Rc<RefCell<Environment<'src>>> = current
                .borrow()
                .enclosing
                .clone()
                .expect("Went past the global environment");

            current = next;
        }

        current
    }
}
