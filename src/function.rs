//! User-declared callables: named functions, methods, and lambdas.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::parser::Stmt;
use crate::token::Token;
use crate::value::Value;

/// A named function or method.  The body is shared with the declaring AST
/// node; the closure is the environment captured at declaration time and
/// never changes afterwards.
pub struct LoxFunction<'src> {
    name: &'src Token<'src>,
    params: Vec<&'src Token<'src>>,
    body: Rc<Vec<Stmt<'src>>>,
    closure: Rc<RefCell<Environment<'src>>>,
    is_initializer: bool,
}

impl<'src> LoxFunction<'src> {
    pub fn new(
        name: &'src Token<'src>,
        params: Vec<&'src Token<'src>>,
        body: Rc<Vec<Stmt<'src>>>,
        closure: Rc<RefCell<Environment<'src>>>,
        is_initializer: bool,
    ) -> Self {
        Self {
            name,
            params,
            body,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &'src str {
        self.name.lexeme
    }

    pub fn line(&self) -> usize {
        self.name.line
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[&'src Token<'src>] {
        &self.params
    }

    pub fn body(&self) -> &Rc<Vec<Stmt<'src>>> {
        &self.body
    }

    pub fn closure(&self) -> &Rc<RefCell<Environment<'src>>> {
        &self.closure
    }

    /// An initializer always evaluates to the instance under construction,
    /// whatever its body does.
    pub fn is_initializer(&self) -> bool {
        self.is_initializer
    }

    /// Produce a copy whose closure is a fresh scope binding `this` to
    /// `instance`.  Property access creates one of these per lookup.
    pub fn bind(&self, instance: Rc<LoxInstance<'src>>) -> LoxFunction<'src> {
        let mut scope: Environment<'src> = Environment::with_enclosing(Rc::clone(&self.closure));
        scope.define("this", Some(Value::Instance(instance)));

        LoxFunction {
            name: self.name,
            params: self.params.clone(),
            body: Rc::clone(&self.body),
            closure: Rc::new(RefCell::new(scope)),
            is_initializer: self.is_initializer,
        }
    }
}

// Closures can reach back to values holding this function, so Debug prints
// the short display form instead of descending.
impl fmt::Debug for LoxFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name.lexeme)
    }
}

/// An anonymous function literal.  Same call machinery as [`LoxFunction`]
/// without a name or initializer semantics.
pub struct LoxLambda<'src> {
    params: Vec<&'src Token<'src>>,
    body: Rc<Vec<Stmt<'src>>>,
    closure: Rc<RefCell<Environment<'src>>>,
}

impl<'src> LoxLambda<'src> {
    pub fn new(
        params: Vec<&'src Token<'src>>,
        body: Rc<Vec<Stmt<'src>>>,
        closure: Rc<RefCell<Environment<'src>>>,
    ) -> Self {
        Self {
            params,
            body,
            closure,
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[&'src Token<'src>] {
        &self.params
    }

    pub fn body(&self) -> &Rc<Vec<Stmt<'src>>> {
        &self.body
    }

    pub fn closure(&self) -> &Rc<RefCell<Environment<'src>>> {
        &self.closure
    }
}

impl fmt::Debug for LoxLambda<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<anonymous>")
    }
}
