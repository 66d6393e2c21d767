//! Static resolver pass.
//!
//! One AST walk that does four things:
//! 1. Build lexical scopes (a stack of maps tracking declared → defined →
//!    used for every local name).
//! 2. Report static errors: redeclaration, reading a variable in its own
//!    initializer, `return`/`this`/`super` in illegal positions, a class
//!    inheriting from itself.  Errors accumulate; the walk never stops.
//! 3. Record, for each `Variable`/`Assign`/`This`/`Super` occurrence that
//!    binds to a local, the number of environments between the use and the
//!    declaration.  Occurrences without an entry are globals.  The table is
//!    keyed by [`ExprId`], so the AST itself never changes.
//! 4. Emit an unused-variable diagnostic (via `log::warn!`) for every local
//!    that a scope closes over without a single read.

use crate::error::LoxError;
use crate::parser::{Expr, ExprId, Stmt};
use crate::token::Token;
use log::{debug, info, warn};
use std::collections::HashMap;

/// What kind of function body (if any) encloses the current node.  Used to
/// validate `return` placement and initializer semantics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// What kind of class body (if any) encloses the current node.  Used to
/// validate `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum BindState {
    /// Name exists but its initializer has not finished.
    Declared,
    /// Initializer complete; reads are legal.
    Defined,
    /// Read at least once.
    Used,
}

/// Per-name scope entry.  The line is kept for the unused diagnostic.
#[derive(Copy, Clone, Debug)]
struct Binding {
    state: BindState,
    line: usize,
}

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances into a side table consumed by the interpreter.
pub struct Resolver<'a> {
    scopes: Vec<HashMap<&'a str, Binding>>,
    locals: HashMap<ExprId, usize>,
    errors: Vec<LoxError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top-level statements.  Returns the distance table and every
    /// static error found; callers decide whether the errors permit
    /// execution.
    pub fn resolve(mut self, statements: &[Stmt<'a>]) -> (HashMap<ExprId, usize>, Vec<LoxError>) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        (self.locals, self.errors)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt<'a>) {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define, so the
                // initializer cannot see the name it is initializing
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function { name, params, body } => {
                // the name is visible inside its own body (recursion);
                // declarations do not count as unused locals
                self.declare(name);
                self.define(name);
                self.mark_used(name);

                self.resolve_function(params, body.as_slice(), FunctionType::Function);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let enclosing: ClassType = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name);
                self.define(name);
                self.mark_used(name);

                if let Some(superclass_expr) = superclass {
                    if let Expr::Variable {
                        name: super_name, ..
                    } = superclass_expr
                    {
                        if super_name.lexeme == name.lexeme {
                            self.error(super_name, "A class cannot inherit from itself");
                        }
                    }

                    self.current_class = ClassType::Subclass;
                    self.resolve_expr(superclass_expr);

                    // methods of a subclass close over 'super'
                    self.begin_scope();
                    self.define_implicit("super", name.line);
                }

                // every method closes over 'this'
                self.begin_scope();
                self.define_implicit("this", name.line);

                for method in methods {
                    if let Stmt::Function { name, params, body } = method {
                        let declaration: FunctionType = if name.lexeme == "init" {
                            FunctionType::Initializer
                        } else {
                            FunctionType::Method
                        };

                        self.resolve_function(params, body.as_slice(), declaration);
                    }
                }

                self.end_scope();

                if superclass.is_some() {
                    self.end_scope();
                }

                self.current_class = enclosing;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            // placement was checked while parsing
            Stmt::Break => {}

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Cannot return from top-level code");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Cannot return a value from an initializer");
                    }

                    self.resolve_expr(expr);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr<'a>) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            Expr::Variable { name, id } => {
                let in_own_initializer: bool = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(name.lexeme))
                    .map_or(false, |binding| binding.state == BindState::Declared);

                if in_own_initializer {
                    self.error(name, "Cannot read local variable in its own initializer");
                }

                self.mark_used(name);
                self.resolve_local(*id, name);
            }

            Expr::Assign { name, value, id } => {
                // RHS first, then bind the target.  A bare write does not
                // count as a use.
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { keyword, id } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Cannot use 'this' outside of a class");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { keyword, id, .. } => match self.current_class {
                ClassType::None => {
                    self.error(keyword, "Cannot use 'super' outside of a class");
                }
                ClassType::Class => {
                    self.error(keyword, "Cannot use 'super' in a class with no superclass");
                }
                ClassType::Subclass => {
                    self.resolve_local(*id, keyword);
                }
            },

            Expr::Lambda { params, body } => {
                self.resolve_function(params, body.as_slice(), FunctionType::Function);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, params: &[&'a Token<'a>], body: &[Stmt<'a>], kind: FunctionType) {
        let enclosing: FunctionType = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        for stmt in body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, warning about names it tracked that were
    /// never read.
    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (name, binding) in scope {
                if binding.state != BindState::Used {
                    warn!(
                        "[line {}] Warning: Local variable '{}' is never used",
                        binding.line, name
                    );
                }
            }
        }
    }

    fn declare(&mut self, name: &Token<'a>) {
        if self.scopes.is_empty() {
            return;
        }

        let redeclared: bool = self
            .scopes
            .last()
            .map_or(false, |scope| scope.contains_key(name.lexeme));

        if redeclared {
            self.error(name, "Variable already declared in this scope");
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.lexeme,
                Binding {
                    state: BindState::Declared,
                    line: name.line,
                },
            );
        }
    }

    fn define(&mut self, name: &Token<'a>) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(binding) = scope.get_mut(name.lexeme) {
                binding.state = BindState::Defined;
            }
        }
    }

    /// Insert a binding the runtime provides (`this`, `super`).  Born used,
    /// so it never trips the unused diagnostic.
    fn define_implicit(&mut self, name: &'a str, line: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name,
                Binding {
                    state: BindState::Used,
                    line,
                },
            );
        }
    }

    /// Flag the closest binding of `name` as read.
    fn mark_used(&mut self, name: &Token<'a>) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.get_mut(name.lexeme) {
                binding.state = BindState::Used;
                return;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at the depth where `name` was
    /// found, or leave it unrecorded (global) when no scope tracks it.
    fn resolve_local(&mut self, id: ExprId, name: &Token<'a>) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.locals.insert(id, depth);

                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }

    fn error(&mut self, token: &Token<'a>, message: &str) {
        self.errors
            .push(LoxError::resolve(token.line, token.location(), message));
    }
}
