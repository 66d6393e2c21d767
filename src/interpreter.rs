use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::function::{LoxFunction, LoxLambda};
use crate::parser::{Expr, ExprId, LiteralValue, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.  `break` and `return` surface here as plain
/// values instead of riding the error channel: `While` absorbs `Broken`,
/// the call boundary absorbs `Returned`, everything else passes them up.
#[derive(Debug)]
pub enum Completion<'src> {
    Normal,
    Broken,
    Returned(Value<'src>),
}

/// Tree-walking evaluator.  Program output goes to the injected `W`, which
/// is `stdout` in the CLI and a byte buffer in tests.
pub struct Interpreter<'src, W: Write> {
    /// Outermost environment, home of natives and top-level names.
    globals: Rc<RefCell<Environment<'src>>>,

    /// Innermost environment at the current execution point.
    environment: Rc<RefCell<Environment<'src>>>,

    /// Resolved lexical distances, merged across every `run` so closures
    /// from earlier REPL lines keep working.
    locals: HashMap<ExprId, usize>,

    output: W,
}

impl<'src> Interpreter<'src, io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl<'src, W: Write> Interpreter<'src, W> {
    /// Creates an interpreter with the native `clock` pre-defined in the
    /// globals.
    pub fn with_output(output: W) -> Self {
        info!("Initializing interpreter");

        let globals: Rc<RefCell<Environment<'src>>> = Rc::new(RefCell::new(Environment::new()));

        debug!("Defining native function 'clock'");

        globals.borrow_mut().define(
            "clock",
            Some(Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: |_args: &[Value<'src>]| {
                    // Seconds since the Unix epoch, with millisecond
                    // precision.
                    let seconds: f64 = Utc::now().timestamp_millis() as f64 / 1000.0;

                    Ok(Value::Number(seconds))
                },
            }),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Executes a resolved program.  `locals` is the distance table for
    /// exactly these statements; it is merged into the table kept across
    /// runs.  The first runtime error aborts the remaining statements.
    pub fn run(
        &mut self,
        statements: &[Stmt<'src>],
        locals: HashMap<ExprId, usize>,
    ) -> Result<()> {
        debug!("Interpreting {} statement(s)", statements.len());

        self.locals.extend(locals);

        for stmt in statements {
            // Static analysis rejected top-level return and break, so the
            // completion here is always Normal.
            self.execute(stmt)?;
        }

        info!("Interpretation completed");

        Ok(())
    }

    // ───────────────────────── statements ─────────────────────────

    fn execute(&mut self, stmt: &Stmt<'src>) -> Result<Completion<'src>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value: Value<'src> = self.evaluate(expr)?;

                writeln!(self.output, "{}", value)?;
            }

            Stmt::Var { name, initializer } => {
                // No initializer leaves the slot uninitialized, which is
                // not the same as nil.
                let value: Option<Value<'src>> = match initializer {
                    Some(expr) => Some(self.evaluate(expr)?),
                    None => None,
                };

                self.environment.borrow_mut().define(name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let scope: Environment<'src> =
                    Environment::with_enclosing(Rc::clone(&self.environment));

                return self.execute_block(statements, scope);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                }

                if let Some(else_stmt) = else_branch {
                    return self.execute(else_stmt);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Completion::Normal => {}
                        Completion::Broken => break,
                        Completion::Returned(value) => {
                            return Ok(Completion::Returned(value));
                        }
                    }
                }
            }

            Stmt::Break => {
                return Ok(Completion::Broken);
            }

            Stmt::Function { name, params, body } => {
                debug!("Defining function '{}'", name.lexeme);

                let function: LoxFunction<'src> = LoxFunction::new(
                    *name,
                    params.clone(),
                    Rc::clone(body),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(name.lexeme, Some(Value::Function(Rc::new(function))));
            }

            Stmt::Return { value, .. } => {
                let value: Value<'src> = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                return Ok(Completion::Returned(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                return self.execute_class(*name, superclass.as_ref(), methods);
            }
        }

        Ok(Completion::Normal)
    }

    /// Runs `statements` inside `scope`.  The previous environment is
    /// restored even when execution is cut short by an error, a `break`,
    /// or a `return`.
    fn execute_block(
        &mut self,
        statements: &[Stmt<'src>],
        scope: Environment<'src>,
    ) -> Result<Completion<'src>> {
        let previous: Rc<RefCell<Environment<'src>>> = Rc::clone(&self.environment);
        self.environment = Rc::new(RefCell::new(scope));

        let mut outcome: Result<Completion<'src>> = Ok(Completion::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Completion::Normal) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        self.environment = previous;

        outcome
    }

    fn execute_class(
        &mut self,
        name: &'src Token<'src>,
        superclass: Option<&Expr<'src>>,
        methods: &[Stmt<'src>],
    ) -> Result<Completion<'src>> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass: Option<Rc<LoxClass<'src>>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let line: usize = match expr {
                        Expr::Variable { name, .. } => name.line,
                        _ => name.line,
                    };

                    return Err(LoxError::runtime(line, "Superclass must be a class"));
                }
            },
            None => None,
        };

        // Two-step define/assign lets methods refer to the class by name.
        self.environment
            .borrow_mut()
            .define(name.lexeme, Some(Value::Nil));

        // Methods of a subclass close over 'super'.
        let method_closure: Rc<RefCell<Environment<'src>>> = match &superclass {
            Some(class) => {
                let mut scope: Environment<'src> =
                    Environment::with_enclosing(Rc::clone(&self.environment));
                scope.define("super", Some(Value::Class(Rc::clone(class))));

                Rc::new(RefCell::new(scope))
            }
            None => Rc::clone(&self.environment),
        };

        let mut method_table: HashMap<&'src str, Rc<LoxFunction<'src>>> = HashMap::new();

        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let function: LoxFunction<'src> = LoxFunction::new(
                    *name,
                    params.clone(),
                    Rc::clone(body),
                    Rc::clone(&method_closure),
                    name.lexeme == "init",
                );

                method_table.insert(name.lexeme, Rc::new(function));
            }
        }

        let class: Value<'src> =
            Value::Class(Rc::new(LoxClass::new(name, superclass, method_table)));

        self.environment
            .borrow_mut()
            .assign(name.lexeme, class, name.line)?;

        Ok(Completion::Normal)
    }

    // ───────────────────────── expressions ────────────────────────

    fn evaluate(&mut self, expr: &Expr<'src>) -> Result<Value<'src>> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right_val: Value<'src> = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right_val {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(
                            operator.line,
                            "Operand must be a number",
                        )),
                    },

                    TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),

                    _ => Err(LoxError::runtime(operator.line, "Invalid unary operator")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value<'src> = self.evaluate(left)?;

                // The deciding operand comes back uncoerced.
                let short_circuits: bool = match operator.token_type {
                    TokenType::OR => left_val.is_truthy(),
                    _ => !left_val.is_truthy(), // AND
                };

                if short_circuits {
                    return Ok(left_val);
                }

                self.evaluate(right)
            }

            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { name, id } => self.look_up_variable(name.lexeme, *id, name.line),

            Expr::Assign { name, value, id } => {
                let value: Value<'src> = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(distance) => {
                        Environment::assign_at(
                            &self.environment,
                            *distance,
                            name.lexeme,
                            value.clone(),
                        );
                    }
                    None => {
                        self.globals
                            .borrow_mut()
                            .assign(name.lexeme, value.clone(), name.line)?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value<'src> = self.evaluate(callee)?;

                let mut arg_values: Vec<Value<'src>> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(&callee_val, paren, &arg_values)
            }

            Expr::Get { object, name } => {
                let object: Value<'src> = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => LoxInstance::get(&instance, name),
                    _ => Err(LoxError::runtime(name.line, "Only instances have properties")),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object: Value<'src> = self.evaluate(object)?;

                let Value::Instance(instance) = object else {
                    return Err(LoxError::runtime(name.line, "Only instances have fields"));
                };

                let value: Value<'src> = self.evaluate(value)?;
                instance.set(name.lexeme, value.clone());

                Ok(value)
            }

            Expr::This { keyword, id } => {
                self.look_up_variable(keyword.lexeme, *id, keyword.line)
            }

            Expr::Super {
                keyword,
                method,
                id,
            } => self.evaluate_super(keyword, method, *id),

            Expr::Lambda { params, body } => {
                let lambda: LoxLambda<'src> = LoxLambda::new(
                    params.clone(),
                    Rc::clone(body),
                    Rc::clone(&self.environment),
                );

                Ok(Value::Lambda(Rc::new(lambda)))
            }
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr<'src>,
        operator: &Token<'src>,
        right: &Expr<'src>,
    ) -> Result<Value<'src>> {
        let left_val: Value<'src> = self.evaluate(left)?;
        let right_val: Value<'src> = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = Self::number_operands(operator, &left_val, &right_val)?;

                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = Self::number_operands(operator, &left_val, &right_val)?;

                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = Self::number_operands(operator, &left_val, &right_val)?;

                if b == 0.0 {
                    return Err(LoxError::runtime(operator.line, "Division by zero"));
                }

                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = Self::number_operands(operator, &left_val, &right_val)?;

                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = Self::number_operands(operator, &left_val, &right_val)?;

                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = Self::number_operands(operator, &left_val, &right_val)?;

                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = Self::number_operands(operator, &left_val, &right_val)?;

                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator")),
        }
    }

    fn number_operands(
        operator: &Token<'src>,
        left: &Value<'src>,
        right: &Value<'src>,
    ) -> Result<(f64, f64)> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
            _ => Err(LoxError::runtime(operator.line, "Operands must be numbers")),
        }
    }

    /// Resolved occurrences read the frame at their recorded distance;
    /// everything else is a global.
    fn look_up_variable(&self, name: &str, id: ExprId, line: usize) -> Result<Value<'src>> {
        match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, name, line),
            None => self.globals.borrow().get(name, line),
        }
    }

    fn evaluate_super(
        &mut self,
        keyword: &Token<'src>,
        method: &Token<'src>,
        id: ExprId,
    ) -> Result<Value<'src>> {
        let distance: usize = match self.locals.get(&id) {
            Some(d) => *d,
            None => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Cannot use 'super' outside of a class",
                ));
            }
        };

        let superclass: Rc<LoxClass<'src>> =
            match Environment::get_at(&self.environment, distance, "super", keyword.line)? {
                Value::Class(class) => class,
                _ => {
                    return Err(LoxError::runtime(keyword.line, "Superclass must be a class"));
                }
            };

        // 'this' lives in the binding scope directly under the 'super'
        // scope.
        let instance: Rc<LoxInstance<'src>> =
            match Environment::get_at(&self.environment, distance - 1, "this", keyword.line)? {
                Value::Instance(instance) => instance,
                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Only instances have properties",
                    ));
                }
            };

        match superclass.find_method(method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'", method.lexeme),
            )),
        }
    }

    // ───────────────────────── call machinery ─────────────────────

    /// Dispatches a call to whichever callable `callee` holds.
    fn invoke_callable(
        &mut self,
        callee: &Value<'src>,
        paren: &Token<'src>,
        arguments: &[Value<'src>],
    ) -> Result<Value<'src>> {
        match callee {
            Value::NativeFunction { name, arity, func } => {
                debug!("Calling native function '{}'", name);

                Self::check_arity(*arity, arguments.len(), paren)?;

                func(arguments).map_err(|message: String| LoxError::runtime(paren.line, message))
            }

            Value::Function(function) => {
                debug!("Calling function '{}'", function.name());

                Self::check_arity(function.arity(), arguments.len(), paren)?;

                self.call_function(function, arguments)
            }

            Value::Lambda(lambda) => {
                debug!("Calling lambda");

                Self::check_arity(lambda.arity(), arguments.len(), paren)?;

                let completion: Completion<'src> = self.run_body(
                    lambda.params(),
                    lambda.body(),
                    lambda.closure(),
                    arguments,
                )?;

                match completion {
                    Completion::Returned(value) => Ok(value),
                    _ => Ok(Value::Nil),
                }
            }

            Value::Class(class) => {
                debug!("Instantiating class '{}'", class.name());

                Self::check_arity(class.arity(), arguments.len(), paren)?;

                let instance: Rc<LoxInstance<'src>> =
                    Rc::new(LoxInstance::new(Rc::clone(class)));

                if let Some(init) = class.find_method("init") {
                    self.call_function(&init.bind(Rc::clone(&instance)), arguments)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes",
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &LoxFunction<'src>,
        arguments: &[Value<'src>],
    ) -> Result<Value<'src>> {
        let completion: Completion<'src> = self.run_body(
            function.params(),
            function.body(),
            function.closure(),
            arguments,
        )?;

        // An initializer evaluates to its instance no matter how the body
        // completed.
        if function.is_initializer() {
            return Environment::get_at(function.closure(), 0, "this", function.line());
        }

        match completion {
            Completion::Returned(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    /// Binds `arguments` in a fresh frame parented on `closure`, then runs
    /// `body` in it.
    fn run_body(
        &mut self,
        params: &[&'src Token<'src>],
        body: &Rc<Vec<Stmt<'src>>>,
        closure: &Rc<RefCell<Environment<'src>>>,
        arguments: &[Value<'src>],
    ) -> Result<Completion<'src>> {
        let mut frame: Environment<'src> = Environment::with_enclosing(Rc::clone(closure));

        for (param, argument) in params.iter().zip(arguments.iter()) {
            frame.define(param.lexeme, Some(argument.clone()));
        }

        self.execute_block(body.as_slice(), frame)
    }

    fn check_arity(expected: usize, got: usize, paren: &Token<'src>) -> Result<()> {
        if got != expected {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}", expected, got),
            ));
        }

        Ok(())
    }
}
