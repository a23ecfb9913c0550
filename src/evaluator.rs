use crate::ast::{Assignment, BinaryOp, Expr, ExprKind, ForStmt, IfStmt, Key, LiteralKind, Stmt, StmtKind};
use crate::environment::{EnvError, Env, Environment};
use crate::source::Position;
use crate::types::{Function, FunctionBody, Property, PropertyKey, Value};
use std::io::Write;
use std::rc::Rc;
use std::time::{Duration, Instant};
use thiserror::Error;

mod operators;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("cannot use '{op}' operator. {pos}")]
    InvalidOperands { op: BinaryOp, pos: Position },
    #[error("cannot divide by zero. {0}")]
    DivisionByZero(Position),
    #[error("cannot use '%' operator with non-integer operands. {0}")]
    NonIntegerOperands(Position),
    #[error("'{0}' is not a function. {1}")]
    NotAFunction(String, Position),
    #[error("index out of range. {0}")]
    IndexOutOfRange(Position),
    #[error("invalid index. {0}")]
    InvalidIndex(Position),
    #[error("unsupported property key. {0}")]
    UnsupportedPropertyKey(Position),
    #[error("cannot access a property of {0}. {1}")]
    NotAContainer(&'static str, Position),
    #[error("cannot assign to a character of a string. {0}")]
    ImmutableString(Position),
    #[error("invalid assignment target. {0}")]
    InvalidAssignmentTarget(Position),
    #[error("break/continue is not in a loop. {0}")]
    NotInLoop(Position),
    #[error("execution timed out. {0}")]
    Timeout(Position),
    /// Raised by natives that were handed the wrong arguments.
    #[error("{0}. {1}")]
    InvalidArguments(String, Position),
    #[error("cannot write output: {0}. {1}")]
    Output(String, Position),
}

impl EvalError {
    pub fn pos(&self) -> Position {
        match self {
            EvalError::EnvError(EnvError::UndefinedVariable(_, pos)) => *pos,
            EvalError::InvalidOperands { pos, .. } => *pos,
            EvalError::NotAFunction(_, pos)
            | EvalError::NotAContainer(_, pos)
            | EvalError::InvalidArguments(_, pos)
            | EvalError::Output(_, pos) => *pos,
            EvalError::DivisionByZero(pos)
            | EvalError::NonIntegerOperands(pos)
            | EvalError::IndexOutOfRange(pos)
            | EvalError::InvalidIndex(pos)
            | EvalError::UnsupportedPropertyKey(pos)
            | EvalError::ImmutableString(pos)
            | EvalError::InvalidAssignmentTarget(pos)
            | EvalError::NotInLoop(pos)
            | EvalError::Timeout(pos) => *pos,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// How a statement finished. Anything but `Normal` unwinds the enclosing
/// statement lists until a loop or a call takes care of it.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break(Position),
    Continue(Position),
    Return(Value),
}

/// The binding a native finds its `index`th argument under.
pub fn arg_name(index: usize) -> String {
    format!("_args{}_", index)
}

#[derive(Debug, Clone, Default)]
pub struct InterpretOptions {
    /// Abort with `execution timed out` once a run has taken this long.
    pub timeout: Option<Duration>,
}

/// A property reference on the way to being read or written.
enum Access<'k> {
    Name(&'k str),
    Computed(Value),
}

/// Tree-walking evaluator. Holds the output sink natives write to and an
/// optional deadline, checked before every statement.
pub struct Interpreter<'w> {
    output: &'w mut dyn Write,
    deadline: Option<Instant>,
}

impl<'w> Interpreter<'w> {
    pub fn new(output: &'w mut dyn Write) -> Self {
        Interpreter {
            output,
            deadline: None,
        }
    }

    pub fn with_options(output: &'w mut dyn Write, options: &InterpretOptions) -> Self {
        Interpreter {
            output,
            deadline: options.timeout.map(|timeout| Instant::now() + timeout),
        }
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    fn check_deadline(&self, pos: Position) -> EvalResult<()> {
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(EvalError::Timeout(pos));
        }
        Ok(())
    }

    /// Runs `program` as the body of an implicit top-level function and
    /// returns what it returned (`undefined` when it falls off the end).
    pub fn run(&mut self, program: &[Stmt], env: &Env) -> EvalResult {
        log::debug!("running {} statements", program.len());
        let result = match self.execute_block(program, env)? {
            Flow::Normal => Ok(Value::undefined()),
            Flow::Return(value) => Ok(value),
            Flow::Break(pos) | Flow::Continue(pos) => Err(EvalError::NotInLoop(pos)),
        };
        log::debug!("program finished");
        result
    }

    /// Executes statements in order, stopping at the first one that does not
    /// finish normally.
    pub fn execute_block(&mut self, body: &[Stmt], env: &Env) -> EvalResult<Flow> {
        for stmt in body {
            let flow = self.execute(stmt, env)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    pub fn execute(&mut self, stmt: &Stmt, env: &Env) -> EvalResult<Flow> {
        self.check_deadline(stmt.pos)?;
        match &stmt.kind {
            StmtKind::Var(declarators) => {
                for declarator in declarators {
                    let value = match &declarator.init {
                        Some(init) => self.evaluate(init, env)?,
                        None => Value::undefined(),
                    };
                    env.borrow_mut().define(declarator.name.as_str(), value);
                }
                Ok(Flow::Normal)
            }
            StmtKind::Assign(assignment) => {
                self.assign(assignment, env)?;
                Ok(Flow::Normal)
            }
            StmtKind::Expr(expr) => {
                self.evaluate(expr, env)?;
                Ok(Flow::Normal)
            }
            // A bare block shares the scope it appears in
            StmtKind::Block(body) => self.execute_block(body, env),
            StmtKind::If(if_stmt) => self.execute_if(if_stmt, env),
            StmtKind::For(for_stmt) => self.execute_for(for_stmt, env, stmt.pos),
            StmtKind::Function(decl) => {
                let function = Function {
                    name: Some(decl.name.clone()),
                    params: decl.params.clone(),
                    body: FunctionBody::Script(decl.body.clone()),
                    env: Environment::new_enclosed(env.clone()),
                };
                env.borrow_mut()
                    .define(decl.name.as_str(), Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }
            StmtKind::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::undefined(),
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Break => Ok(Flow::Break(stmt.pos)),
            StmtKind::Continue => Ok(Flow::Continue(stmt.pos)),
        }
    }

    /// One link of an if/elif/else chain. Each link gets a block scope nested
    /// in the previous one, so an `init` binding is visible down the chain.
    fn execute_if(&mut self, if_stmt: &IfStmt, env: &Env) -> EvalResult<Flow> {
        let scope = Environment::new_enclosed(env.clone());
        if let Some(init) = &if_stmt.init {
            self.execute(init, &scope)?;
        }
        let taken = match &if_stmt.test {
            Some(test) => self.evaluate(test, &scope)?.is_truthy(),
            None => true,
        };
        if taken {
            self.execute_block(&if_stmt.consequent, &scope)
        } else if let Some(alternate) = &if_stmt.alternate {
            self.execute_if(alternate, &scope)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn execute_for(&mut self, for_stmt: &ForStmt, env: &Env, pos: Position) -> EvalResult<Flow> {
        let scope = Environment::new_enclosed(env.clone());
        if let Some(init) = &for_stmt.init {
            self.execute(init, &scope)?;
        }
        loop {
            self.check_deadline(pos)?;
            if let Some(test) = &for_stmt.test
                && !self.evaluate(test, &scope)?.is_truthy()
            {
                break;
            }
            match self.execute_block(&for_stmt.body, &scope)? {
                Flow::Break(_) => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue(_) => {}
            }
            if let Some(update) = &for_stmt.update {
                self.assign(update, &scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, assignment: &Assignment, env: &Env) -> EvalResult<()> {
        let value = self.evaluate(&assignment.value, env)?;
        let target = &assignment.target;
        match &target.kind {
            ExprKind::Variable(name) if assignment.declare => {
                env.borrow_mut().define(name.as_str(), value);
            }
            ExprKind::Variable(name) => env.borrow_mut().assign(name, value, target.pos)?,
            ExprKind::Member { object, property } => {
                let object = self.evaluate(object, env)?;
                let access = self.access(property, env)?;
                set_member(&object, access, value, target.pos)?;
            }
            _ => return Err(EvalError::InvalidAssignmentTarget(target.pos)),
        }
        Ok(())
    }

    /// Evaluates an expression to a value.
    pub fn evaluate(&mut self, expr: &Expr, env: &Env) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(Value::Literal(literal.clone())),
            ExprKind::Variable(name) => Ok(env.borrow().get(name, expr.pos)?),
            ExprKind::Array(elements) => {
                let values = elements
                    .iter()
                    .map(|element| self.evaluate(element, env))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::array(values))
            }
            ExprKind::Object(definitions) => {
                let mut properties: Vec<Property> = Vec::with_capacity(definitions.len());
                for definition in definitions {
                    let key = match &definition.key {
                        Key::Name(name) => PropertyKey::Name(name.clone()),
                        Key::Computed(key) => match self.evaluate(key, env)? {
                            Value::Literal(literal) => PropertyKey::Literal(literal),
                            _ => return Err(EvalError::UnsupportedPropertyKey(key.pos)),
                        },
                    };
                    let value = self.evaluate(&definition.value, env)?;
                    // A repeated key keeps its first slot and takes the later value
                    match properties.iter_mut().find(|p| same_key(&p.key, &key)) {
                        Some(existing) => existing.value = value,
                        None => properties.push(Property { key, value }),
                    }
                }
                Ok(Value::object(properties))
            }
            ExprKind::Binary {
                op, left, right, ..
            } => operators::binary(self, *op, left, right, env, expr.pos),
            ExprKind::Unary(operand) => {
                let value = self.evaluate(operand, env)?;
                Ok(Value::boolean(!value.is_truthy()))
            }
            ExprKind::Member { object, property } => {
                let object = self.evaluate(object, env)?;
                let access = self.access(property, env)?;
                get_member(&object, access, expr.pos)
            }
            ExprKind::Call { callee, args } => {
                let function = match self.evaluate(callee, env)? {
                    Value::Function(function) => function,
                    other => return Err(EvalError::NotAFunction(other.to_string(), callee.pos)),
                };
                let args = args
                    .iter()
                    .map(|arg| self.evaluate(arg, env))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.call_function(&function, args, expr.pos)
            }
            ExprKind::Function(literal) => {
                let function = literal.closure.get_or_init(|| {
                    Rc::new(Function {
                        name: None,
                        params: literal.params.clone(),
                        body: FunctionBody::Script(literal.body.clone()),
                        env: Environment::new_enclosed(env.clone()),
                    })
                });
                Ok(Value::Function(function.clone()))
            }
        }
    }

    fn access<'k>(&mut self, key: &'k Key, env: &Env) -> EvalResult<Access<'k>> {
        Ok(match key {
            Key::Name(name) => Access::Name(name),
            Key::Computed(expr) => Access::Computed(self.evaluate(expr, env)?),
        })
    }

    /// Calls `function` with already evaluated arguments. Natives use this
    /// to call back into script functions.
    pub fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        pos: Position,
    ) -> EvalResult {
        log::trace!("calling {} with {} argument(s)", function, args.len());
        bind_arguments(function, args);
        match &function.body {
            FunctionBody::Native(native) => native(self, &function.env, pos),
            FunctionBody::Script(body) => match self.execute_block(body, &function.env)? {
                Flow::Normal => Ok(Value::undefined()),
                Flow::Return(value) => Ok(value),
                Flow::Break(_) | Flow::Continue(_) => Err(EvalError::NotInLoop(pos)),
            },
        }
    }
}

/// Rebinds parameters and `_argsN_` names inside the function's own
/// environment. Synthetic names left over from a longer earlier call are
/// dropped so natives see exactly this call's arguments.
fn bind_arguments(function: &Function, args: Vec<Value>) {
    let mut env = function.env.borrow_mut();
    for (i, param) in function.params.iter().enumerate() {
        let value = args.get(i).cloned().unwrap_or_else(Value::undefined);
        env.define(param.as_str(), value);
    }
    let mut stale = args.len();
    while env.remove_local(&arg_name(stale)).is_some() {
        stale += 1;
    }
    for (i, arg) in args.into_iter().enumerate() {
        env.define(arg_name(i), arg);
    }
}

fn same_key(a: &PropertyKey, b: &PropertyKey) -> bool {
    match b {
        PropertyKey::Name(name) => a.matches_name(name),
        PropertyKey::Literal(literal) => a.matches_literal(literal),
    }
}

fn array_index(index: &Value, len: usize, pos: Position) -> EvalResult<usize> {
    let Some(index) = index.as_literal().and_then(|l| l.as_integer()) else {
        return Err(EvalError::InvalidIndex(pos));
    };
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(EvalError::IndexOutOfRange(pos))
}

fn find_property<'p>(properties: &'p mut [Property], access: &Access<'_>, pos: Position) -> EvalResult<Option<&'p mut Property>> {
    Ok(match access {
        Access::Name(name) => properties.iter_mut().find(|p| p.key.matches_name(name)),
        Access::Computed(Value::Literal(literal)) => {
            properties.iter_mut().find(|p| p.key.matches_literal(literal))
        }
        Access::Computed(_) => return Err(EvalError::UnsupportedPropertyKey(pos)),
    })
}

/// Reads `object.name` or `object[key]`. A missing object key reads as
/// `undefined`; strings index to one-character strings.
fn get_member(object: &Value, access: Access<'_>, pos: Position) -> EvalResult {
    match (object, &access) {
        (Value::Object(properties), _) => {
            let mut properties = properties.borrow_mut();
            Ok(find_property(&mut properties, &access, pos)?
                .map_or_else(Value::undefined, |p| p.value.clone()))
        }
        (Value::Array(elements), Access::Computed(index)) => {
            let elements = elements.borrow();
            let i = array_index(index, elements.len(), pos)?;
            Ok(elements[i].clone())
        }
        (Value::Literal(literal), Access::Computed(index))
            if literal.kind == LiteralKind::String =>
        {
            let chars: Vec<char> = literal.text.chars().collect();
            let i = array_index(index, chars.len(), pos)?;
            Ok(Value::string(chars[i].to_string()))
        }
        (Value::Array(_), Access::Name(_)) => Err(EvalError::UnsupportedPropertyKey(pos)),
        (Value::Literal(literal), Access::Name(_))
            if literal.kind == LiteralKind::String =>
        {
            Err(EvalError::UnsupportedPropertyKey(pos))
        }
        (other, _) => Err(EvalError::NotAContainer(other.type_name(), pos)),
    }
}

/// Writes `object.name = value` or `object[key] = value` in place. A missing
/// object key is appended; array slots must already exist.
fn set_member(object: &Value, access: Access<'_>, value: Value, pos: Position) -> EvalResult<()> {
    match (object, access) {
        (Value::Object(properties), access) => {
            let mut properties = properties.borrow_mut();
            if let Some(property) = find_property(&mut properties, &access, pos)? {
                property.value = value;
                return Ok(());
            }
            let key = match access {
                Access::Name(name) => PropertyKey::Name(name.to_string()),
                Access::Computed(Value::Literal(literal)) => PropertyKey::Literal(literal),
                Access::Computed(_) => return Err(EvalError::UnsupportedPropertyKey(pos)),
            };
            properties.push(Property { key, value });
            Ok(())
        }
        (Value::Array(elements), Access::Computed(index)) => {
            let mut elements = elements.borrow_mut();
            let i = array_index(&index, elements.len(), pos)?;
            elements[i] = value;
            Ok(())
        }
        (Value::Array(_), Access::Name(_)) => Err(EvalError::UnsupportedPropertyKey(pos)),
        (Value::Literal(literal), _) if literal.kind == LiteralKind::String => {
            Err(EvalError::ImmutableString(pos))
        }
        (other, _) => Err(EvalError::NotAContainer(other.type_name(), pos)),
    }
}
