use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::source::Position;
use crate::types::Function;

// --- Literals ---

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LiteralKind {
    Number,
    String,
    Boolean,
    Null,
    Undefined,
}

impl LiteralKind {
    pub fn name(self) -> &'static str {
        match self {
            LiteralKind::Number => "number",
            LiteralKind::String => "string",
            LiteralKind::Boolean => "boolean",
            LiteralKind::Null => "null",
            LiteralKind::Undefined => "undefined",
        }
    }
}

/// A primitive value kept in its canonical textual form.
/// Two literals are equal iff both kind and text match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: String,
}

pub const TRUE_TEXT: &str = "#t";
pub const FALSE_TEXT: &str = "#f";

impl Literal {
    pub fn new(kind: LiteralKind, text: impl Into<String>) -> Self {
        Literal {
            kind,
            text: text.into(),
        }
    }

    pub fn number(n: f64) -> Self {
        Literal::new(LiteralKind::Number, format_number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Literal::new(LiteralKind::String, s)
    }

    pub fn boolean(b: bool) -> Self {
        Literal::new(LiteralKind::Boolean, if b { TRUE_TEXT } else { FALSE_TEXT })
    }

    pub fn null() -> Self {
        Literal::new(LiteralKind::Null, "null")
    }

    pub fn undefined() -> Self {
        Literal::new(LiteralKind::Undefined, "undefined")
    }

    pub fn is_number(&self) -> bool {
        self.kind == LiteralKind::Number
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self.kind, LiteralKind::Null | LiteralKind::Undefined)
    }

    /// Parses the text of a number literal; `None` for every other kind.
    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            LiteralKind::Number => self.text.parse().ok(),
            _ => None,
        }
    }

    /// Parses the text of a number literal that has no fractional part.
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            LiteralKind::Number => self.text.parse().ok(),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self.kind {
            LiteralKind::Number => self.as_number().is_some_and(|n| n != 0.0),
            LiteralKind::String => !self.text.is_empty(),
            LiteralKind::Boolean => self.text == TRUE_TEXT,
            LiteralKind::Null | LiteralKind::Undefined => false,
        }
    }
}

/// Canonical text of a computed number: `3`, `3.5`, `-0.25`.
pub fn format_number(n: f64) -> String {
    format!("{}", n)
}

// --- Operators ---

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    And,
    Or,
}

impl BinaryOp {
    /// Binding strength; a larger level binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => 4,
            BinaryOp::Equal | BinaryOp::StrictEqual | BinaryOp::NotEqual | BinaryOp::StrictNotEqual => 3,
            BinaryOp::And => 2,
            BinaryOp::Or => 1,
        }
    }

    /// `Greater` when `self` binds tighter than `other`.
    pub fn compare(self, other: BinaryOp) -> Ordering {
        self.precedence().cmp(&other.precedence())
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::StrictEqual => "===",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// --- Expressions ---

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(String),
    Array(Vec<Expr>),
    Object(Vec<PropertyDef>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        grouped: bool,
    },
    /// Logical negation, the only prefix operator.
    Unary(Box<Expr>),
    Member {
        object: Box<Expr>,
        property: Key,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Function(Rc<FunctionLiteral>),
}

/// The key of a property definition or member access.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// `a.b`, `{b: 1}`
    Name(String),
    /// `a[expr]`, `{[expr]: 1}`
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDef {
    pub key: Key,
    pub value: Expr,
}

/// `func(params) { body }` used as a value. The closure is created the
/// first time the literal is evaluated and shared by every later evaluation.
pub struct FunctionLiteral {
    pub params: Vec<String>,
    pub body: Rc<[Stmt]>,
    pub(crate) closure: OnceCell<Rc<Function>>,
}

impl FunctionLiteral {
    pub fn new(params: Vec<String>, body: Vec<Stmt>) -> Self {
        FunctionLiteral {
            params,
            body: body.into(),
            closure: OnceCell::new(),
        }
    }
}

impl fmt::Debug for FunctionLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionLiteral")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish()
    }
}

impl PartialEq for FunctionLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.body == other.body
    }
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Expr { kind, pos }
    }

    pub fn literal(literal: Literal, pos: Position) -> Self {
        Expr::new(ExprKind::Literal(literal), pos)
    }

    pub fn variable(name: impl Into<String>, pos: Position) -> Self {
        Expr::new(ExprKind::Variable(name.into()), pos)
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr, pos: Position) -> Self {
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                grouped: false,
            },
            pos,
        )
    }

    pub fn unary(operand: Expr, pos: Position) -> Self {
        Expr::new(ExprKind::Unary(Box::new(operand)), pos)
    }

    pub fn member(object: Expr, property: Key, pos: Position) -> Self {
        Expr::new(
            ExprKind::Member {
                object: Box::new(object),
                property,
            },
            pos,
        )
    }

    pub fn call(callee: Expr, args: Vec<Expr>, pos: Position) -> Self {
        Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            pos,
        )
    }

    pub fn is_assignable(&self) -> bool {
        matches!(self.kind, ExprKind::Variable(_) | ExprKind::Member { .. })
    }
}

// --- Statements ---

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Var(Vec<Declarator>),
    Assign(Assignment),
    Expr(Expr),
    Block(Vec<Stmt>),
    If(IfStmt),
    For(ForStmt),
    Function(FunctionDecl),
    Return(Option<Expr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub init: Option<Expr>,
}

/// `target = value`, or `target := value` when `declare` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: Expr,
    pub value: Expr,
    pub declare: bool,
}

/// One link of an `if`/`elif`/`else` chain. The final `else` has no test.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub test: Option<Expr>,
    pub consequent: Vec<Stmt>,
    pub alternate: Option<Box<IfStmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub test: Option<Expr>,
    pub update: Option<Assignment>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<[Stmt]>,
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: Position) -> Self {
        Stmt { kind, pos }
    }
}

// --- Printing ---
//
// Prefix notation with every operator node parenthesized, so the printed
// form shows exactly how the parser grouped things.

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LiteralKind::String => write!(f, "\"{}\"", self.text),
            _ => f.write_str(&self.text),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for item in items {
        write!(f, " {}", item)?;
    }
    Ok(())
}

fn write_block(f: &mut fmt::Formatter<'_>, body: &[Stmt]) -> fmt::Result {
    write!(f, "{{")?;
    for (i, stmt) in body.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", stmt)?;
    }
    write!(f, "}}")
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Computed(expr) => write!(f, "[{}]", expr),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(literal) => write!(f, "{}", literal),
            ExprKind::Variable(name) => f.write_str(name),
            ExprKind::Array(elements) => {
                write!(f, "(array")?;
                write_list(f, elements)?;
                write!(f, ")")
            }
            ExprKind::Object(properties) => {
                write!(f, "(object")?;
                for property in properties {
                    write!(f, " ({} {})", property.key, property.value)?;
                }
                write!(f, ")")
            }
            ExprKind::Binary {
                op,
                left,
                right,
                grouped,
            } => {
                if *grouped {
                    write!(f, "(group ({} {} {}))", op, left, right)
                } else {
                    write!(f, "({} {} {})", op, left, right)
                }
            }
            ExprKind::Unary(operand) => write!(f, "(! {})", operand),
            ExprKind::Member {
                object,
                property: Key::Name(name),
            } => write!(f, "(. {} {})", object, name),
            ExprKind::Member {
                object,
                property: Key::Computed(index),
            } => write!(f, "([] {} {})", object, index),
            ExprKind::Call { callee, args } => {
                write!(f, "(call {}", callee)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Function(literal) => {
                write!(f, "(func ({}) ", literal.params.join(" "))?;
                write_block(f, &literal.body)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.declare { ":=" } else { "=" };
        write!(f, "({} {} {})", op, self.target, self.value)
    }
}

impl fmt::Display for IfStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test {
            Some(test) => {
                if let Some(init) = &self.init {
                    write!(f, "{}; ", init)?;
                }
                write!(f, "{} ", test)?;
                write_block(f, &self.consequent)?;
                match &self.alternate {
                    Some(alternate) if alternate.test.is_some() => write!(f, " (elif {})", alternate),
                    Some(alternate) => write!(f, " {}", alternate),
                    None => Ok(()),
                }
            }
            None => {
                write!(f, "(else ")?;
                write_block(f, &self.consequent)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Var(declarators) => {
                write!(f, "(var")?;
                for declarator in declarators {
                    match &declarator.init {
                        Some(init) => write!(f, " ({} {})", declarator.name, init)?,
                        None => write!(f, " ({})", declarator.name)?,
                    }
                }
                write!(f, ")")
            }
            StmtKind::Assign(assignment) => write!(f, "{}", assignment),
            StmtKind::Expr(expr) => write!(f, "{}", expr),
            StmtKind::Block(body) => write_block(f, body),
            StmtKind::If(if_stmt) => write!(f, "(if {})", if_stmt),
            StmtKind::For(for_stmt) => {
                write!(f, "(for ")?;
                if for_stmt.init.is_some() || for_stmt.update.is_some() {
                    if let Some(init) = &for_stmt.init {
                        write!(f, "{}", init)?;
                    }
                    write!(f, "; ")?;
                    if let Some(test) = &for_stmt.test {
                        write!(f, "{}", test)?;
                    }
                    write!(f, "; ")?;
                    if let Some(update) = &for_stmt.update {
                        write!(f, "{} ", update)?;
                    }
                } else if let Some(test) = &for_stmt.test {
                    write!(f, "{} ", test)?;
                }
                write_block(f, &for_stmt.body)?;
                write!(f, ")")
            }
            StmtKind::Function(decl) => {
                write!(f, "(func {} ({}) ", decl.name, decl.params.join(" "))?;
                write_block(f, &decl.body)?;
                write!(f, ")")
            }
            StmtKind::Return(Some(argument)) => write!(f, "(return {})", argument),
            StmtKind::Return(None) => write!(f, "(return)"),
            StmtKind::Break => write!(f, "(break)"),
            StmtKind::Continue => write!(f, "(continue)"),
        }
    }
}
