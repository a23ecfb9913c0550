use crate::ast::{Literal, LiteralKind, Stmt};
use crate::environment::Env;
use crate::evaluator::{EvalResult, Interpreter};
use crate::source::Position;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

/// A host-provided function. It reads its arguments from the bindings of
/// its own environment (`_args0_`, `_args1_`, ... and any named params).
pub type NativeFn = Rc<dyn Fn(&mut Interpreter<'_>, &Env, Position) -> EvalResult<Value>>;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<Vec<Property>>>;

/// A runtime value. Literals compare by kind and text; arrays, objects
/// and functions are shared by reference and compare by identity.
#[derive(Clone)]
pub enum Value {
    Literal(Literal),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(Rc<Function>),
}

impl Value {
    pub fn undefined() -> Self {
        Value::Literal(Literal::undefined())
    }

    pub fn null() -> Self {
        Value::Literal(Literal::null())
    }

    pub fn number(n: f64) -> Self {
        Value::Literal(Literal::number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Literal(Literal::string(s))
    }

    pub fn boolean(b: bool) -> Self {
        Value::Literal(Literal::boolean(b))
    }

    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn object(properties: Vec<Property>) -> Self {
        Value::Object(Rc::new(RefCell::new(properties)))
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Literal(l) if l.kind == LiteralKind::Undefined)
    }

    /// Arrays, objects and functions are always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Literal(literal) => literal.is_truthy(),
            _ => true,
        }
    }

    /// The language's `==`: structural for two literals, identity otherwise.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Literal(a), Value::Literal(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Literal(literal) => literal.kind.name(),
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Like `Display`, but strings keep their quotes.
    pub fn repr(&self) -> String {
        match self {
            Value::Literal(l) if l.kind == LiteralKind::String => format!("\"{}\"", l.text),
            other => other.to_string(),
        }
    }
}

// Implement Display trait for printing values the way `echo` shows them
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(literal) => f.write_str(&literal.text),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element.repr())?;
                }
                write!(f, "]")
            }
            Value::Object(properties) => {
                write!(f, "{{")?;
                for (i, property) in properties.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", property.key, property.value.repr())?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => write!(f, "{}", function),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(literal) => write!(f, "Literal({:?}, {:?})", literal.kind, literal.text),
            Value::Function(function) => write!(f, "Function({})", function),
            other => write!(f, "{}({})", other.type_name(), other.repr()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PropertyKey {
    Name(String),
    /// A key produced by a `[expr]` definition, kept as its literal.
    Literal(Literal),
}

impl PropertyKey {
    /// `a.name` matches a named key or a computed key with the same text.
    pub fn matches_name(&self, name: &str) -> bool {
        match self {
            PropertyKey::Name(key) => key == name,
            PropertyKey::Literal(key) => key.text == name,
        }
    }

    /// `a[key]` matches an equal computed key, or a named key when `key` is a string.
    pub fn matches_literal(&self, literal: &Literal) -> bool {
        match self {
            PropertyKey::Name(key) => literal.kind == LiteralKind::String && *key == literal.text,
            PropertyKey::Literal(key) => key == literal,
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Literal(l) if l.kind == LiteralKind::String => write!(f, "\"{}\"", l.text),
            PropertyKey::Literal(l) => write!(f, "[{}]", l.text),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub key: PropertyKey,
    pub value: Value,
}

impl Property {
    pub fn named(name: impl Into<String>, value: Value) -> Self {
        Property {
            key: PropertyKey::Name(name.into()),
            value,
        }
    }
}

#[derive(Clone)]
pub enum FunctionBody {
    Script(Rc<[Stmt]>),
    Native(NativeFn),
}

/// A callable value. `env` is created once, when the value is made, and
/// every call rebinds the parameters inside it.
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    pub env: Env,
}

impl Function {
    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func")?;
        if let Some(name) = &self.name {
            write!(f, " {}", name)?;
        }
        write!(f, "({})", self.params.join(", "))?;
        match self.body {
            FunctionBody::Script(_) => write!(f, " {{...}}"),
            FunctionBody::Native(_) => write!(f, " {{ [native code] }}"),
        }
    }
}

// The captured environment usually refers back to this function, so it is
// never printed.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_nested_values() {
        let value = Value::array(vec![
            Value::string("x"),
            Value::number(2.0),
            Value::object(vec![Property::named("a", Value::boolean(true))]),
        ]);
        assert_eq!(value.to_string(), "[\"x\", 2, {a: #t}]");
        assert_eq!(Value::string("plain").to_string(), "plain");
        assert_eq!(Value::string("plain").repr(), "\"plain\"");
    }

    #[test]
    fn test_equality_semantics() {
        assert!(Value::number(2.2).equals(&Value::number(2.2)));
        assert!(!Value::number(1.0).equals(&Value::string("1")));

        let a = Value::object(vec![Property::named("k", Value::number(1.0))]);
        let b = Value::object(vec![Property::named("k", Value::number(1.0))]);
        assert!(!a.equals(&b));
        assert!(a.equals(&a.clone()));
    }

    #[test]
    fn test_property_key_matching() {
        let named = PropertyKey::Name("b".to_string());
        let computed = PropertyKey::Literal(Literal::string("b"));
        let numeric = PropertyKey::Literal(Literal::number(1.0));

        assert!(named.matches_name("b"));
        assert!(computed.matches_name("b"));
        assert!(named.matches_literal(&Literal::string("b")));
        assert!(computed.matches_literal(&Literal::string("b")));
        assert!(numeric.matches_literal(&Literal::number(1.0)));
        assert!(!numeric.matches_literal(&Literal::string("1")));
    }

    #[test]
    fn test_truthiness_of_containers() {
        assert!(Value::array(vec![]).is_truthy());
        assert!(Value::object(vec![]).is_truthy());
        assert!(!Value::undefined().is_truthy());
    }
}
