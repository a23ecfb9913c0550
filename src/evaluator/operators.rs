use super::{EvalError, EvalResult, Interpreter};
use crate::ast::{BinaryOp, Expr, Literal, LiteralKind};
use crate::environment::Env;
use crate::source::Position;
use crate::types::Value;
use std::cmp::Ordering;

/// Evaluates `left op right`. `&&` and `||` only evaluate the right side
/// when they need it, and always produce a boolean.
pub(super) fn binary(
    interpreter: &mut Interpreter<'_>,
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    env: &Env,
    pos: Position,
) -> EvalResult {
    match op {
        BinaryOp::And => {
            if !interpreter.evaluate(left, env)?.is_truthy() {
                return Ok(Value::boolean(false));
            }
            Ok(Value::boolean(interpreter.evaluate(right, env)?.is_truthy()))
        }
        BinaryOp::Or => {
            if interpreter.evaluate(left, env)?.is_truthy() {
                return Ok(Value::boolean(true));
            }
            Ok(Value::boolean(interpreter.evaluate(right, env)?.is_truthy()))
        }
        _ => {
            let left = interpreter.evaluate(left, env)?;
            let right = interpreter.evaluate(right, env)?;
            apply(op, &left, &right, pos)
        }
    }
}

/// Applies a non-short-circuiting operator to two evaluated operands.
pub fn apply(op: BinaryOp, left: &Value, right: &Value, pos: Position) -> EvalResult {
    match op {
        BinaryOp::Equal | BinaryOp::StrictEqual => Ok(Value::boolean(left.equals(right))),
        BinaryOp::NotEqual | BinaryOp::StrictNotEqual => Ok(Value::boolean(!left.equals(right))),
        _ => match (left.as_literal(), right.as_literal()) {
            (Some(a), Some(b)) => arithmetic(op, a, b, pos),
            _ => Err(EvalError::InvalidOperands { op, pos }),
        },
    }
}

fn arithmetic(op: BinaryOp, a: &Literal, b: &Literal, pos: Position) -> EvalResult {
    let invalid = || EvalError::InvalidOperands { op, pos };
    let numbers = || a.as_number().zip(b.as_number());

    match op {
        BinaryOp::Add => {
            if let Some((x, y)) = numbers() {
                return Ok(Value::number(x + y));
            }
            if a.is_nullish() || b.is_nullish() {
                return Err(invalid());
            }
            Ok(Value::string(format!("{}{}", a.text, b.text)))
        }
        BinaryOp::Sub => numbers().map(|(x, y)| Value::number(x - y)).ok_or_else(invalid),
        BinaryOp::Mul => numbers().map(|(x, y)| Value::number(x * y)).ok_or_else(invalid),
        BinaryOp::Div => {
            let (x, y) = numbers().ok_or_else(invalid)?;
            if y == 0.0 {
                return Err(EvalError::DivisionByZero(pos));
            }
            Ok(Value::number(x / y))
        }
        BinaryOp::Rem => {
            numbers().ok_or_else(invalid)?;
            let (Some(x), Some(y)) = (a.as_integer(), b.as_integer()) else {
                return Err(EvalError::NonIntegerOperands(pos));
            };
            if y == 0 {
                return Err(EvalError::DivisionByZero(pos));
            }
            Ok(Value::number(x.wrapping_rem(y) as f64))
        }
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = match (a.kind, b.kind) {
                (LiteralKind::Number, LiteralKind::Number) => {
                    let (x, y) = numbers().ok_or_else(invalid)?;
                    x.partial_cmp(&y).ok_or_else(invalid)?
                }
                (LiteralKind::String, LiteralKind::String) => a.text.cmp(&b.text),
                _ => return Err(invalid()),
            };
            let result = match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::boolean(result))
        }
        _ => Err(invalid()),
    }
}
