//! Expression parsing.
//!
//! Operands are read left to right and every binary operator is inserted
//! into the tree built so far. An ungrouped node on the right edge that
//! binds strictly looser than the incoming operator keeps its place and the
//! new node sinks into its right child, so `1 + 2 * 3` becomes
//! `1 + (2 * 3)` while `1 * 2 * 3 - 4` stays left-associative. A
//! parenthesized binary node is marked `grouped` and is never descended into.

use super::{ParseResult, Parser, unexpected_token};
use crate::ast::{BinaryOp, Expr, ExprKind, FunctionLiteral, Key, Literal, LiteralKind, PropertyDef};
use crate::lexer::{Token, TokenKind};
use crate::source::Position;
use std::cmp::Ordering;
use std::rc::Rc;

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::Equal => BinaryOp::Equal,
        TokenKind::StrictEqual => BinaryOp::StrictEqual,
        TokenKind::NotEqual => BinaryOp::NotEqual,
        TokenKind::StrictNotEqual => BinaryOp::StrictNotEqual,
        TokenKind::And => BinaryOp::And,
        TokenKind::Or => BinaryOp::Or,
        _ => return None,
    };
    Some(op)
}

/// Adds `op operand` at the right edge of `tree`.
fn insert_operator(tree: Expr, op: BinaryOp, operand: Expr, pos: Position) -> Expr {
    match tree {
        Expr {
            kind:
                ExprKind::Binary {
                    op: outer,
                    left,
                    right,
                    grouped: false,
                },
            pos: outer_pos,
        } if outer.compare(op) == Ordering::Less => {
            let right = insert_operator(*right, op, operand, pos);
            Expr::new(
                ExprKind::Binary {
                    op: outer,
                    left,
                    right: Box::new(right),
                    grouped: false,
                },
                outer_pos,
            )
        }
        tree => Expr::binary(op, tree, operand, pos),
    }
}

/// Property and member names may be any word that is not a literal.
fn property_name(token: &Token) -> Option<String> {
    if token.is_identifier() || token.is_reserved() {
        Some(token.text().to_string())
    } else {
        None
    }
}

impl Parser {
    /// Parses one expression. Stops, without error, at the first token that
    /// cannot continue it.
    pub(crate) fn parse_expression(&mut self) -> ParseResult<Expr> {
        let mut tree = self.parse_operand()?;
        while let Some((op, pos)) = self.peek().and_then(|t| Some((binary_op(&t.kind)?, t.pos))) {
            self.next_token();
            let operand = self.parse_operand()?;
            tree = insert_operator(tree, op, operand, pos);
        }
        Ok(tree)
    }

    /// A primary expression with its postfix chain, under any number of `!`.
    fn parse_operand(&mut self) -> ParseResult<Expr> {
        let mut negations = Vec::new();
        while self.check(&TokenKind::Bang) {
            if let Some(bang) = self.next_token() {
                negations.push(bang.pos);
            }
        }
        let primary = self.parse_primary()?;
        let expr = self.parse_postfix(primary)?;
        Ok(negations
            .into_iter()
            .rev()
            .fold(expr, |operand, pos| Expr::unary(operand, pos)))
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("an expression"));
        };
        let pos = token.pos;
        match &token.kind {
            TokenKind::LParen => {
                self.next_token();
                self.parse_group()
            }
            TokenKind::LBracket => {
                self.next_token();
                let elements = self.parse_list(TokenKind::RBracket, "']'")?;
                Ok(Expr::new(ExprKind::Array(elements), pos))
            }
            TokenKind::LBrace => {
                self.next_token();
                self.parse_object(pos)
            }
            TokenKind::Str(text) => {
                self.next_token();
                Ok(Expr::literal(Literal::string(text.as_str()), pos))
            }
            TokenKind::Word(word) => {
                let literal = if token.is_number() {
                    Literal::new(LiteralKind::Number, word.as_str())
                } else if token.is_boolean() {
                    Literal::new(LiteralKind::Boolean, word.as_str())
                } else if token.is_keyword("null") {
                    Literal::null()
                } else if token.is_keyword("undefined") {
                    Literal::undefined()
                } else if token.is_keyword("func") {
                    self.next_token();
                    return self.parse_function_literal(pos);
                } else if token.is_identifier() {
                    self.next_token();
                    return Ok(Expr::variable(word.as_str(), pos));
                } else {
                    return Err(unexpected_token(&token, "an expression"));
                };
                self.next_token();
                Ok(Expr::literal(literal, pos))
            }
            _ => Err(unexpected_token(&token, "an expression")),
        }
    }

    /// After `(`: the inner expression, marked grouped if it is a binary node.
    fn parse_group(&mut self) -> ParseResult<Expr> {
        let inner = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')'")?;
        Ok(match inner {
            Expr {
                kind:
                    ExprKind::Binary {
                        op, left, right, ..
                    },
                pos,
            } => Expr::new(
                ExprKind::Binary {
                    op,
                    left,
                    right,
                    grouped: true,
                },
                pos,
            ),
            other => other,
        })
    }

    /// Comma-separated expressions up to and including `close`. A trailing
    /// comma is allowed.
    fn parse_list(&mut self, close: TokenKind, expected: &str) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.check(&close) {
                self.next_token();
                return Ok(items);
            }
            items.push(self.parse_expression()?);
            match self.peek() {
                Some(token) if token.kind == TokenKind::Comma => {
                    self.next_token();
                }
                Some(token) if token.kind == close => {}
                _ => return Err(self.unexpected(&format!("',' or {}", expected))),
            }
        }
    }

    /// After `{`: `name: value`, `"key": value` and `[expr]: value` pairs.
    fn parse_object(&mut self, pos: Position) -> ParseResult<Expr> {
        let mut properties = Vec::new();
        loop {
            let Some(token) = self.next_token() else {
                return Err(self.unexpected("'}'"));
            };
            let key = match &token.kind {
                TokenKind::RBrace => break,
                TokenKind::LBracket => {
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    Key::Computed(Box::new(key))
                }
                TokenKind::Str(text) => Key::Computed(Box::new(Expr::literal(
                    Literal::string(text.as_str()),
                    token.pos,
                ))),
                TokenKind::Word(word) if token.is_number() => Key::Computed(Box::new(
                    Expr::literal(Literal::new(LiteralKind::Number, word.as_str()), token.pos),
                )),
                _ => match property_name(&token) {
                    Some(name) => Key::Name(name),
                    None => return Err(unexpected_token(&token, "a property key")),
                },
            };
            self.expect(TokenKind::Colon, "':'")?;
            let value = self.parse_expression()?;
            properties.push(PropertyDef { key, value });

            match self.peek() {
                Some(token) if token.kind == TokenKind::Comma => {
                    self.next_token();
                }
                Some(token) if token.kind == TokenKind::RBrace => {}
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }
        Ok(Expr::new(ExprKind::Object(properties), pos))
    }

    /// After `func`: `(params) { body }` as a value.
    fn parse_function_literal(&mut self, pos: Position) -> ParseResult<Expr> {
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Expr::new(
            ExprKind::Function(Rc::new(FunctionLiteral::new(params, body))),
            pos,
        ))
    }

    /// Member accesses and calls applied to `expr`. Each node sits at the
    /// position of the `.`, `[` or `(` that introduced it.
    fn parse_postfix(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        while let Some(token) = self.peek() {
            let pos = token.pos;
            match token.kind {
                TokenKind::Dot => {
                    self.next_token();
                    let name = match self.peek() {
                        Some(name_token) => property_name(name_token)
                            .ok_or_else(|| unexpected_token(name_token, "a property name"))?,
                        None => return Err(self.unexpected("a property name")),
                    };
                    self.next_token();
                    expr = Expr::member(expr, Key::Name(name), pos);
                }
                TokenKind::LBracket => {
                    self.next_token();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::member(expr, Key::Computed(Box::new(index)), pos);
                }
                TokenKind::LParen => {
                    self.next_token();
                    let args = self.parse_list(TokenKind::RParen, "')'")?;
                    expr = Expr::call(expr, args, pos);
                }
                _ => break,
            }
        }
        Ok(expr)
    }
}
