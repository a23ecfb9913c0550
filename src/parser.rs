use crate::ast::{Assignment, Declarator, Expr, ExprKind, FunctionDecl, IfStmt, ForStmt, Stmt, StmtKind};
use crate::lexer::{LexerError, Token, TokenKind};
use crate::source::Position;
use thiserror::Error;

mod expr;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected token '{found}', expected {expected}. {pos}")]
    UnexpectedToken {
        found: String,
        expected: String,
        pos: Position,
    },
    #[error("unexpected end of input, expected {expected}. {pos}")]
    UnexpectedEof { expected: String, pos: Position },
    #[error("invalid assignment target. {0}")]
    InvalidAssignmentTarget(Position),
    #[error("expected an assignment. {0}")]
    ExpectedAssignment(Position),
    #[error("too many initializers for {names} declared name(s). {pos}")]
    TooManyInitializers { names: usize, pos: Position },
    // Propagate lexer errors when parsing directly from a string
    #[error(transparent)]
    LexerError(#[from] LexerError),
}

impl ParseError {
    pub fn pos(&self) -> Position {
        match self {
            ParseError::UnexpectedToken { pos, .. }
            | ParseError::UnexpectedEof { pos, .. }
            | ParseError::TooManyInitializers { pos, .. } => *pos,
            ParseError::InvalidAssignmentTarget(pos) | ParseError::ExpectedAssignment(pos) => *pos,
            ParseError::LexerError(err) => err.pos,
        }
    }
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

fn unexpected_token(token: &Token, expected: &str) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.kind.to_string(),
        expected: expected.to_string(),
        pos: token.pos,
    }
}

/// Keywords that open a statement of their own; a bare `return` stops before them.
const STATEMENT_KEYWORDS: &[&str] = &["var", "if", "elif", "else", "for", "return", "break", "continue"];

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0 }
    }

    /// How many tokens have been consumed so far.
    pub fn consumed(&self) -> usize {
        self.current
    }

    // Peeks at the next token without consuming.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.current + n)
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current).cloned()?;
        self.current += 1;
        Some(token)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == *kind)
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn end_pos(&self) -> Position {
        self.tokens.last().map_or(Position::default(), |t| t.pos)
    }

    fn current_pos(&self) -> Position {
        self.peek().map_or_else(|| self.end_pos(), |t| t.pos)
    }

    /// Error for whatever comes next, which may be the end of input.
    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => unexpected_token(token, expected),
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                pos: self.end_pos(),
            },
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(&kind) {
            self.next_token().ok_or_else(|| self.unexpected(expected))
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> ParseResult<String> {
        match self.peek() {
            Some(token) if token.is_identifier() => {
                let name = token.text().to_string();
                self.next_token();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Parses the entire token stream as a program.
    pub fn parse(mut self) -> ParseResult<Vec<Stmt>> {
        let program = self.parse_statements()?;
        // A `}` with no block to close is the only thing that stops the loop early
        if let Some(found) = self.peek() {
            return Err(unexpected_token(found, "a statement"));
        }
        log::debug!("parsed {} top-level statements", program.len());
        Ok(program)
    }

    /// Parses statements until the end of input or a `}` (left for the caller).
    fn parse_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::RBrace => break,
                TokenKind::Semicolon => {
                    self.next_token();
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("a statement"));
        };
        let pos = token.pos;
        match &token.kind {
            TokenKind::LBrace => Ok(Stmt::new(StmtKind::Block(self.parse_block()?), pos)),
            TokenKind::Word(word) => match word.as_str() {
                "var" => self.parse_var(),
                "func" if self.peek_nth(1).is_some_and(Token::is_identifier) => {
                    self.parse_function_decl()
                }
                "return" => {
                    self.next_token();
                    let argument = if self.at_statement_end() {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    Ok(Stmt::new(StmtKind::Return(argument), pos))
                }
                "break" => {
                    self.next_token();
                    Ok(Stmt::new(StmtKind::Break, pos))
                }
                "continue" => {
                    self.next_token();
                    Ok(Stmt::new(StmtKind::Continue, pos))
                }
                "if" => {
                    self.next_token();
                    Ok(Stmt::new(StmtKind::If(self.parse_if()?), pos))
                }
                "for" => self.parse_for(),
                _ => self.parse_simple_statement(),
            },
            _ => self.parse_simple_statement(),
        }
    }

    fn at_statement_end(&self) -> bool {
        match self.peek() {
            None => true,
            Some(token) => {
                matches!(token.kind, TokenKind::RBrace | TokenKind::Semicolon)
                    || STATEMENT_KEYWORDS.iter().any(|k| token.is_keyword(k))
            }
        }
    }

    /// An assignment when the expression is followed by `=` or `:=`,
    /// otherwise an expression statement.
    fn parse_simple_statement(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        let expr = self.parse_expression()?;
        let declare = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Assign) => false,
            Some(TokenKind::Declare) => true,
            _ => return Ok(Stmt::new(StmtKind::Expr(expr), pos)),
        };
        self.next_token();
        let valid = if declare {
            matches!(expr.kind, ExprKind::Variable(_))
        } else {
            expr.is_assignable()
        };
        if !valid {
            return Err(ParseError::InvalidAssignmentTarget(pos));
        }
        let value = self.parse_expression()?;
        Ok(Stmt::new(
            StmtKind::Assign(Assignment {
                target: expr,
                value,
                declare,
            }),
            pos,
        ))
    }

    /// `var a, b = 1, 2`; names without an initializer start out undefined.
    fn parse_var(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.next_token();
        let mut names = vec![self.expect_identifier("a variable name")?];
        while self.check(&TokenKind::Comma) {
            self.next_token();
            names.push(self.expect_identifier("a variable name")?);
        }

        let mut inits = Vec::new();
        if self.check(&TokenKind::Assign) {
            self.next_token();
            loop {
                let init_pos = self.current_pos();
                let init = self.parse_expression()?;
                if inits.len() == names.len() {
                    return Err(ParseError::TooManyInitializers {
                        names: names.len(),
                        pos: init_pos,
                    });
                }
                inits.push(init);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.next_token();
            }
        }

        let mut inits = inits.into_iter();
        let declarators = names
            .into_iter()
            .map(|name| Declarator {
                name,
                init: inits.next(),
            })
            .collect();
        Ok(Stmt::new(StmtKind::Var(declarators), pos))
    }

    fn parse_function_decl(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.next_token();
        let name = self.expect_identifier("a function name")?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Stmt::new(
            StmtKind::Function(FunctionDecl {
                name,
                params,
                body: body.into(),
            }),
            pos,
        ))
    }

    fn parse_params(&mut self) -> ParseResult<Vec<String>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier("a parameter name")?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.next_token();
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(params)
    }

    /// `{ statements }`
    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.parse_statements()?;
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(body)
    }

    /// The first clause of an `if`/`for` header.
    fn parse_clause(&mut self) -> ParseResult<Stmt> {
        if self.check_keyword("var") {
            self.parse_var()
        } else {
            self.parse_simple_statement()
        }
    }

    /// Everything after `if` or `elif`: `[init ;] test { ... }` plus the rest of the chain.
    fn parse_if(&mut self) -> ParseResult<IfStmt> {
        let first = self.parse_clause()?;
        let (init, test) = if self.check(&TokenKind::Semicolon) {
            self.next_token();
            (Some(Box::new(first)), self.parse_expression()?)
        } else {
            match first.kind {
                StmtKind::Expr(test) => (None, test),
                _ => return Err(self.unexpected("';'")),
            }
        };
        let consequent = self.parse_block()?;

        let alternate = if self.check_keyword("elif") {
            self.next_token();
            Some(Box::new(self.parse_if()?))
        } else if self.check_keyword("else") {
            self.next_token();
            Some(Box::new(IfStmt {
                init: None,
                test: None,
                consequent: self.parse_block()?,
                alternate: None,
            }))
        } else {
            None
        };

        Ok(IfStmt {
            init,
            test: Some(test),
            consequent,
            alternate,
        })
    }

    /// `for { }`, `for test { }` or `for init; test; update { }`.
    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let pos = self.current_pos();
        self.next_token();
        let mut header = ForStmt {
            init: None,
            test: None,
            update: None,
            body: Vec::new(),
        };

        if !self.check(&TokenKind::LBrace) {
            let first = if self.check(&TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_clause()?)
            };
            if self.check(&TokenKind::Semicolon) {
                self.next_token();
                header.init = first.map(Box::new);
                if !self.check(&TokenKind::Semicolon) {
                    header.test = Some(self.parse_expression()?);
                }
                self.expect(TokenKind::Semicolon, "';'")?;
                if !self.check(&TokenKind::LBrace) {
                    let update = self.parse_simple_statement()?;
                    match update.kind {
                        StmtKind::Assign(assignment) => header.update = Some(assignment),
                        _ => return Err(ParseError::ExpectedAssignment(update.pos)),
                    }
                }
            } else {
                match first.map(|stmt| stmt.kind) {
                    Some(StmtKind::Expr(test)) => header.test = Some(test),
                    _ => return Err(self.unexpected("';'")),
                }
            }
        }

        header.body = self.parse_block()?;
        Ok(Stmt::new(StmtKind::For(header), pos))
    }
}

/// Parses a token stream into a program.
pub fn parse(tokens: Vec<Token>) -> ParseResult<Vec<Stmt>> {
    Parser::new(tokens).parse()
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Vec<Stmt>> {
    let tokens = crate::lexer::tokenize(input)?;
    parse(tokens)
}

/// Parses a single expression from the front of `tokens`, returning it with
/// the number of tokens it used. Parsing stops at the first token that
/// cannot continue the expression.
pub fn parse_expression(tokens: &[Token]) -> ParseResult<(Expr, usize)> {
    let mut parser = Parser::new(tokens.to_vec());
    let expr = parser.parse_expression()?;
    Ok((expr, parser.consumed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, LiteralKind};

    // Helper for asserting successful parsing, compared through the AST printer
    fn assert_parse(input: &str, expected: &str) {
        match parse_str(input) {
            Ok(program) => {
                let printed: Vec<String> = program.iter().map(|s| s.to_string()).collect();
                assert_eq!(printed.join(" "), expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper for asserting parse errors
    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                // Compare enum variants, ignoring specific content for simplicity
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn eof() -> ParseError {
        ParseError::UnexpectedEof {
            expected: String::new(),
            pos: Position::default(),
        }
    }

    fn unexpected() -> ParseError {
        ParseError::UnexpectedToken {
            found: String::new(),
            expected: String::new(),
            pos: Position::default(),
        }
    }

    #[test]
    fn test_parse_func_is_not_a_variable_name() {
        let err = parse_str("var func = 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected token 'func', expected a variable name. [1,5]"
        );
        assert_parse_error("func = 1", unexpected());
        assert_parse("o.func = 1", "(= (. o func) 1)");
    }

    #[test]
    fn test_parse_var_declarations() {
        assert_parse("var a", "(var (a))");
        assert_parse("var a = 1", "(var (a 1))");
        assert_parse("var a, b, c = 1, \"x\"", "(var (a 1) (b \"x\") (c))");
        assert_parse("var f = g(1, 2)", "(var (f (call g 1 2)))");
    }

    #[test]
    fn test_parse_too_many_initializers() {
        assert_parse_error(
            "var a, b = 1, 2, 3",
            ParseError::TooManyInitializers {
                names: 0,
                pos: Position::default(),
            },
        );
        let err = parse_str("var a = 1, 2").unwrap_err();
        assert_eq!(
            err,
            ParseError::TooManyInitializers {
                names: 1,
                pos: Position::new(1, 12)
            }
        );
    }

    #[test]
    fn test_parse_assignments() {
        assert_parse("x = 1", "(= x 1)");
        assert_parse("x := 1 + 2", "(:= x (+ 1 2))");
        assert_parse("a[0] = \"x\"", "(= ([] a 0) \"x\")");
        assert_parse("a.b.c = d", "(= (. (. a b) c) d)");
    }

    #[test]
    fn test_parse_invalid_assignment_targets() {
        let invalid = ParseError::InvalidAssignmentTarget(Position::default());
        assert_parse_error("1 = 2", invalid.clone());
        assert_parse_error("f() = 2", invalid.clone());
        assert_parse_error("a + b = 2", invalid.clone());
        assert_parse_error("a.b := 2", invalid);
    }

    #[test]
    fn test_parse_statements_split_without_separators() {
        assert_parse(
            "var a=[1,2] \n a[0]=\"x\"",
            "(var (a (array 1 2))) (= ([] a 0) \"x\")",
        );
        assert_parse("a b; c", "a b c");
    }

    #[test]
    fn test_parse_function_declaration() {
        assert_parse(
            "func add(a, b) { return a + b }",
            "(func add (a b) {(return (+ a b))})",
        );
        assert_parse("func nop() {}", "(func nop () {})");
        assert_parse("func(x) { return x }(1)", "(call (func (x) {(return x)}) 1)");
    }

    #[test]
    fn test_parse_return_forms() {
        assert_parse("func f() { return }", "(func f () {(return)})");
        assert_parse(
            "func f() { return\n var x }",
            "(func f () {(return) (var (x))})",
        );
        assert_parse("return func() {}", "(return (func () {}))");
    }

    #[test]
    fn test_parse_if_chain() {
        assert_parse("if a { b }", "(if a {b})");
        assert_parse(
            "if a { b } elif c { d } else { e }",
            "(if a {b} (elif c {d} (else {e})))",
        );
        assert_parse("if x := f(); x > 1 { x }", "(if (:= x (call f)); (> x 1) {x})");
        assert_parse("if var y = 2; y { y }", "(if (var (y 2)); y {y})");
    }

    #[test]
    fn test_parse_if_errors() {
        assert_parse_error("if a = 1 { }", unexpected());
        assert_parse_error("if a { } else if b { }", unexpected());
        assert_parse_error("if a b", unexpected());
        assert_parse_error("if a { b", eof());
    }

    #[test]
    fn test_parse_for_forms() {
        assert_parse("for { break }", "(for {(break)})");
        assert_parse("for i < 3 { continue }", "(for (< i 3) {(continue)})");
        assert_parse(
            "for i:=0;i<3;i=i+1{ if i==1{continue} }",
            "(for (:= i 0); (< i 3); (= i (+ i 1)) {(if (== i 1) {(continue)})})",
        );
        assert_parse("for ;; { }", "(for {})");
        assert_parse("for var i = 0;; i = i + 1 { }", "(for (var (i 0)); ; (= i (+ i 1)) {})");
    }

    #[test]
    fn test_parse_for_update_must_assign() {
        assert_parse_error(
            "for i:=0; i<3; i { }",
            ParseError::ExpectedAssignment(Position::default()),
        );
        assert_parse_error("for i:=0 { }", unexpected());
    }

    #[test]
    fn test_parse_blocks() {
        assert_parse("{ var a = 1 { a } }", "{(var (a 1)) {a}}");
        assert_parse_error("{ a", eof());
        assert_parse_error("a }", unexpected());
    }

    #[test]
    fn test_parse_error_messages() {
        let err = parse_str("func f( { }").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected token '{', expected a parameter name. [1,9]"
        );
        let err = parse_str("func f() {").unwrap_err();
        assert_eq!(err.to_string(), "unexpected end of input, expected '}'. [1,10]");
    }

    #[test]
    fn test_parse_lexer_error_propagation() {
        assert_parse_error(
            "var s = \"abc",
            ParseError::LexerError(LexerError {
                error: crate::lexer::LexerErrorKind::MissingClosingQuote,
                span: Default::default(),
                pos: Position::default(),
            }),
        );
    }

    #[test]
    fn test_parse_expression_reports_consumed_tokens() {
        let tokens = crate::lexer::tokenize("a + b c = 1").unwrap();
        let (expr, consumed) = parse_expression(&tokens).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(expr.to_string(), "(+ a b)");
    }

    #[test]
    fn test_statement_positions() {
        let program = parse_str("var a = 1\n  a = 2").unwrap();
        assert_eq!(program[0].pos, Position::new(1, 1));
        assert_eq!(program[1].pos, Position::new(2, 3));
        match &program[1].kind {
            StmtKind::Assign(assignment) => assert_eq!(
                assignment.value.kind,
                ExprKind::Literal(Literal::new(LiteralKind::Number, "2"))
            ),
            other => panic!("expected an assignment, got {:?}", other),
        }
    }
}
