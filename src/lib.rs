// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod natives;
pub mod parser;
pub mod pretty_print;
pub mod source;
pub mod types;

use std::io::Write;
use thiserror::Error;

pub use environment::{Env, EnvError, Environment};
pub use evaluator::{EvalError, EvalResult, InterpretOptions, Interpreter};
pub use lexer::{LexerError, Token, tokenize};
pub use parser::{ParseError, Parser, parse_str};
pub use source::{Position, Span};
pub use types::Value;

/// Anything that can stop a program: the first error aborts the whole run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn pos(&self) -> Position {
        match self {
            Error::Lex(err) => err.pos,
            Error::Parse(err) => err.pos(),
            Error::Eval(err) => err.pos(),
        }
    }
}

/// Lexes, parses and runs `source` in a fresh global environment with the
/// native prelude installed. Natives write to `output`.
pub fn interpret(source: &str, output: &mut dyn Write) -> Result<(), Error> {
    let env = Environment::new_global_populated();
    let result = interpret_with(source, &env, output, &InterpretOptions::default());
    // Script functions capture the global frame that holds them
    env.borrow_mut().clear();
    result.map(|_| ())
}

/// Like [`interpret`], but runs in a caller-supplied environment and returns
/// the value of a top-level `return` (`undefined` otherwise).
pub fn interpret_with(
    source: &str,
    env: &Env,
    output: &mut dyn Write,
    options: &InterpretOptions,
) -> Result<Value, Error> {
    let tokens = tokenize(source)?;
    let program = parser::parse(tokens)?;
    let mut interpreter = Interpreter::with_options(output, options);
    Ok(interpreter.run(&program, env)?)
}
