use std::borrow::Cow;
use std::io;

use quill::ast::StmtKind;
use quill::lexer::{KEYWORDS, TokenKind};
use quill::{Env, Environment, Error, Interpreter, parse_str, tokenize};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_FILE: &str = "quill_history.txt";

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

fn closes(opening: char, c: char) -> bool {
    matches!((opening, c), ('(', ')') | ('[', ']') | ('{', '}'))
}

struct QuillCompleter {
    env: Env,
}

impl rustyline::completion::Completer for QuillCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last() {
                Some(token) if token.span.end == pos => match &token.kind {
                    TokenKind::Word(word) => word.clone(),
                    _ => return Ok((pos, vec![])),
                },
                _ => return Ok((pos, vec![])),
            },
            Err(_) => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .into_iter()
            .chain(KEYWORDS.iter().map(|k| k.to_string()))
            .filter(|id| id.starts_with(&prefix) && !id.starts_with("_args"))
            .map(|id| id[prefix.len()..].to_string())
            .collect();
        candidates.sort();
        candidates.dedup();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct InputValidator {
    #[rustyline(Validator)]
    validator: QuillValidator,
    #[rustyline(Highlighter)]
    highlighter: QuillHighlighter,
    #[rustyline(Completer)]
    completer: QuillCompleter,
}

struct QuillValidator;

impl Validator for QuillValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        let mut stack = Vec::new();
        let mut quote: Option<char> = None;

        for (i, c) in input.chars().enumerate() {
            if let Some(open) = quote {
                if c == open {
                    quote = None;
                }
                continue;
            }

            match c {
                c if is_quote(c) => quote = Some(c),
                '(' | '[' | '{' => stack.push(c),
                ')' | ']' | '}' => match stack.pop() {
                    Some(opening) if closes(opening, c) => {}
                    _ => {
                        return Ok(ValidationResult::Invalid(Some(format!(
                            "  - Unmatched '{}' at position {}",
                            c, i
                        ))));
                    }
                },
                _ => {}
            }
        }

        if quote.is_some() || !stack.is_empty() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct QuillHighlighter;

impl Highlighter for QuillHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        // (bracket, char index in `line`, byte offset in `highlighted`)
        let mut stack: Vec<(char, usize, usize)> = Vec::new();
        let mut highlighted = String::new();
        let mut quote: Option<char> = None;
        let cursor = pos.checked_sub(1);

        for (i, c) in line.chars().enumerate() {
            if let Some(open) = quote {
                if c == open {
                    quote = None;
                }
                highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c)); // Green for strings
                continue;
            }

            match c {
                c if is_quote(c) => {
                    quote = Some(c);
                    highlighted.push_str(&format!("\x1b[32m{}\x1b[0m", c));
                }
                '(' | '[' | '{' => {
                    stack.push((c, i, highlighted.len()));
                    highlighted.push(c);
                }
                ')' | ']' | '}' => match stack.pop() {
                    Some((opening, opening_index, matching_pos)) if closes(opening, c) => {
                        if cursor == Some(i) || cursor == Some(opening_index) {
                            highlighted.push_str(&format!("\x1b[34m{}\x1b[0m", c)); // Blue for matching brackets
                            highlighted.replace_range(
                                matching_pos..=matching_pos,
                                &format!("\x1b[1;34m{}\x1b[0m", opening),
                            );
                        } else {
                            highlighted.push(c);
                        }
                    }
                    Some((opening, _, matching_pos)) => {
                        highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for mismatched brackets
                        highlighted.replace_range(
                            matching_pos..=matching_pos,
                            &format!("\x1b[1;31m{}\x1b[0m", opening),
                        );
                    }
                    None => highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)),
                },
                _ => highlighted.push(c),
            }
        }

        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

/// Runs one line of input. Expression statements print their value.
fn eval_line(input: &str, env: &Env) -> Result<(), Error> {
    let program = parse_str(input)?;
    let mut stdout = io::stdout();
    let mut interpreter = Interpreter::new(&mut stdout);
    for stmt in &program {
        let value = match &stmt.kind {
            StmtKind::Expr(expr) => interpreter.evaluate(expr, env)?,
            _ => interpreter.run(std::slice::from_ref(stmt), env)?,
        };
        if !value.is_undefined() {
            println!("{}", value.repr());
        }
    }
    Ok(())
}

fn main() -> rustyline::Result<()> {
    env_logger::init();
    println!("quill REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let global_env = Environment::new_global_populated();
    let h = InputValidator {
        highlighter: QuillHighlighter,
        validator: QuillValidator,
        completer: QuillCompleter {
            env: global_env.clone(),
        },
    };
    let mut rl = Editor::new()?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(HISTORY_FILE).is_err() {
        log::debug!("no previous history");
    }

    loop {
        match rl.readline("quill> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }
                if let Err(err) = eval_line(trimmed_input, &global_env)
                    && err.pretty_print("<repl>", trimmed_input).is_err()
                {
                    eprintln!("Error: {}", err);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(HISTORY_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlights_pair_after_string() {
        // The cursor sits on the `(` at char 4, after the escape codes of the string
        let highlighted = QuillHighlighter.highlight("'x' (1)", 5);
        assert!(highlighted.contains("\x1b[1;34m(\x1b[0m"), "{:?}", highlighted);
        assert!(highlighted.contains("\x1b[34m)\x1b[0m"), "{:?}", highlighted);
    }

    #[test]
    fn test_no_pair_highlight_away_from_brackets() {
        let highlighted = QuillHighlighter.highlight("(1) + 2", 7);
        assert!(!highlighted.contains("\x1b[34m"), "{:?}", highlighted);
    }
}
