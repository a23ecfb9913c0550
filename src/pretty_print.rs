use crate::evaluator::EvalError;
use crate::lexer::{LexerError, LexerErrorKind, tokenize};
use crate::parser::ParseError;
use crate::source::{LineIndex, Position, Span};
use crate::{EnvError, Error};
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

/// The source range to underline for an error reported at `pos`: the token
/// starting there, or a single character.
fn label_range(input: &str, pos: Position) -> Range<usize> {
    let offset = LineIndex::new(input).offset(pos);
    let token = tokenize(input)
        .ok()
        .and_then(|tokens| tokens.into_iter().find(|t| t.span.start == offset));
    match token {
        Some(token) => token.span.to_range(),
        None => offset..(offset + 1).min(input.len()),
    }
}

fn lexer_label(err: &LexerError) -> (Span, &'static str) {
    let message = match err.error {
        LexerErrorKind::MissingClosingQuote => "this string is never closed",
        LexerErrorKind::InvalidToken => "not a valid token",
    };
    (err.span, message)
}

fn parse_label(err: &ParseError) -> String {
    match err {
        ParseError::UnexpectedToken { expected, .. } | ParseError::UnexpectedEof { expected, .. } => {
            format!("expected {}", expected)
        }
        ParseError::InvalidAssignmentTarget(_) => "only variables and members can be assigned".into(),
        ParseError::ExpectedAssignment(_) => "the update clause of a loop must be an assignment".into(),
        ParseError::TooManyInitializers { names, .. } => {
            format!("only {} name(s) to initialize", names)
        }
        ParseError::LexerError(err) => err.error.to_string(),
    }
}

fn eval_label(err: &EvalError) -> String {
    match err {
        EvalError::EnvError(EnvError::UndefinedVariable(..)) => {
            "not defined in the current scope".into()
        }
        EvalError::InvalidOperands { op, .. } => format!("operands do not support '{}'", op),
        EvalError::DivisionByZero(_) => "right operand is zero".into(),
        EvalError::NonIntegerOperands(_) => "both operands must be integers".into(),
        EvalError::NotAFunction(..) => "this cannot be called".into(),
        EvalError::IndexOutOfRange(_) => "index is past the end".into(),
        EvalError::InvalidIndex(_) => "index must be an integer".into(),
        EvalError::UnsupportedPropertyKey(_) => "key must be a name or a literal".into(),
        EvalError::NotAContainer(found, _) => format!("{} has no properties", found),
        EvalError::ImmutableString(_) => "strings cannot be modified".into(),
        EvalError::InvalidAssignmentTarget(_) => "cannot assign to this".into(),
        EvalError::NotInLoop(_) => "no enclosing loop".into(),
        EvalError::Timeout(_) => "still running here".into(),
        EvalError::InvalidArguments(..) => "invalid arguments".into(),
        EvalError::Output(..) => "while writing output".into(),
    }
}

impl Error {
    /// Builds a labelled diagnostic for this error against the program text.
    pub fn report<'n>(&self, name: &'n str, input: &str) -> Report<'static, (&'n str, Range<usize>)> {
        let (range, label) = match self {
            Error::Lex(err) | Error::Parse(ParseError::LexerError(err)) => {
                let (span, label) = lexer_label(err);
                (span.to_range(), label.to_string())
            }
            Error::Parse(err @ ParseError::UnexpectedEof { .. }) => {
                (input.len()..input.len(), parse_label(err))
            }
            Error::Parse(err) => (label_range(input, err.pos()), parse_label(err)),
            Error::Eval(err) => (label_range(input, err.pos()), eval_label(err)),
        };
        Report::build(ReportKind::Error, (name, range.clone()))
            .with_config(Config::default().with_index_type(IndexType::Byte))
            .with_message(self.to_string())
            .with_label(Label::new((name, range)).with_message(label))
            .finish()
    }

    /// Prints the diagnostic to stderr.
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        self.report(name, input).eprint((name, Source::from(input)))
    }

    /// Writes the diagnostic without colors, for logs and tests.
    pub fn write_report<W: io::Write>(&self, name: &str, input: &str, writer: W) -> io::Result<()> {
        let (range, label) = (label_range(input, self.pos()), self.to_string());
        Report::build(ReportKind::Error, (name, range.clone()))
            .with_config(
                Config::default()
                    .with_index_type(IndexType::Byte)
                    .with_color(false),
            )
            .with_message(label)
            .with_label(Label::new((name, range)))
            .finish()
            .write((name, Source::from(input)), writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpret;

    fn render(input: &str) -> String {
        let mut output = Vec::new();
        let err = interpret(input, &mut output).unwrap_err();
        let mut rendered = Vec::new();
        err.write_report("test.ql", input, &mut rendered).unwrap();
        String::from_utf8(rendered).unwrap()
    }

    #[test]
    fn test_label_covers_token() {
        assert_eq!(label_range("var abc = 1", Position::new(1, 5)), 4..7);
        assert_eq!(label_range("a\n  bc", Position::new(2, 3)), 4..6);
    }

    #[test]
    fn test_report_names_error() {
        let rendered = render("var x = 1\nx = y");
        assert!(rendered.contains("undefined variable 'y'. [2,5]"), "{}", rendered);
        assert!(rendered.contains("test.ql"), "{}", rendered);
    }

    #[test]
    fn test_report_locates_errors_after_wide_characters() {
        // 'é' takes two bytes, so byte offsets run ahead of columns
        let rendered = render("var s = 'ééé'\ns - 1");
        assert!(rendered.contains("cannot use '-' operator. [2,3]"), "{}", rendered);
        assert!(rendered.contains("test.ql:2:3"), "{}", rendered);
    }

    #[test]
    fn test_report_for_lexer_error() {
        let rendered = render("echo('abc)");
        assert!(rendered.contains("missing closing quote. [1,6]"), "{}", rendered);
    }
}
