use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::source::{LineIndex, Position, Span};

/// Words the parser treats specially; they never name a variable.
pub const KEYWORDS: &[&str] = &[
    "var", "func", "return", "break", "continue", "if", "elif", "else", "for", "null",
    "undefined",
];

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip line comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token(":=")]
    Declare,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("===")]
    StrictEqual,
    #[token("==")]
    Equal,
    #[token("!==")]
    StrictNotEqual,
    #[token("!=")]
    NotEqual,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token("=")]
    Assign,
    #[token("!")]
    Bang,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    // Quoted text runs verbatim (newlines included) up to the matching quote.
    #[regex(r#""[^"]*"?"#, string_literal)]
    #[regex(r"'[^']*'?", string_literal)]
    #[regex(r"`[^`]*`?", string_literal)]
    Str(String),
    // Identifiers, numbers, keywords and `#t`/`#f` all lex as one word.
    #[regex(r#"[^ \t\n\r"'`(){}\[\],.:;=!+\-*/%<>&|]+"#, |lex| lex.slice().to_string())]
    Word(String),
}

fn string_literal(lex: &mut logos::Lexer<TokenKind>) -> LexerResult<String> {
    let slice = lex.slice();
    let quote = &slice[..1];
    // make sure string was terminated by the same quote it opened with
    if slice.len() == 1 || !slice.ends_with(quote) {
        return Err(LexerErrorKind::MissingClosingQuote);
    }
    Ok(slice[1..slice.len() - 1].to_string())
}

impl TokenKind {
    /// The source text the token stands for (strings without their quotes).
    pub fn text(&self) -> &str {
        match self {
            TokenKind::Declare => ":=",
            TokenKind::LessEqual => "<=",
            TokenKind::GreaterEqual => ">=",
            TokenKind::StrictEqual => "===",
            TokenKind::Equal => "==",
            TokenKind::StrictNotEqual => "!==",
            TokenKind::NotEqual => "!=",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Assign => "=",
            TokenKind::Bang => "!",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::Str(s) | TokenKind::Word(s) => s,
        }
    }
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Str(s) => write!(f, "\"{}\"", s), // Display with quotes for clarity
            other => f.write_str(other.text()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub pos: Position,
}

impl Token {
    pub fn text(&self) -> &str {
        self.kind.text()
    }

    fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.word() == Some(keyword)
    }

    pub fn is_reserved(&self) -> bool {
        self.word().is_some_and(|w| KEYWORDS.contains(&w))
    }

    pub fn is_number(&self) -> bool {
        self.word().is_some_and(is_number_text)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.word(), Some("#t" | "#f"))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, TokenKind::Str(_))
    }

    pub fn is_identifier(&self) -> bool {
        self.word().is_some_and(|w| {
            !KEYWORDS.contains(&w)
                && !w.starts_with(|c: char| c.is_ascii_digit() || c == '#')
        })
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::LessEqual
                | TokenKind::GreaterEqual
                | TokenKind::StrictEqual
                | TokenKind::Equal
                | TokenKind::StrictNotEqual
                | TokenKind::NotEqual
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Less
                | TokenKind::Greater
        )
    }
}

fn is_integer_text(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn is_number_text(text: &str) -> bool {
    match text.split_once('.') {
        Some((int, frac)) => is_integer_text(int) && is_integer_text(frac),
        None => is_integer_text(text),
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("missing closing quote")]
    MissingClosingQuote,
    #[default]
    #[error("invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}. {pos}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
    pub pos: Position,
}

// Result type alias for convenience
type LexerResult<T> = Result<T, LexerErrorKind>;

// Result type alias for convenience
type LexerRangedResult<T> = Result<T, LexerError>;

/// Tokenizes source text into position-tagged tokens.
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    let index = LineIndex::new(input);
    let tokens = TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| {
            let span = Span::new(range.start, range.end);
            let pos = index.position(span.start);
            match result {
                Ok(kind) => Ok(Token { kind, span, pos }),
                Err(error) => Err(LexerError { error, span, pos }),
            }
        })
        .collect::<LexerRangedResult<Vec<Token>>>()?;
    let tokens = merge_floats(tokens);
    log::debug!("lexed {} tokens", tokens.len());
    Ok(tokens)
}

/// Folds `<int> . <int>` into a single float word when the three tokens touch.
fn merge_floats(tokens: Vec<Token>) -> Vec<Token> {
    let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        merged.push(token);
        let len = merged.len();
        if len < 3 {
            continue;
        }
        let (int, dot, frac) = (&merged[len - 3], &merged[len - 2], &merged[len - 1]);
        let touching = int.span.end == dot.span.start && dot.span.end == frac.span.start;
        if touching
            && dot.kind == TokenKind::Dot
            && is_integer_text(int.text())
            && is_integer_text(frac.text())
            // a member chain such as `a.1.2` stays unmerged
            && !(len >= 4 && merged[len - 4].kind == TokenKind::Dot
                && merged[len - 4].span.end == int.span.start)
        {
            let text = format!("{}.{}", int.text(), frac.text());
            let span = int.span.merge(frac.span);
            let pos = int.pos;
            merged.truncate(len - 3);
            merged.push(Token {
                kind: TokenKind::Word(text),
                span,
                pos,
            });
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e),
        }
    }

    // Helper to simplify testing for lexer errors
    fn assert_lexer_error(input: &str, expected: LexerErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(e) => assert_eq!(e.error, expected, "Input: '{}'", input),
        }
    }

    fn word(s: &str) -> TokenKind {
        TokenKind::Word(s.to_string())
    }

    fn string(s: &str) -> TokenKind {
        TokenKind::Str(s.to_string())
    }

    fn positions(input: &str) -> Vec<(String, usize, usize)> {
        tokenize(input)
            .expect("Should tokenize successfully")
            .into_iter()
            .map(|t| (t.text().to_string(), t.pos.line, t.pos.column))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("  \n\t ", vec![]);
    }

    #[test]
    fn test_declaration_positions() {
        assert_eq!(
            positions("var abc=123"),
            vec![
                ("var".to_string(), 1, 1),
                ("abc".to_string(), 1, 5),
                ("=".to_string(), 1, 8),
                ("123".to_string(), 1, 9),
            ]
        );
    }

    #[test]
    fn test_positions_across_lines() {
        assert_eq!(
            positions("a\n  bc(\n)"),
            vec![
                ("a".to_string(), 1, 1),
                ("bc".to_string(), 2, 3),
                ("(".to_string(), 2, 5),
                (")".to_string(), 3, 1),
            ]
        );
    }

    #[test]
    fn test_multi_char_operators_preferred() {
        assert_tokens(
            "a:=b<=c>=d===e==f!==g!=h&&i||j",
            vec![
                word("a"),
                TokenKind::Declare,
                word("b"),
                TokenKind::LessEqual,
                word("c"),
                TokenKind::GreaterEqual,
                word("d"),
                TokenKind::StrictEqual,
                word("e"),
                TokenKind::Equal,
                word("f"),
                TokenKind::StrictNotEqual,
                word("g"),
                TokenKind::NotEqual,
                word("h"),
                TokenKind::And,
                word("i"),
                TokenKind::Or,
                word("j"),
            ],
        );
    }

    #[test]
    fn test_punctuation_flushes_words() {
        assert_tokens(
            "f(x,y[0]){a:!b;}",
            vec![
                word("f"),
                TokenKind::LParen,
                word("x"),
                TokenKind::Comma,
                word("y"),
                TokenKind::LBracket,
                word("0"),
                TokenKind::RBracket,
                TokenKind::RParen,
                TokenKind::LBrace,
                word("a"),
                TokenKind::Colon,
                TokenKind::Bang,
                word("b"),
                TokenKind::Semicolon,
                TokenKind::RBrace,
            ],
        );
    }

    #[test]
    fn test_strings_with_each_quote() {
        assert_tokens(
            r#""a'b" 'c"d' `e`"#,
            vec![string("a'b"), string("c\"d"), string("e")],
        );
        assert_tokens("\"line\nbreak\"", vec![string("line\nbreak")]);
        assert_tokens("''", vec![string("")]);
    }

    #[test]
    fn test_missing_closing_quote() {
        assert_lexer_error("\"abc", LexerErrorKind::MissingClosingQuote);
        assert_lexer_error("x = 'abc", LexerErrorKind::MissingClosingQuote);
        assert_lexer_error("`", LexerErrorKind::MissingClosingQuote);
    }

    #[test]
    fn test_missing_quote_message_has_position() {
        let err = tokenize("var s = \"abc").unwrap_err();
        assert_eq!(err.to_string(), "missing closing quote. [1,9]");
    }

    #[test]
    fn test_lone_ampersand_is_invalid() {
        assert_lexer_error("a & b", LexerErrorKind::InvalidToken);
        assert_lexer_error("a|b", LexerErrorKind::InvalidToken);
        assert_eq!(tokenize("a&b").unwrap_err().to_string(), "invalid token. [1,2]");
        assert_tokens("a&&b", vec![word("a"), TokenKind::And, word("b")]);
    }

    #[test]
    fn test_float_merge() {
        assert_tokens("1.25", vec![word("1.25")]);
        let tokens = tokenize("x = 10.5").unwrap();
        assert_eq!(tokens[2].text(), "10.5");
        assert_eq!(tokens[2].pos, Position::new(1, 5));
        assert!(tokens[2].is_number());
    }

    #[test]
    fn test_no_float_merge_when_separated() {
        assert_tokens("1 . 2", vec![word("1"), TokenKind::Dot, word("2")]);
        assert_tokens("a.b", vec![word("a"), TokenKind::Dot, word("b")]);
        assert_tokens(
            "1.2.3",
            vec![word("1.2"), TokenKind::Dot, word("3")],
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_tokens(
            "a // the rest / is ignored\nb",
            vec![word("a"), word("b")],
        );
        assert_tokens("a / b", vec![word("a"), TokenKind::Slash, word("b")]);
    }

    #[test]
    fn test_classification() {
        let tokens = tokenize("var x 12 #t #f \"s\" + _args0_ null").unwrap();
        assert!(tokens[0].is_reserved() && tokens[0].is_keyword("var"));
        assert!(tokens[1].is_identifier());
        assert!(tokens[2].is_number() && !tokens[2].is_identifier());
        assert!(tokens[3].is_boolean() && tokens[4].is_boolean());
        assert!(tokens[5].is_string());
        assert!(tokens[6].is_operator());
        assert!(tokens[7].is_identifier());
        assert!(tokens[8].is_reserved() && !tokens[8].is_identifier());
    }
}
