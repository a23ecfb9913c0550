use std::fmt;
use std::ops::Range;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)] // Default for convenience
pub struct Span {
    pub start: usize, // Byte offset
    pub end: usize,   // Byte offset (exclusive)
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    // Helper to merge two spans (e.g., for merged float tokens)
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn to_range(self) -> Range<usize> {
        self.start..self.end
    }
}

/// 1-based line and column of the first character of a token or node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.line, self.column)
    }
}

/// Maps byte offsets of a source text to line/column positions and back.
/// Columns count characters, not bytes.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        LineIndex {
            source,
            line_starts,
        }
    }

    pub fn position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self.source[start..offset.min(self.source.len())]
            .chars()
            .count();
        Position::new(line + 1, column + 1)
    }

    /// Byte offset of a position, clamped to the end of the source.
    pub fn offset(&self, position: Position) -> usize {
        let Some(&start) = self.line_starts.get(position.line.saturating_sub(1)) else {
            return self.source.len();
        };
        self.source[start..]
            .char_indices()
            .nth(position.column.saturating_sub(1))
            .map_or(self.source.len(), |(i, _)| start + i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_of_offsets() {
        let index = LineIndex::new("var a\n  b\n");
        assert_eq!(index.position(0), Position::new(1, 1));
        assert_eq!(index.position(4), Position::new(1, 5));
        assert_eq!(index.position(8), Position::new(2, 3));
        assert_eq!(index.position(10), Position::new(3, 1));
    }

    #[test]
    fn test_columns_count_characters() {
        let index = LineIndex::new("\"é\" x");
        // 'é' is two bytes wide
        assert_eq!(index.position(5), Position::new(1, 5));
        assert_eq!(index.offset(Position::new(1, 5)), 5);
    }

    #[test]
    fn test_offset_round_trip_and_clamp() {
        let source = "a\nbc\n";
        let index = LineIndex::new(source);
        assert_eq!(index.offset(Position::new(2, 2)), 3);
        assert_eq!(index.offset(Position::new(9, 1)), source.len());
        assert_eq!(index.offset(Position::new(2, 40)), source.len());
    }

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(3, 14).to_string(), "[3,14]");
    }
}
