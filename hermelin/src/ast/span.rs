//! Source location tracking

use serde::{Deserialize, Serialize};

/// A byte range in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// Maps byte offsets to 1-based line numbers.
///
/// Call sites in the traceback are reported by line, so the parser builds one
/// of these per source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        LineIndex { line_starts }
    }

    /// Line containing `offset` (1-based)
    pub fn line(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(10, 20);
        let b = Span::new(0, 5);
        assert_eq!(a.merge(b), Span::new(0, 20));
        assert_eq!(b.merge(a), Span::new(0, 20));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(format!("{}", Span::new(42, 99)), "42..99");
    }

    #[test]
    fn test_span_range_roundtrip() {
        let range: std::ops::Range<usize> = Span::new(5, 15).into();
        assert_eq!(range, 5..15);
        assert_eq!(Span::from(3..7), Span::new(3, 7));
    }

    #[test]
    fn test_line_index_first_line() {
        let idx = LineIndex::new("abc\ndef\n");
        assert_eq!(idx.line(0), 1);
        assert_eq!(idx.line(2), 1);
    }

    #[test]
    fn test_line_index_later_lines() {
        let idx = LineIndex::new("abc\ndef\nghi");
        assert_eq!(idx.line(3), 1); // the newline itself
        assert_eq!(idx.line(4), 2);
        assert_eq!(idx.line(9), 3);
    }

    #[test]
    fn test_line_index_empty_source() {
        let idx = LineIndex::new("");
        assert_eq!(idx.line(0), 1);
        assert_eq!(idx.line(100), 1);
    }
}
