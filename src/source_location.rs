use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub offset: usize, // byte offset into source
}

impl SourceLocation {
    pub fn new() -> Self {
        SourceLocation {
            line: 1,
            column: 1,
            offset: 0,
        }
    }

    pub fn advance(&mut self, source_char: char) {
        self.offset += source_char.len_utf8();
        if source_char == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Represents a span within a source string, using an inclusive `start` location
/// and an exclusive `end` location.
///
/// The `start` field marks the beginning of the range and is an inclusive, physical
/// offset within the source. The `end` field marks the end of the range one position
/// past the last character, which may be one character beyond `source` if the range
/// extends to `EOF`.
///
/// This aligns with Rust's exclusive slice semantics, so a substring is simply
/// `source[start.offset..end.offset]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    pub fn line(&self) -> usize {
        self.start.line
    }

    /// Returns a `&str` for this range, with an exclusive end.
    pub fn as_str<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start.offset..self.end.offset]
    }

    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start.offset..self.end.offset
    }
}

impl std::fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.start)
    }
}

// lets error types carry our spans as miette labels
impl From<SourceSpan> for miette::SourceSpan {
    fn from(span: SourceSpan) -> Self {
        let len = span.end.offset.saturating_sub(span.start.offset);
        miette::SourceSpan::new(span.start.offset.into(), len)
    }
}
