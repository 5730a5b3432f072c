use std::fmt;
use std::sync::Arc;

use text_size::{TextRange, TextSize};

/// A point in a document: byte offset plus zero-based line and column.
///
/// Columns count characters, not bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub offset: TextSize,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub const ZERO: Self = Self { offset: TextSize::new(0), line: 0, column: 0 };

    pub const fn new(offset: u32, line: u32, column: u32) -> Self {
        Self { offset: TextSize::new(offset), line, column }
    }

    /// Returns the location reached after reading `text` from `self`.
    pub fn advance(self, text: &str) -> Self {
        let mut location = self;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            location.offset += TextSize::of(c);
            match c {
                '\r' => {
                    if chars.next_if_eq(&'\n').is_some() {
                        location.offset += TextSize::new(1);
                    }
                    location.line += 1;
                    location.column = 0;
                }
                '\n' | '\u{2028}' | '\u{2029}' => {
                    location.line += 1;
                    location.column = 0;
                }
                _ => location.column += 1,
            }
        }

        location
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}:{},{})", u32::from(self.offset), self.line, self.column)
    }
}

/// The region a diagnostic points at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub file: Option<Arc<str>>,
    pub location: SourceLocation,
    pub length: TextSize,
}

impl SourceSpan {
    pub fn new(file: Option<Arc<str>>, location: SourceLocation, length: TextSize) -> Self {
        Self { file, location, length }
    }

    pub fn at(location: SourceLocation, length: u32) -> Self {
        Self { file: None, location, length: TextSize::new(length) }
    }

    pub fn offset(&self) -> TextSize {
        self.location.offset
    }

    pub fn range(&self) -> TextRange {
        TextRange::at(self.location.offset, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::SourceLocation;

    #[test]
    fn advance_counts_lines_and_chars() {
        let end = SourceLocation::ZERO.advance("ab\r\ncé\rx\ny");
        assert_eq!(u32::from(end.offset), 11);
        assert_eq!(end.line, 3);
        assert_eq!(end.column, 1);
    }

    #[test]
    fn advance_from_nonzero_start() {
        let start = SourceLocation::new(10, 2, 4);
        let end = start.advance("foo");
        assert_eq!(end, SourceLocation::new(13, 2, 7));
    }
}
