use std::sync::Arc;

use kerf_errors::SourceLocation;
use text_size::TextSize;

/// A repositionable character source that knows the line and column of every offset.
///
/// Cloning is cheap: the text and the line table are shared.
#[derive(Debug, Clone)]
pub struct SeekableSource {
    text: Arc<str>,
    file: Option<Arc<str>>,
    line_starts: Arc<[usize]>,
    position: usize,
    start: SourceLocation,
}

impl SeekableSource {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let line_starts = line_starts(&text).into();
        Self { text, file: None, line_starts, position: 0, start: SourceLocation::ZERO }
    }

    pub fn with_file(mut self, file: Option<Arc<str>>) -> Self {
        self.file = file;
        self
    }

    /// Reports locations relative to `start` instead of the beginning of a document.
    ///
    /// Used when re-reading the content of a single span.
    pub fn with_start(mut self, start: SourceLocation) -> Self {
        self.start = start;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn file(&self) -> Option<&Arc<str>> {
        self.file.as_ref()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.text.len()
    }

    pub fn remaining(&self) -> &str {
        &self.text[self.position..]
    }

    pub fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// The character `n` places after the current one; `peek_nth(0)` is `peek()`.
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.remaining().chars().nth(n)
    }

    pub fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += c.len_utf8();
        Some(c)
    }

    pub fn advance_while(&mut self, f: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.position += c.len_utf8();
        }
    }

    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.position += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Moves to an absolute byte offset, clamped to the end of the text.
    pub fn seek(&mut self, position: usize) {
        let mut position = position.min(self.text.len());
        while !self.text.is_char_boundary(position) {
            position -= 1;
        }
        self.position = position;
    }

    pub fn slice(&self, start: usize, end: usize) -> &str {
        &self.text[start..end]
    }

    pub fn location(&self) -> SourceLocation {
        self.location_at(self.position)
    }

    pub fn location_at(&self, position: usize) -> SourceLocation {
        let position = position.min(self.text.len());
        let line = self.line_starts.partition_point(|&start| start <= position) - 1;
        let line_start = self.line_starts[line];
        let column = self.text[line_start..position].chars().count() as u32;

        let offset = self.start.offset + TextSize::new(position as u32);
        if line == 0 {
            SourceLocation { offset, line: self.start.line, column: self.start.column + column }
        } else {
            SourceLocation { offset, line: self.start.line + line as u32, column }
        }
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        match c {
            '\r' => match chars.peek() {
                Some(&(next, '\n')) => {
                    chars.next();
                    starts.push(next + 1);
                }
                _ => starts.push(index + 1),
            },
            '\n' | '\u{2028}' | '\u{2029}' => starts.push(index + c.len_utf8()),
            _ => {}
        }
    }

    starts
}

#[cfg(test)]
mod tests {
    use kerf_errors::SourceLocation;

    use super::SeekableSource;

    #[test]
    fn locations_follow_line_breaks() {
        let source = SeekableSource::new("ab\r\ncd\ne\rf");
        assert_eq!(source.location_at(0), SourceLocation::new(0, 0, 0));
        assert_eq!(source.location_at(2), SourceLocation::new(2, 0, 2));
        assert_eq!(source.location_at(4), SourceLocation::new(4, 1, 0));
        assert_eq!(source.location_at(8), SourceLocation::new(8, 2, 1));
        assert_eq!(source.location_at(10), SourceLocation::new(10, 3, 1));
    }

    #[test]
    fn seek_and_peek() {
        let mut source = SeekableSource::new("héllo");
        assert_eq!(source.advance(), Some('h'));
        assert_eq!(source.peek_nth(1), Some('l'));
        source.seek(2);
        assert_eq!(source.position(), 1);
        source.seek(100);
        assert!(source.is_eof());
        assert_eq!(source.peek(), None);
    }

    #[test]
    fn relative_start_shifts_first_line_only() {
        let source =
            SeekableSource::new("x\ny").with_start(SourceLocation::new(20, 3, 5));
        assert_eq!(source.location_at(1), SourceLocation::new(21, 3, 6));
        assert_eq!(source.location_at(2), SourceLocation::new(22, 4, 0));
    }
}
