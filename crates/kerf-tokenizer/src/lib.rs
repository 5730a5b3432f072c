//! Tokenizers for the markup language and the embedded code language.
//!
//! Both tokenizers read from a shared [`SeekableSource`] and never own it, so
//! a parser can reposition the source and keep tokenizing from there.

mod code;
mod comment;
mod keyword;
mod markup;
mod source;
mod syntax_kind;
mod syntax_set;
#[cfg(test)]
mod tests;

use std::fmt;

/// Tokenizer for the embedded code language.
pub use code::CodeTokenizer;
use kerf_errors::{Diagnostic, ErrorKind, SourceLocation, SourceSpan};
/// Reserved words of the code language.
pub use keyword::Keyword;
/// Tokenizer for the markup language.
pub use markup::MarkupTokenizer;
/// Repositionable source text.
pub use source::SeekableSource;
/// Token kinds shared by both tokenizers.
pub use syntax_kind::SyntaxKind;
/// Compact set for grouping `SyntaxKind` values.
pub use syntax_set::SyntaxSet;
use text_size::TextSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Markup,
    Code,
}

/// A run of source text with a kind.
///
/// Diagnostics attached to a token are anchored at the token's own location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: SyntaxKind,
    pub content: String,
    pub location: SourceLocation,
    pub keyword: Option<Keyword>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Token {
    pub fn new(kind: SyntaxKind, content: impl Into<String>, location: SourceLocation) -> Self {
        Self { kind, content: content.into(), location, keyword: None, diagnostics: Vec::new() }
    }

    /// A zero-width token that marks a position for later edits.
    pub fn marker(location: SourceLocation) -> Self {
        Self::new(SyntaxKind::MARKER, "", location)
    }

    pub fn len(&self) -> TextSize {
        TextSize::of(self.content.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn end(&self) -> SourceLocation {
        self.location.advance(&self.content)
    }

    pub fn is(&self, kind: SyntaxKind) -> bool {
        self.kind == kind
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.keyword == Some(keyword)
    }

    /// Moves the token (and its diagnostics) to `location`.
    pub fn relocated(&self, location: SourceLocation) -> Self {
        let mut token = self.clone();
        token.relocate(location);
        token
    }

    pub fn relocate(&mut self, location: SourceLocation) {
        self.location = location;
        for diagnostic in &mut self.diagnostics {
            *diagnostic = Diagnostic::error(
                diagnostic.kind().clone(),
                SourceSpan::new(diagnostic.span().file.clone(), location, diagnostic.span().length),
            );
        }
    }

    /// Splits the token at byte `at`; the head takes `head_kind`, the tail keeps the rest.
    pub fn split(self, at: usize, head_kind: SyntaxKind, tail_kind: SyntaxKind) -> (Self, Self) {
        let head = Token::new(head_kind, &self.content[..at], self.location);
        let tail_location = self.location.advance(&self.content[..at]);
        let mut tail = Token::new(tail_kind, &self.content[at..], tail_location);
        tail.diagnostics = self.diagnostics;
        tail.relocate(tail_location);
        (head, tail)
    }

    pub(crate) fn with_diagnostic(
        mut self,
        kind: ErrorKind,
        file: Option<&std::sync::Arc<str>>,
    ) -> Self {
        self.diagnostics.push(Diagnostic::error(
            kind,
            SourceSpan::new(file.cloned(), self.location, TextSize::new(1)),
        ));
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{} {:?}", self.kind, u32::from(self.location.offset), self.content)
    }
}

/// A character-stream state machine producing tokens from a [`SeekableSource`].
pub trait Tokenize: Clone + Default {
    const LANGUAGE: Language;

    /// Reads the next token, or `None` at the end of the source.
    fn next_token(&mut self, source: &mut SeekableSource) -> Option<Token>;

    /// Drops state carried between tokens; called after the source was repositioned.
    fn reset(&mut self);
}

/// Tokenizes a whole source in one language.
pub fn tokenize<T: Tokenize>(mut source: SeekableSource) -> Vec<Token> {
    let mut tokenizer = T::default();
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.next_token(&mut source) {
        tokens.push(token);
    }
    tokens
}

/// Tokenizes `text` as `language`, locating tokens relative to `start`.
pub fn tokenize_text(language: Language, text: &str, start: SourceLocation) -> Vec<Token> {
    let source = SeekableSource::new(text).with_start(start);
    match language {
        Language::Markup => tokenize::<MarkupTokenizer>(source),
        Language::Code => tokenize::<CodeTokenizer>(source),
    }
}

pub(crate) fn finish_token(source: &SeekableSource, start: usize, kind: SyntaxKind) -> Token {
    Token::new(kind, source.slice(start, source.position()), source.location_at(start))
}

pub fn is_newline(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub fn is_whitespace(c: char) -> bool {
    c.is_whitespace() && !is_newline(c)
}

pub fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

pub fn is_identifier_part(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Reads a newline starting with `first`, treating `\r\n` as one.
pub(crate) fn eat_newline_tail(source: &mut SeekableSource, first: char) {
    if first == '\r' {
        source.eat('\n');
    }
}
