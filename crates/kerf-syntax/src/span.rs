use std::mem;

use kerf_errors::{Diagnostic, SourceLocation};
use kerf_tokenizer::Token;
use text_size::TextSize;

use crate::{EditHandler, LocationShift, LocationTagged, SpanChunkGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    Transition,
    MetaCode,
    Comment,
    Code,
    Markup,
    None,
}

/// A leaf of the tree: a contiguous run of tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    kind: SpanKind,
    tokens: Vec<Token>,
    generator: SpanChunkGenerator,
    edit_handler: EditHandler,
    start: SourceLocation,
    content: String,
}

impl Span {
    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn generator(&self) -> &SpanChunkGenerator {
        &self.generator
    }

    pub fn edit_handler(&self) -> &EditHandler {
        &self.edit_handler
    }

    pub fn start(&self) -> SourceLocation {
        self.start
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn length(&self) -> TextSize {
        TextSize::of(self.content.as_str())
    }

    pub fn end(&self) -> SourceLocation {
        self.start.advance(&self.content)
    }

    pub fn start_offset(&self) -> usize {
        u32::from(self.start.offset) as usize
    }

    pub fn end_offset(&self) -> usize {
        self.start_offset() + self.content.len()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.tokens.iter().flat_map(|token| &token.diagnostics)
    }

    /// Same kind, start, content and edit behavior; generators are ignored.
    pub fn equivalent_to(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.start == other.start
            && self.edit_handler == other.edit_handler
            && self.content == other.content
    }

    /// A copy of this span holding `tokens` instead; literal attribute values follow the content.
    pub(crate) fn with_tokens(&self, tokens: Vec<Token>) -> Self {
        let content: String = tokens.iter().map(|token| token.content.as_str()).collect();
        let generator = match &self.generator {
            SpanChunkGenerator::LiteralAttribute { prefix, value } => {
                SpanChunkGenerator::LiteralAttribute {
                    prefix: prefix.clone(),
                    value: LocationTagged::new(content.clone(), value.location),
                }
            }
            other => other.clone(),
        };
        Self {
            kind: self.kind,
            tokens,
            generator,
            edit_handler: self.edit_handler.clone(),
            start: self.start,
            content,
        }
    }

    pub(crate) fn shifted(&self, shift: &LocationShift) -> Self {
        Self {
            kind: self.kind,
            tokens: self
                .tokens
                .iter()
                .map(|token| token.relocated(shift.apply(token.location)))
                .collect(),
            generator: self.generator.shifted(shift),
            edit_handler: self.edit_handler.clone(),
            start: shift.apply(self.start),
            content: self.content.clone(),
        }
    }
}

/// Mutable staging area for a [`Span`].
#[derive(Debug, Clone)]
pub struct SpanBuilder {
    pub kind: SpanKind,
    pub generator: SpanChunkGenerator,
    pub edit_handler: EditHandler,
    start: SourceLocation,
    tokens: Vec<Token>,
}

impl Default for SpanBuilder {
    fn default() -> Self {
        Self::new(SourceLocation::ZERO)
    }
}

impl SpanBuilder {
    pub fn new(start: SourceLocation) -> Self {
        Self {
            kind: SpanKind::Markup,
            generator: SpanChunkGenerator::Null,
            edit_handler: EditHandler::default(),
            start,
            tokens: Vec::new(),
        }
    }

    /// Starts from a copy of an existing span.
    pub fn from_span(span: &Span) -> Self {
        Self {
            kind: span.kind,
            generator: span.generator.clone(),
            edit_handler: span.edit_handler.clone(),
            start: span.start,
            tokens: span.tokens.clone(),
        }
    }

    pub fn start(&self) -> SourceLocation {
        self.start
    }

    pub fn set_start(&mut self, start: SourceLocation) {
        self.start = start;
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn content(&self) -> String {
        self.tokens.iter().map(|token| token.content.as_str()).collect()
    }

    pub fn end(&self) -> SourceLocation {
        self.tokens.last().map_or(self.start, Token::end)
    }

    pub fn accept(&mut self, token: Token) {
        if self.tokens.is_empty() {
            self.start = token.location;
        }
        self.tokens.push(token);
    }

    pub fn clear_tokens(&mut self) {
        self.tokens.clear();
    }

    /// Freezes the staged span and leaves the builder blank, starting where
    /// the built span ended.
    pub fn build(&mut self) -> Span {
        let end = self.end();
        let tokens = mem::take(&mut self.tokens);
        let content = tokens.iter().map(|token| token.content.as_str()).collect();
        Span {
            kind: mem::replace(&mut self.kind, SpanKind::Markup),
            generator: mem::take(&mut self.generator),
            edit_handler: mem::take(&mut self.edit_handler),
            start: mem::replace(&mut self.start, end),
            tokens,
            content,
        }
    }
}
