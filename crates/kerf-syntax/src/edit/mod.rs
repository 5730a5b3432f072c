//! Per-span policies deciding whether an edit can be absorbed without a reparse.

mod implicit;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use kerf_errors::SourceLocation;
use kerf_tokenizer::{Language, SyntaxKind, Token, is_newline, tokenize_text};
use rustc_hash::FxHashSet;

use crate::{AcceptedCharacters, Span, SpanKind, TextChange};

bitflags::bitflags! {
    /// Outcome of a partial-parse attempt.
    ///
    /// Exactly one of `ACCEPTED` and `REJECTED` is set. `PROVISIONAL` only
    /// accompanies `ACCEPTED`; `SPAN_CONTEXT_CHANGED` and `AUTO_COMPLETE_BLOCK`
    /// only accompany `REJECTED`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PartialParseResult: u8 {
        const ACCEPTED = 1;
        const REJECTED = 1 << 1;
        const PROVISIONAL = 1 << 2;
        const SPAN_CONTEXT_CHANGED = 1 << 3;
        const AUTO_COMPLETE_BLOCK = 1 << 4;
    }
}

impl PartialParseResult {
    pub fn is_accepted(self) -> bool {
        self.contains(Self::ACCEPTED)
    }

    pub fn is_provisional(self) -> bool {
        self.contains(Self::PROVISIONAL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditHandlerKind {
    Default,
    ImplicitExpression { keywords: Arc<FxHashSet<String>>, accept_trailing_dot: bool },
    CodeBlock,
    AutoComplete { auto_complete_string: Option<String>, at_end_of_span: bool },
    DirectiveToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditHandler {
    pub accepted: AcceptedCharacters,
    pub language: Language,
    pub kind: EditHandlerKind,
}

impl Default for EditHandler {
    fn default() -> Self {
        Self::new(Language::Markup, AcceptedCharacters::ANY)
    }
}

/// The result of [`EditHandler::apply_change`]: the verdict and, when accepted, the updated span.
#[derive(Debug, Clone)]
pub struct EditResult {
    pub result: PartialParseResult,
    pub span: Option<Span>,
}

impl EditHandler {
    pub fn new(language: Language, accepted: AcceptedCharacters) -> Self {
        Self { accepted, language, kind: EditHandlerKind::Default }
    }

    pub fn implicit_expression(
        keywords: Arc<FxHashSet<String>>,
        accept_trailing_dot: bool,
    ) -> Self {
        Self {
            accepted: AcceptedCharacters::NON_WHITE_SPACE,
            language: Language::Code,
            kind: EditHandlerKind::ImplicitExpression { keywords, accept_trailing_dot },
        }
    }

    pub fn code_block() -> Self {
        Self {
            kind: EditHandlerKind::CodeBlock,
            ..Self::new(Language::Code, AcceptedCharacters::ANY)
        }
    }

    pub fn auto_complete(at_end_of_span: bool) -> Self {
        Self {
            kind: EditHandlerKind::AutoComplete { auto_complete_string: None, at_end_of_span },
            ..Self::new(Language::Code, AcceptedCharacters::ANY)
        }
    }

    pub fn directive_token() -> Self {
        Self {
            kind: EditHandlerKind::DirectiveToken,
            ..Self::new(Language::Code, AcceptedCharacters::NON_WHITE_SPACE)
        }
    }

    pub fn with_accepted(mut self, accepted: AcceptedCharacters) -> Self {
        self.accepted = accepted;
        self
    }

    pub fn auto_complete_string(&self) -> Option<&str> {
        match &self.kind {
            EditHandlerKind::AutoComplete { auto_complete_string, .. } => {
                auto_complete_string.as_deref()
            }
            _ => None,
        }
    }

    /// Records the text an editor should insert to close an unterminated block.
    pub fn set_auto_complete_string(&mut self, text: impl Into<String>) {
        if let EditHandlerKind::AutoComplete { auto_complete_string, .. } = &mut self.kind {
            *auto_complete_string = Some(text.into());
        }
    }

    /// True when the change starts inside `span` and ends before its end, or
    /// at its end if the span accepts any characters at all.
    pub fn owns_change(&self, span: &Span, change: &TextChange) -> bool {
        let end = span.end_offset();
        let old_end = change.old_end();
        change.old_position >= span.start_offset()
            && (old_end < end || (old_end == end && self.accepted != AcceptedCharacters::NONE))
    }

    pub fn can_accept(&self, span: &Span, change: &TextChange) -> PartialParseResult {
        match &self.kind {
            EditHandlerKind::Default => self.default_result(span, change),
            EditHandlerKind::ImplicitExpression { keywords, accept_trailing_dot } => {
                implicit::can_accept(keywords, *accept_trailing_dot, self.accepted, span, change)
            }
            EditHandlerKind::CodeBlock => {
                let touches_brace = |text: &str| text.contains(['{', '}']);
                if touches_brace(&change.new_text) || touches_brace(&change.old_text) {
                    return PartialParseResult::REJECTED;
                }
                self.default_result(span, change)
            }
            EditHandlerKind::AutoComplete { auto_complete_string, at_end_of_span } => {
                let at_end = *at_end_of_span && change.old_end() == span.end_offset();
                if auto_complete_string.is_some()
                    && change.is_insert()
                    && is_newline_text(&change.new_text)
                    && (at_end || is_at_end_of_first_line(span, change))
                {
                    return PartialParseResult::REJECTED | PartialParseResult::AUTO_COMPLETE_BLOCK;
                }
                self.default_result(span, change)
            }
            EditHandlerKind::DirectiveToken => {
                let has_whitespace = |text: &str| text.chars().any(char::is_whitespace);
                let edited = change.apply(span.content(), span.start_offset());
                let original = change.original_text(span.content(), span.start_offset());
                match (original, edited) {
                    (Some(original), Some(edited))
                        if self.accepted == AcceptedCharacters::NON_WHITE_SPACE
                            && !has_whitespace(original)
                            && !has_whitespace(&edited) =>
                    {
                        PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL
                    }
                    _ => PartialParseResult::REJECTED,
                }
            }
        }
    }

    /// Asks [`can_accept`](Self::can_accept) unless `force` is set, and on
    /// acceptance returns the span with the change applied.
    pub fn apply_change(&self, span: &Span, change: &TextChange, force: bool) -> EditResult {
        let result =
            if force { PartialParseResult::ACCEPTED } else { self.can_accept(span, change) };
        if !result.is_accepted() {
            return EditResult { result, span: None };
        }

        match change.apply(span.content(), span.start_offset()) {
            Some(content) => {
                let tokens = tokenize_text(self.language, &content, span.start());
                EditResult { result, span: Some(span.with_tokens(tokens)) }
            }
            None => EditResult { result: PartialParseResult::REJECTED, span: None },
        }
    }

    fn default_result(&self, span: &Span, change: &TextChange) -> PartialParseResult {
        if self.accepts_in_place(span, change) {
            PartialParseResult::ACCEPTED
        } else {
            PartialParseResult::REJECTED
        }
    }

    fn accepts_in_place(&self, span: &Span, change: &TextChange) -> bool {
        if !matches!(span.kind(), SpanKind::Markup | SpanKind::Code)
            || self.accepted == AcceptedCharacters::NONE
        {
            return false;
        }

        let start = span.start_offset();
        if change.old_position <= start || change.old_end() >= span.end_offset() {
            return false;
        }

        if change.old_text.chars().any(is_newline)
            || change.new_text.chars().any(is_newline)
            || !self.accepted.admits(&change.new_text)
        {
            return false;
        }

        change
            .apply(span.content(), start)
            .is_some_and(|edited| same_shape(self.language, span.content(), &edited))
    }
}

/// Words that are plain identifiers to the tokenizer but steer the parsers.
const CONTEXTUAL_WORDS: &[&str] = &[
    "when",
    "text",
    "helper",
    "where",
    "section",
    "functions",
    "inherits",
    "addTagHelper",
    "removeTagHelper",
    "tagHelperPrefix",
];

/// Compares the token streams of two texts: kinds must line up one to one,
/// and only tokens that never steer the parsers may change their content.
fn same_shape(language: Language, before: &str, after: &str) -> bool {
    let before = tokenize_text(language, before, SourceLocation::ZERO);
    let after = tokenize_text(language, after, SourceLocation::ZERO);

    before.len() == after.len()
        && before.iter().zip(&after).all(|(a, b)| {
            a.kind == b.kind
                && a.diagnostics.is_empty() == b.diagnostics.is_empty()
                && (a.content == b.content || (is_free(language, a) && is_free(language, b)))
        })
}

fn is_free(language: Language, token: &Token) -> bool {
    match language {
        Language::Markup => matches!(token.kind, SyntaxKind::TEXT | SyntaxKind::WHITESPACE),
        Language::Code => match token.kind {
            SyntaxKind::IDENTIFIER => !CONTEXTUAL_WORDS.contains(&token.content.as_str()),
            SyntaxKind::WHITESPACE
            | SyntaxKind::INTEGER_LITERAL
            | SyntaxKind::REAL_LITERAL
            | SyntaxKind::STRING_LITERAL
            | SyntaxKind::CHARACTER_LITERAL
            | SyntaxKind::COMMENT => true,
            _ => false,
        },
    }
}

fn is_newline_text(text: &str) -> bool {
    matches!(text, "\n" | "\r\n" | "\r" | "\u{2028}" | "\u{2029}")
}

fn is_at_end_of_first_line(span: &Span, change: &TextChange) -> bool {
    let content = span.content();
    content
        .find(is_newline)
        .is_some_and(|index| change.old_position == span.start_offset() + index)
}
