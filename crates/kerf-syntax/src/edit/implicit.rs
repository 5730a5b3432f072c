use kerf_errors::SourceLocation;
use kerf_tokenizer::{
    Language, SyntaxKind, is_identifier_part, is_identifier_start, is_newline, tokenize_text,
};
use rustc_hash::FxHashSet;

use super::PartialParseResult;
use crate::{AcceptedCharacters, Span, TextChange};

/// Characters that can change how an implicit expression is delimited.
const STRUCTURAL: &[char] = &['(', ')', '[', ']', '{', '}', '"', '\'', '@', '/', '*', '<', '>'];

struct Edit<'a> {
    span: &'a Span,
    change: &'a TextChange,
    /// Offset of the change inside the span content.
    relative: usize,
}

impl Edit<'_> {
    fn content(&self) -> &str {
        self.span.content()
    }

    fn at_end(&self) -> bool {
        self.change.old_end() == self.span.end_offset()
    }

    fn remaining_is_whitespace(&self) -> bool {
        self.content()
            .get(self.relative + self.change.old_length..)
            .is_some_and(|rest| rest.chars().all(char::is_whitespace))
    }

    fn edited(&self) -> Option<String> {
        self.change.apply(self.content(), self.span.start_offset())
    }

    fn original(&self) -> &str {
        self.change.original_text(self.content(), self.span.start_offset()).unwrap_or_default()
    }
}

pub(super) fn can_accept(
    keywords: &FxHashSet<String>,
    accept_trailing_dot: bool,
    accepted: AcceptedCharacters,
    span: &Span,
    change: &TextChange,
) -> PartialParseResult {
    if accepted == AcceptedCharacters::ANY {
        return PartialParseResult::REJECTED;
    }
    let Some(relative) = change.old_position.checked_sub(span.start_offset()) else {
        return PartialParseResult::REJECTED;
    };
    let edit = Edit { span, change, relative };
    let trailing_dot = if accept_trailing_dot {
        PartialParseResult::ACCEPTED
    } else {
        PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL
    };

    let result = classify(keywords, &edit, trailing_dot);
    if result == PartialParseResult::REJECTED && starts_with_keyword(keywords, &edit) {
        return PartialParseResult::REJECTED | PartialParseResult::SPAN_CONTEXT_CHANGED;
    }
    result
}

fn classify(
    keywords: &FxHashSet<String>,
    edit: &Edit<'_>,
    trailing_dot: PartialParseResult,
) -> PartialParseResult {
    let change = edit.change;
    if is_dotless_commit(edit) {
        return trailing_dot;
    }

    if is_identifier_replacement(edit) {
        return try_accept(keywords, edit, PartialParseResult::ACCEPTED);
    }

    if change.is_replace() && (edit.at_end() || edit.remaining_is_whitespace()) {
        // Completion lists commit `Date.` as `DateTime.`.
        if edit.original().ends_with('.') && change.new_text.ends_with('.') {
            return trailing_dot;
        }
        return PartialParseResult::REJECTED;
    }

    let head = edit.content().get(..edit.relative);
    let Some(previous) = head.and_then(|head| head.chars().next_back()) else {
        return PartialParseResult::REJECTED;
    };

    if change.is_insert()
        && (edit.at_end() || edit.remaining_is_whitespace() || change.new_text == ".")
    {
        return handle_insertion(keywords, edit, previous, trailing_dot);
    }

    if change.is_delete() && (edit.at_end() || edit.remaining_is_whitespace()) {
        return handle_deletion(keywords, edit, previous);
    }

    if is_inside_balanced_parens(edit) {
        return PartialParseResult::ACCEPTED;
    }

    PartialParseResult::REJECTED
}

fn handle_insertion(
    keywords: &FxHashSet<String>,
    edit: &Edit<'_>,
    previous: char,
    trailing_dot: PartialParseResult,
) -> PartialParseResult {
    let text = edit.change.new_text.as_str();
    match previous {
        '.' if is_identifier(text, true) || text == "." => {
            try_accept(keywords, edit, PartialParseResult::ACCEPTED)
        }
        ')' | ']' if text == "()" => try_accept(keywords, edit, PartialParseResult::ACCEPTED),
        c if is_identifier_part(c) && (is_identifier(text, false) || text == "()") => {
            try_accept(keywords, edit, PartialParseResult::ACCEPTED)
        }
        c if (is_identifier_part(c) || c == ')' || c == ']') && ends_with_dot(text) => trailing_dot,
        '(' if text == ")" => try_accept(keywords, edit, PartialParseResult::ACCEPTED),
        _ => PartialParseResult::REJECTED,
    }
}

fn handle_deletion(
    keywords: &FxHashSet<String>,
    edit: &Edit<'_>,
    previous: char,
) -> PartialParseResult {
    if edit.change.old_text.contains([')', ']'])
        && !edit.edited().is_some_and(|edited| is_balanced(&edited))
    {
        return PartialParseResult::REJECTED;
    }
    match previous {
        '.' => {
            let accept = PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL;
            try_accept(keywords, edit, accept)
        }
        c if is_identifier_part(c) => try_accept(keywords, edit, PartialParseResult::ACCEPTED),
        '(' if edit.edited().is_some_and(|edited| is_balanced(&edited)) => {
            PartialParseResult::ACCEPTED
        }
        _ => PartialParseResult::REJECTED,
    }
}

/// Edits that rewrite the leading identifier into a reserved word change
/// what construct the span represents.
fn try_accept(
    keywords: &FxHashSet<String>,
    edit: &Edit<'_>,
    accept: PartialParseResult,
) -> PartialParseResult {
    if edit.edited().is_none() {
        return PartialParseResult::REJECTED;
    }
    if starts_with_keyword(keywords, edit) {
        return PartialParseResult::REJECTED | PartialParseResult::SPAN_CONTEXT_CHANGED;
    }
    accept
}

fn starts_with_keyword(keywords: &FxHashSet<String>, edit: &Edit<'_>) -> bool {
    edit.edited().is_some_and(|edited| {
        let end = edited.find(|c| !is_identifier_part(c)).unwrap_or(edited.len());
        keywords.contains(&edited[..end])
    })
}

/// A dotless commit inserts a completion in front of a `.` the user typed to
/// commit it: `DateT.` becomes `DateTime.`, and `DateTime.` becomes `DateTime..`
/// on the way to `DateTime.Now.`.
fn is_dotless_commit(edit: &Edit<'_>) -> bool {
    let change = edit.change;
    if !edit.content().ends_with('.') {
        return false;
    }

    let new_commit = !edit.at_end()
        && change.old_position > 0
        && is_identifier(&change.new_text, false)
        && (change.old_length == 0 || is_identifier(edit.original(), false));

    let secondary_commit = change.new_text == "."
        && change.old_length == 0
        && (edit.at_end() || change.old_end() + 1 == edit.span.end_offset());

    new_commit || secondary_commit
}

/// Replacing text inside a single identifier token with another identifier.
fn is_identifier_replacement(edit: &Edit<'_>) -> bool {
    let change = edit.change;
    if !change.is_replace() {
        return false;
    }

    let Some(token) = edit.span.tokens().iter().find(|token| {
        let end = u32::from(token.location.offset) as usize + token.content.len();
        end > change.old_position
    }) else {
        return false;
    };

    let token_start = u32::from(token.location.offset) as usize;
    if token_start + token.content.len() < change.old_end() || token.kind != SyntaxKind::IDENTIFIER
    {
        return false;
    }

    let Some(edited) = change.apply(&token.content, token_start) else {
        return false;
    };
    match tokenize_text(Language::Code, &edited, SourceLocation::ZERO).as_slice() {
        [only] => only.kind == SyntaxKind::IDENTIFIER && only.content == edited,
        _ => false,
    }
}

/// Typing inside the argument list of `foo(...)` leaves the expression's extent alone.
fn is_inside_balanced_parens(edit: &Edit<'_>) -> bool {
    let change = edit.change;
    if !(change.is_insert() || change.is_delete()) {
        return false;
    }
    let plain = |text: &str| !text.contains(STRUCTURAL) && !text.chars().any(is_newline);
    if !plain(&change.new_text) || !plain(&change.old_text) {
        return false;
    }

    let content = edit.content();
    if content.contains(['"', '\'']) || !is_balanced(content) {
        return false;
    }

    let (Some(head), Some(tail)) =
        (content.get(..edit.relative), content.get(edit.relative + change.old_length..))
    else {
        return false;
    };
    depth(head) > 0 && tail.contains(')')
}

/// `.`, or an identifier run followed by dots, as typed before a member name.
fn ends_with_dot(text: &str) -> bool {
    let stem = text.trim_end_matches('.');
    text.ends_with('.') && (stem.is_empty() || is_identifier(stem, false))
}

fn depth(text: &str) -> i32 {
    text.chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

fn is_balanced(text: &str) -> bool {
    let mut open = Vec::new();
    for c in text.chars() {
        match c {
            '(' | '[' => open.push(c),
            ')' if open.pop() != Some('(') => return false,
            ']' if open.pop() != Some('[') => return false,
            _ => {}
        }
    }
    open.is_empty()
}

fn is_identifier(text: &str, require_start: bool) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if !require_start || is_identifier_start(first) => {
            is_identifier_part(first) && chars.all(is_identifier_part)
        }
        _ => false,
    }
}
