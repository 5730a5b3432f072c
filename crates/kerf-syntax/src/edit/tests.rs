use std::sync::Arc;

use kerf_errors::SourceLocation;
use kerf_tokenizer::{Language, tokenize_text};
use rstest::rstest;
use rustc_hash::FxHashSet;

use super::{EditHandler, PartialParseResult};
use crate::{
    AcceptedCharacters, LocationTagged, Span, SpanBuilder, SpanChunkGenerator, SpanKind,
    TextChange,
};

const ACCEPTED: PartialParseResult = PartialParseResult::ACCEPTED;
const REJECTED: PartialParseResult = PartialParseResult::REJECTED;
const PROVISIONAL: PartialParseResult = PartialParseResult::PROVISIONAL;

fn span(kind: SpanKind, language: Language, text: &str, start: u32, handler: EditHandler) -> Span {
    let location = SourceLocation::new(start, 0, start);
    let mut builder = SpanBuilder::new(location);
    builder.kind = kind;
    builder.edit_handler = handler;
    for token in tokenize_text(language, text, location) {
        builder.accept(token);
    }
    builder.build()
}

fn implicit(accept_trailing_dot: bool) -> EditHandler {
    let keywords: FxHashSet<String> =
        ["if", "inherits", "functions"].into_iter().map(String::from).collect();
    EditHandler::implicit_expression(Arc::new(keywords), accept_trailing_dot)
}

fn implicit_result(text: &str, start: u32, change: TextChange, nested: bool) -> PartialParseResult {
    let target = span(SpanKind::Code, Language::Code, text, start, implicit(nested));
    target.edit_handler().can_accept(&target, &change)
}

#[rstest]
#[case::dotless_commit("foo.", 1, TextChange::insert(5, "."), ACCEPTED | PROVISIONAL)]
#[case::dotless_commit_before_dot("foo.", 1, TextChange::insert(4, "."), ACCEPTED | PROVISIONAL)]
#[case::new_dotless_commit(
    "DateT.",
    1,
    TextChange::replace(1, "DateT", "DateTime"),
    ACCEPTED | PROVISIONAL
)]
#[case::dot_after_identifier("foo", 5, TextChange::insert(8, "."), ACCEPTED | PROVISIONAL)]
#[case::identifier_at_end("foo", 5, TextChange::insert(8, "b"), ACCEPTED)]
#[case::identifier_after_dot("foo.", 5, TextChange::insert(9, "bar"), ACCEPTED)]
#[case::expansion_and_dot("U", 5, TextChange::insert(6, "ser."), ACCEPTED | PROVISIONAL)]
#[case::whole_identifier("date", 5, TextChange::replace(5, "date", "DateTime"), ACCEPTED)]
#[case::identifier_prefix("dTime", 5, TextChange::replace(5, "d", "Date"), ACCEPTED)]
#[case::identifier_suffix("DateTime.n", 5, TextChange::replace(14, "n", "Now"), ACCEPTED)]
#[case::keyword_replacement(
    "date",
    5,
    TextChange::replace(5, "date", "if"),
    REJECTED | PartialParseResult::SPAN_CONTEXT_CHANGED
)]
#[case::directive_replacement(
    "date",
    5,
    TextChange::replace(5, "date", "inherits"),
    REJECTED | PartialParseResult::SPAN_CONTEXT_CHANGED
)]
#[case::delete_after_dot("User.Name", 5, TextChange::delete(10, "Name"), ACCEPTED | PROVISIONAL)]
#[case::delete_identifier_tail("User", 5, TextChange::delete(7, "er"), ACCEPTED)]
#[case::identifier_after_call("foo()", 1, TextChange::insert(6, "x"), REJECTED)]
#[case::call_after_identifier("foo", 1, TextChange::insert(4, "()"), ACCEPTED)]
#[case::inside_call("foo(a)", 1, TextChange::insert(6, "b"), ACCEPTED)]
#[case::paren_inside_call("foo(a)", 1, TextChange::insert(6, "("), REJECTED)]
#[case::whitespace_at_end("foo", 1, TextChange::insert(4, " "), REJECTED)]
#[case::insert_at_start("foo", 1, TextChange::insert(1, "x"), REJECTED)]
#[case::delete_closing_paren("foo(1, 2)", 1, TextChange::delete(9, ")"), REJECTED)]
#[case::delete_closing_bracket("foo[0]", 1, TextChange::delete(6, "]"), REJECTED)]
#[case::delete_whole_call("foo(1)", 1, TextChange::delete(4, "(1)"), ACCEPTED)]
fn implicit_expression_edits(
    #[case] text: &str,
    #[case] start: u32,
    #[case] change: TextChange,
    #[case] expected: PartialParseResult,
) {
    assert_eq!(implicit_result(text, start, change, false), expected);
}

#[test]
fn nested_expressions_keep_trailing_dots() {
    assert_eq!(implicit_result("foo", 3, TextChange::insert(6, "."), true), ACCEPTED);
    assert_eq!(implicit_result("foo.", 3, TextChange::insert(7, "."), true), ACCEPTED);
}

#[test]
fn implicit_expression_rejects_when_any_is_accepted() {
    let handler = implicit(false).with_accepted(AcceptedCharacters::ANY);
    let target = span(SpanKind::Code, Language::Code, "foo", 1, handler);
    assert_eq!(target.edit_handler().can_accept(&target, &TextChange::insert(4, "b")), REJECTED);
}

#[test]
fn owns_change_at_end_only_when_accepting() {
    let target = span(SpanKind::Code, Language::Code, "foo", 1, implicit(false));
    let handler = target.edit_handler();
    assert!(handler.owns_change(&target, &TextChange::insert(4, ".")));
    assert!(handler.owns_change(&target, &TextChange::insert(2, ".")));
    assert!(!handler.owns_change(&target, &TextChange::insert(0, ".")));

    let closed = handler.clone().with_accepted(AcceptedCharacters::NONE);
    assert!(!closed.owns_change(&target, &TextChange::insert(4, ".")));
    assert!(closed.owns_change(&target, &TextChange::insert(3, ".")));
}

#[rstest]
#[case::same_shape(TextChange::replace(2, "l", "L"), ACCEPTED)]
#[case::new_tag(TextChange::insert(5, "<"), REJECTED)]
#[case::new_word(TextChange::insert(3, " "), REJECTED)]
#[case::newline(TextChange::insert(3, "\n"), REJECTED)]
#[case::at_start(TextChange::insert(0, "x"), REJECTED)]
#[case::at_end(TextChange::insert(11, "x"), REJECTED)]
#[case::transition(TextChange::insert(6, "@"), REJECTED)]
fn default_handler_on_markup(#[case] change: TextChange, #[case] expected: PartialParseResult) {
    let target = span(SpanKind::Markup, Language::Markup, "hello world", 0, EditHandler::default());
    assert_eq!(target.edit_handler().can_accept(&target, &change), expected);
}

#[test]
fn default_handler_rejects_new_keyword() {
    let handler = EditHandler::new(Language::Code, AcceptedCharacters::ANY);
    let target = span(SpanKind::Code, Language::Code, "a + b;", 0, handler);
    let handler = target.edit_handler();
    assert_eq!(handler.can_accept(&target, &TextChange::replace(4, "b", "c")), ACCEPTED);
    assert_eq!(handler.can_accept(&target, &TextChange::replace(4, "b", "if")), REJECTED);
    assert_eq!(handler.can_accept(&target, &TextChange::replace(4, "b", "text")), REJECTED);
}

#[test]
fn transition_spans_never_accept() {
    let handler = EditHandler::default().with_accepted(AcceptedCharacters::ANY);
    let target = span(SpanKind::Transition, Language::Markup, "abc", 0, handler);
    assert_eq!(target.edit_handler().can_accept(&target, &TextChange::insert(1, "x")), REJECTED);
}

#[test]
fn code_block_rejects_braces() {
    let target = span(SpanKind::Code, Language::Code, "var x = 1;", 2, EditHandler::code_block());
    let handler = target.edit_handler();
    assert_eq!(handler.can_accept(&target, &TextChange::replace(6, "x", "y")), ACCEPTED);
    assert_eq!(handler.can_accept(&target, &TextChange::insert(8, "}")), REJECTED);
    assert_eq!(handler.can_accept(&target, &TextChange::insert(8, "{")), REJECTED);
}

#[test]
fn auto_complete_on_newline_after_first_line() {
    let mut handler = EditHandler::auto_complete(false);
    let target = span(SpanKind::Code, Language::Code, "  foo\n", 2, handler.clone());
    let newline = TextChange::insert(7, "\n");
    assert_eq!(target.edit_handler().can_accept(&target, &newline), REJECTED);

    handler.set_auto_complete_string("}");
    assert_eq!(handler.auto_complete_string(), Some("}"));
    let target = span(SpanKind::Code, Language::Code, "  foo\n", 2, handler);
    assert_eq!(
        target.edit_handler().can_accept(&target, &newline),
        REJECTED | PartialParseResult::AUTO_COMPLETE_BLOCK
    );
}

#[test]
fn directive_tokens_accept_provisionally() {
    let target = span(SpanKind::Code, Language::Code, "Foo", 10, EditHandler::directive_token());
    let handler = target.edit_handler();
    assert_eq!(handler.can_accept(&target, &TextChange::insert(13, "Bar")), ACCEPTED | PROVISIONAL);
    assert_eq!(handler.can_accept(&target, &TextChange::insert(13, " x")), REJECTED);
}

#[test]
fn apply_change_rebuilds_span() {
    let target = span(SpanKind::Code, Language::Code, "foo", 1, implicit(false));
    let edit = target.edit_handler().apply_change(&target, &TextChange::insert(4, "bar"), false);
    assert_eq!(edit.result, ACCEPTED);
    let updated = edit.span.unwrap();
    assert_eq!(updated.content(), "foobar");
    assert_eq!(updated.start(), target.start());
    assert_eq!(updated.tokens().len(), 1);

    let rejected = target.edit_handler().apply_change(&target, &TextChange::insert(4, " "), false);
    assert_eq!(rejected.result, REJECTED);
    assert!(rejected.span.is_none());

    let forced = target.edit_handler().apply_change(&target, &TextChange::insert(4, " "), true);
    assert_eq!(forced.span.unwrap().content(), "foo ");
}

#[test]
fn apply_change_refreshes_literal_attribute_value() {
    let location = SourceLocation::new(10, 0, 10);
    let mut builder = SpanBuilder::new(location);
    builder.generator = SpanChunkGenerator::LiteralAttribute {
        prefix: LocationTagged::new(String::new(), location),
        value: LocationTagged::new("one two".to_owned(), location),
    };
    for token in tokenize_text(Language::Markup, "one two", location) {
        builder.accept(token);
    }
    let target = builder.build();

    let change = TextChange::replace(11, "n", "w");
    let edit = target.edit_handler().apply_change(&target, &change, false);
    let updated = edit.span.unwrap();
    assert_eq!(
        updated.generator(),
        &SpanChunkGenerator::LiteralAttribute {
            prefix: LocationTagged::new(String::new(), location),
            value: LocationTagged::new("owe two".to_owned(), location),
        }
    );
}
