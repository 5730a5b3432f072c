use std::sync::Arc;
use std::time::Duration;

use kerf_parse::{ParserOptions, TagBinder, parse, rewrite};
use kerf_syntax::{PartialParseResult, SyntaxTree, TagDescriptor, TagMatchingRule, TextChange};
use rstest::rstest;

use crate::{DocumentParser, EditorConfig, EditorError, ParseCompleted, trees_are_different};

const TIMEOUT: Duration = Duration::from_secs(10);

fn next_completion(parser: &DocumentParser) -> ParseCompleted {
    parser.completions().recv_timeout(TIMEOUT).expect("reparse did not finish")
}

/// Waits for the completion that covers the current buffer.
fn settle(parser: &DocumentParser) -> ParseCompleted {
    loop {
        let completed = next_completion(parser);
        if *completed.buffer == *parser.text() && !parser.is_reparsing() {
            return completed;
        }
    }
}

fn opened(text: &str) -> DocumentParser {
    let parser = DocumentParser::new(text, EditorConfig::default()).expect("worker starts");
    settle(&parser);
    parser
}

fn fresh(text: &str) -> SyntaxTree {
    parse(text, &ParserOptions::default())
}

#[test]
fn initial_parse_is_published() {
    let parser = DocumentParser::new("<p>@name</p>", EditorConfig::default()).unwrap();
    let completed = next_completion(&parser);
    assert!(completed.tree_structure_changed);
    assert!(completed.change.is_none());
    assert_eq!(completed.tree.content(), "<p>@name</p>");
    assert_eq!(parser.tree().map(|tree| tree.content()).as_deref(), Some("<p>@name</p>"));
}

#[rstest]
#[case::markup_text("Hello world", TextChange::insert(3, "x"))]
#[case::identifier("<p>@foo</p>", TextChange::insert(7, "d"))]
#[case::markup_delete("<div>some text</div>", TextChange::delete(11, "e"))]
fn accepted_edits_match_a_full_parse(#[case] text: &str, #[case] change: TextChange) {
    let mut parser = opened(text);
    let result = parser.apply_edit(change).unwrap();
    assert!(result.is_accepted(), "{result:?}");
    assert!(!parser.is_reparsing());

    let edited = parser.text();
    let tree = parser.tree().unwrap();
    assert_eq!(tree.content(), *edited);
    assert!(tree.is_well_formed());
    assert!(tree.root_block().equivalent_to(fresh(&edited).root_block()));
}

#[test]
fn rejected_edit_queues_a_reparse() {
    let mut parser = opened("Hello world");
    let result = parser.apply_edit(TextChange::insert(5, " @x ")).unwrap();
    assert!(!result.is_accepted());

    let completed = settle(&parser);
    assert!(completed.tree_structure_changed);
    assert_eq!(completed.change, Some(TextChange::insert(5, " @x ")));
    assert_eq!(completed.tree.content(), "Hello @x  world");
}

#[test]
fn edits_during_a_reparse_are_merged() {
    let mut parser = opened("<p>one</p>");
    parser.apply_edit(TextChange::insert(3, "@a ")).unwrap();
    parser.apply_edit(TextChange::insert(0, "@{ var b = 1; }")).unwrap();
    parser.apply_edit(TextChange::insert(0, "<div>")).unwrap();

    let completed = settle(&parser);
    let expected = "<div>@{ var b = 1; }<p>@a one</p>";
    assert_eq!(*parser.text(), *expected);
    assert_eq!(completed.tree.content(), expected);
    assert!(completed.tree.root_block().equivalent_to(fresh(expected).root_block()));
}

#[test]
fn unchanged_buffer_keeps_its_structure() {
    let mut parser = opened("<p>@Model.Title</p>");
    parser.force_reparse().unwrap();
    let completed = settle(&parser);
    assert!(!completed.tree_structure_changed);
}

#[test]
fn provisional_edit_must_settle_first() {
    let mut parser = opened("<p>@foo</p>");
    let result = parser.apply_edit(TextChange::insert(7, ".")).unwrap();
    assert_eq!(result, PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL);

    let result = parser.apply_edit(TextChange::insert(1, "x")).unwrap();
    assert_eq!(result, PartialParseResult::REJECTED);
    assert_eq!(settle(&parser).tree.content(), "<xp>@foo.</p>");
}

#[test]
fn out_of_bounds_edit_is_an_error() {
    let mut parser = opened("short");
    let error = parser.apply_edit(TextChange::delete(3, "too long")).unwrap_err();
    assert!(matches!(error, EditorError::OutOfBounds { start: 3, end: 11, length: 5 }));
}

#[test]
fn mismatched_change_lengths_are_out_of_bounds() {
    let mut parser = opened("ab");
    let error = parser.apply_edit(TextChange::new(10, 2, "ab", 10, 5, "ab")).unwrap_err();
    assert!(matches!(error, EditorError::OutOfBounds { start: 10, end: 12, length: 2 }));
    assert_eq!(&*parser.text(), "ab");
}

#[test]
fn edits_after_shutdown_fail() {
    let mut parser = opened("text");
    parser.shutdown();
    let error = parser.apply_edit(TextChange::insert(0, "a")).unwrap_err();
    assert!(matches!(error, EditorError::ShutDown));
}

#[test]
fn document_prefix_binds_through_the_host_provider() {
    let binder = TagBinder::new([TagDescriptor::new("Card").rule(TagMatchingRule::new("card"))]);
    let config = EditorConfig::default().with_descriptors(Arc::new(binder));
    let text = "@tagHelperPrefix \"x-\"\n<x-card></x-card><card></card>";
    let parser = DocumentParser::new(text, config).unwrap();

    let completed = settle(&parser);
    let bound: Vec<_> = completed
        .tree
        .spans()
        .filter_map(|span| span.ancestors().find_map(|node| node.as_tag()))
        .map(|tag| tag.tag_name().to_owned())
        .collect();
    assert!(!bound.is_empty());
    assert!(bound.iter().all(|name| name == "x-card"));
}

#[test]
fn identical_trees_are_not_different() {
    let text = "<p>@x</p>";
    assert!(!trees_are_different(&fresh(text), &fresh(text), &[]));
}

#[test]
fn replayed_text_edit_is_not_different() {
    let change = TextChange::insert(4, "z");
    assert!(!trees_are_different(&fresh("<p>abc</p>"), &fresh("<p>azbc</p>"), &[change]));
}

#[test]
fn structural_edit_is_different() {
    let change = TextChange::insert(3, "<b>");
    assert!(trees_are_different(&fresh("<p>abc</p>"), &fresh("<p><b>abc</p>"), &[change]));
}

#[test]
fn rewritten_trees_compare_like_parsed_ones() {
    let binder = TagBinder::new([TagDescriptor::new("Card").rule(TagMatchingRule::new("card"))]);
    let text = "<card>hi</card>";
    let bound = rewrite(&fresh(text), &binder, None);
    assert!(!trees_are_different(&bound, &rewrite(&fresh(text), &binder, None), &[]));
    assert!(trees_are_different(&fresh(text), &bound, &[]));
}
