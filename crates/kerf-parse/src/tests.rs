use std::fs;
use std::path::{Path, PathBuf};

use expect_test::expect_file;
use kerf_errors::ErrorKind;
use kerf_syntax::{
    BlockKind, BoundAttribute, DirectiveTokenKind, NodeRef, SyntaxNode, SyntaxTree, TagDescriptor,
    TagMatchingRule, TagMode, TagStructure, TextChange, WalkEvent,
};
use kerf_tokenizer::SeekableSource;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

use crate::{
    DirectiveDescriptor, DirectiveKind, ParserOptions, TagBinder, parse, parse_and_bind,
    parse_source, rewrite, tag_helper_prefix,
};

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct TestCase {
    input: PathBuf,
    expected: PathBuf,
    text: String,
}

impl TestCase {
    fn list() -> Vec<Self> {
        let test_data_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("test_data");

        let mut cases = fs::read_dir(&test_data_dir)
            .unwrap_or_else(|err| {
                panic!("Cannot read directory {}: {err}", test_data_dir.display())
            })
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if path.extension()? == "kerf" {
                    let expected = path.with_extension("ir");
                    let text = fs::read_to_string(&path).ok()?;
                    Some(Self { input: path, expected, text })
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        cases.sort();
        cases
    }
}

fn debug_tree(tree: &SyntaxTree) -> String {
    let diagnostics = tree
        .diagnostics()
        .iter()
        .map(|d| format!("  {}", d.message()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\nErrors:\n{diagnostics}", tree.debug_dump())
}

fn entered(tree: &SyntaxTree) -> impl Iterator<Item = NodeRef<'_>> {
    tree.preorder().filter_map(|event| match event {
        WalkEvent::Enter(node) => Some(node),
        WalkEvent::Leave(_) => None,
    })
}

fn count_errors(tree: &SyntaxTree, matches: impl Fn(&ErrorKind) -> bool) -> usize {
    tree.diagnostics().iter().filter(|d| matches(d.kind())).count()
}

#[test]
fn parse_golden() {
    for case in TestCase::list() {
        let tree = parse(&case.text, &ParserOptions::default());
        expect_file![&case.expected].assert_eq(&debug_tree(&tree));
    }
}

#[test]
fn golden_inputs_round_trip() {
    for case in TestCase::list() {
        let tree = parse(&case.text, &ParserOptions::default());
        assert_eq!(tree.content(), case.text, "{}", case.input.display());
        assert!(tree.is_well_formed(), "{}", case.input.display());
    }
}

#[rstest]
#[case::empty("")]
#[case::text("Hello world")]
#[case::tags("<div class=\"a\"><p>hi</p></div>")]
#[case::implicit("<p>@user.Name</p>")]
#[case::chain("@foo?.Bar()[0].Baz")]
#[case::explicit("<b>@(1 + 2)</b>")]
#[case::email("mail me at someone@example.com")]
#[case::escaped_transition("@@handle")]
#[case::code_block("@{ var x = 1; }\n<p>@x</p>")]
#[case::if_else("@if (x) {\n  <p>yes</p>\n} else {\n  <p>no</p>\n}\n")]
#[case::foreach("<ul>\n@foreach (var i in items) {\n  <li>@i</li>\n}\n</ul>")]
#[case::text_tag("@{ <text>plain</text> }")]
#[case::single_line_markup("@{\n  @:line @x\n}")]
#[case::template("@{ Func<int, object> t = @<b>@item</b>; }")]
#[case::comments("<!-- note --> @* razor *@ <![CDATA[x]]>")]
#[case::doctype("<!DOCTYPE html>\n<?xml version=\"1.0\"?>")]
#[case::bang_escape("<!p>not a tag</!p>")]
#[case::attributes("<input value=\"@x\" checked disabled='d' size=3 />")]
#[case::script("<script>if (a < b) { x(); }</script>")]
#[case::section("@section Scripts {\n<script></script>\n}")]
#[case::functions("@functions {\n  int Add(int a, int b) { return a + b; }\n}")]
#[case::inherits("@inherits Base<Model>\n")]
#[case::using("@using System.Text\n@using static System.Math")]
#[case::unterminated_block("@{ if (x) { ")]
#[case::unterminated_string("@{ var s = \"abc\n}")]
#[case::unterminated_tag("<p class=\"a")]
#[case::stray_end_tag("</p>text")]
#[case::crlf("line one\r\nline @two\r\n")]
#[case::unicode_newlines("a\u{2028}b\u{2029}@c")]
#[case::await_expression("@await Task.Delay(1)")]
#[case::try_catch("@try { x(); } catch (Exception e) when (e != null) { } finally { }")]
#[case::do_while("@do { i++; } while (i < 3);")]
#[case::switch("@switch (x) { case 1: <p>one</p> break; default: break; }")]
#[case::tag_helper_directives("@addTagHelper \"*, Lib\"\n@removeTagHelper *, Lib\n")]
fn round_trips_and_stays_well_formed(#[case] text: &str) {
    let tree = parse(text, &ParserOptions::default());
    assert_eq!(tree.content(), text);
    assert!(tree.is_well_formed());

    let design_time = parse(text, &ParserOptions::default().design_time(true));
    assert_eq!(design_time.content(), text);
}

#[rstest]
#[case("<p>@Model.Title</p>")]
#[case("@{ var a = 1; }\n<span>@a</span>")]
#[case("<a href=\"@url\">link</a> @* c *@")]
fn reparsing_unchanged_text_is_equivalent(#[case] text: &str) {
    let first = parse(text, &ParserOptions::default());
    let second = parse(text, &ParserOptions::default());
    assert!(first.root_block().equivalent_to(second.root_block()));
    assert_eq!(first.diagnostics(), second.diagnostics());
}

#[test]
fn matched_tags_report_nothing() {
    let tree = parse("<a><b></b></a>", &ParserOptions::default());
    assert!(tree.diagnostics().is_empty(), "{}", debug_tree(&tree));
}

#[test]
fn unclosed_inner_tag_reports_one_missing_end_tag() {
    let tree = parse("<a><b></a>", &ParserOptions::default());
    let diagnostics = tree.diagnostics();
    assert_eq!(diagnostics.len(), 1, "{}", debug_tree(&tree));
    assert_eq!(diagnostics[0].kind(), &ErrorKind::MissingEndTag("b".to_owned()));
}

#[test]
fn void_elements_need_no_end_tag() {
    let tree = parse("<p>a<br>b<img src=\"x\"></p>", &ParserOptions::default());
    assert!(tree.diagnostics().is_empty(), "{}", debug_tree(&tree));
}

#[rstest]
#[case::run_time(false, 4, "    @if (x) { }\n")]
#[case::design_time(true, 8, "@if (x) { }")]
fn indentation_and_line_break_around_a_code_line(
    #[case] design_time: bool,
    #[case] start: usize,
    #[case] expected: &str,
) {
    let text = "<p>\n    @if (x) { }\n</p>";
    let tree = parse(text, &ParserOptions::default().design_time(design_time));
    let statement = entered(&tree)
        .find(|node| node.as_block().is_some_and(|block| block.kind() == BlockKind::Statement))
        .unwrap();
    assert_eq!(statement.node().start_offset(), start);
    assert_eq!(statement.node().content(), expected);
    assert_eq!(tree.content(), text);
}

#[test]
fn implicit_expression_chain_is_one_expression() {
    let tree = parse("@foo.Bar()[0]", &ParserOptions::default());
    let expressions: Vec<_> = entered(&tree)
        .filter_map(|node| node.as_block())
        .filter(|block| block.kind() == BlockKind::Expression)
        .collect();
    assert_eq!(expressions.len(), 1, "{}", debug_tree(&tree));

    let contents: Vec<String> = expressions[0]
        .children()
        .iter()
        .map(SyntaxNode::content)
        .filter(|content| !content.is_empty())
        .collect();
    assert_eq!(contents, ["@", "foo.Bar()[0]"]);
}

#[test]
fn deleting_a_closing_paren_needs_a_full_reparse() {
    let tree = parse("<p>@foo(1, 2)</p>", &ParserOptions::default());
    let change = TextChange::delete(12, ")");
    let owner = tree.locate_owner(&change).unwrap();
    let span = owner.as_span().unwrap();
    assert_eq!(span.content(), "foo(1, 2)");

    let edit = span.edit_handler().apply_change(span, &change, false);
    assert!(!edit.result.is_accepted());
    assert!(edit.span.is_none());
}

#[test]
fn trailing_dot_is_left_to_markup() {
    let tree = parse("@foo.", &ParserOptions::default());
    let expression = entered(&tree)
        .filter_map(|node| node.as_block())
        .find(|block| block.kind() == BlockKind::Expression)
        .map(|block| SyntaxNode::from(block.clone()).content());
    assert_eq!(expression.as_deref(), Some("@foo"));
    assert_eq!(tree.content(), "@foo.");
}

#[test]
fn unterminated_comment_reports_once() {
    let text = "<p>@* never closed\n</p>";
    let tree = parse(text, &ParserOptions::default());
    assert_eq!(tree.content(), text);
    assert!(tree.is_well_formed());
    let unterminated = count_errors(&tree, |kind| *kind == ErrorKind::UnterminatedComment);
    assert_eq!(unterminated, 1, "{}", debug_tree(&tree));
}

#[test]
fn duplicate_singly_occurring_directive_reports_second() {
    let tree = parse("@inherits Foo\n@inherits Bar\n", &ParserOptions::default());
    let duplicates: Vec<_> = tree
        .diagnostics()
        .into_iter()
        .filter(|d| matches!(d.kind(), ErrorKind::DuplicateDirective(_)))
        .collect();
    assert_eq!(duplicates.len(), 1, "{}", debug_tree(&tree));
    assert_eq!(u32::from(duplicates[0].span().location.offset), 14);
    assert_eq!(duplicates[0].span().location.line, 1);
}

#[test]
fn repeated_unrestricted_directive_is_fine() {
    let text = "@section A {\n<p>a</p>\n}\n@section B {\n<p>b</p>\n}\n";
    let tree = parse(text, &ParserOptions::default());
    let duplicates = count_errors(&tree, |kind| matches!(kind, ErrorKind::DuplicateDirective(_)));
    assert_eq!(duplicates, 0, "{}", debug_tree(&tree));
}

#[test]
fn directive_not_at_start_of_line() {
    let tree = parse("text @inherits Foo\n", &ParserOptions::default());
    let misplaced = count_errors(&tree, |kind| {
        matches!(kind, ErrorKind::DirectiveMustAppearAtStartOfLine(_))
    });
    assert_eq!(misplaced, 1, "{}", debug_tree(&tree));
}

#[test]
fn custom_directive_is_recognised() {
    let options = ParserOptions::default().with_directive(
        DirectiveDescriptor::new("model", DirectiveKind::SingleLine)
            .token(DirectiveTokenKind::Type),
    );
    let tree = parse("@model Person\n<p>@Model.Name</p>", &options);
    let directives = entered(&tree)
        .filter_map(|node| node.as_block())
        .filter(|block| block.kind() == BlockKind::Directive)
        .count();
    assert_eq!(directives, 1, "{}", debug_tree(&tree));
    assert!(tree.diagnostics().is_empty(), "{}", debug_tree(&tree));
}

#[test]
fn unbalanced_code_block_reports_missing_brace() {
    let tree = parse("@{ if (x) { ", &ParserOptions::default());
    let missing = count_errors(&tree, |kind| {
        matches!(kind, ErrorKind::ExpectedEndOfBlockBeforeEof { .. })
    });
    assert!(missing >= 1, "{}", debug_tree(&tree));
}

#[test]
fn nested_sections_are_reported() {
    let text = "@section A {\n@section B {\n}\n}";
    let tree = parse(text, &ParserOptions::default());
    assert_eq!(tree.content(), text);
    assert_eq!(count_errors(&tree, |kind| *kind == ErrorKind::SectionsCannotBeNested), 1);
}

#[test]
fn cancelled_parse_yields_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let source = SeekableSource::new("<p>@x</p>");
    assert!(parse_source(source, ParserOptions::default(), Some(cancel)).is_none());

    let source = SeekableSource::new("<p>@x</p>");
    let tree = parse_source(source, ParserOptions::default(), Some(CancellationToken::new()));
    assert_eq!(tree.map(|tree| tree.content()).as_deref(), Some("<p>@x</p>"));
}

fn card() -> TagDescriptor {
    TagDescriptor::new("CardTagHelper")
        .rule(TagMatchingRule::new("card"))
        .attribute(BoundAttribute::new("title", "string"))
        .attribute(BoundAttribute::new("count", "int"))
}

fn tags(tree: &SyntaxTree) -> Vec<(String, TagMode)> {
    entered(tree)
        .filter_map(|node| node.as_tag())
        .map(|tag| (tag.tag_name().to_owned(), tag.tag_mode()))
        .collect()
}

#[test]
fn bound_tag_becomes_tag_block() {
    let text = "<div><card title=\"Hi\" count=\"@n\">body</card></div>";
    let tree = parse_and_bind(text, &ParserOptions::default(), [card()], None);
    assert_eq!(tags(&tree), [("card".to_owned(), TagMode::StartTagAndEndTag)]);
    assert!(tree.diagnostics().is_empty(), "{}", debug_tree(&tree));
    assert_eq!(tree.content(), text);

    let tag = entered(&tree).find_map(|node| node.as_tag()).cloned();
    let Some(tag) = tag else { panic!("no tag block") };
    let attributes: Vec<_> = tag.attributes().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(attributes, ["title", "count"]);
    let kinds: Vec<_> = tag
        .attributes()
        .iter()
        .filter_map(|a| a.value.as_ref()?.as_block().map(|block| block.kind()))
        .collect();
    assert_eq!(kinds, [BlockKind::Markup, BlockKind::Expression]);
}

#[test]
fn unbound_tags_are_untouched() {
    let text = "<p>plain</p>";
    let parsed = parse(text, &ParserOptions::default());
    let rewritten = rewrite(&parsed, &TagBinder::new([card()]), None);
    assert!(parsed.root_block().equivalent_to(rewritten.root_block()));
}

#[test]
fn self_closing_and_start_tag_only() {
    let input = TagDescriptor::new("InputTagHelper")
        .rule(TagMatchingRule::new("field").with_structure(TagStructure::WithoutEndTag));
    let tree = parse_and_bind("<card /><field>", &ParserOptions::default(), [card(), input], None);
    assert_eq!(
        tags(&tree),
        [("card".to_owned(), TagMode::SelfClosing), ("field".to_owned(), TagMode::StartTagOnly)]
    );
}

#[test]
fn end_tag_for_start_tag_only_helper() {
    let input = TagDescriptor::new("InputTagHelper")
        .rule(TagMatchingRule::new("field").with_structure(TagStructure::WithoutEndTag));
    let tree = parse_and_bind("<field></field>", &ParserOptions::default(), [input], None);
    let forbidden = count_errors(&tree, |kind| {
        matches!(kind, ErrorKind::TagHelperMustNotHaveAnEndTag { .. })
    });
    assert_eq!(forbidden, 1, "{}", debug_tree(&tree));
}

#[test]
fn conflicting_structures_are_reported() {
    let open = TagDescriptor::new("A")
        .rule(TagMatchingRule::new("thing").with_structure(TagStructure::WithoutEndTag));
    let closed = TagDescriptor::new("B")
        .rule(TagMatchingRule::new("thing").with_structure(TagStructure::NormalOrSelfClosing));
    let tree = parse_and_bind("<thing>", &ParserOptions::default(), [open, closed], None);
    let inconsistent = count_errors(&tree, |kind| {
        matches!(kind, ErrorKind::InconsistentTagStructure { .. })
    });
    assert_eq!(inconsistent, 1, "{}", debug_tree(&tree));
}

#[test]
fn unclosed_bound_tag_is_malformed() {
    let tree = parse_and_bind("<div><card>text</div>", &ParserOptions::default(), [card()], None);
    let malformed =
        count_errors(&tree, |kind| *kind == ErrorKind::MalformedTagHelper("card".to_owned()));
    assert_eq!(malformed, 1, "{}", debug_tree(&tree));
    assert_eq!(tree.content(), "<div><card>text</div>");
}

#[test]
fn allowed_children_are_enforced() {
    let list =
        TagDescriptor::new("ListTagHelper").rule(TagMatchingRule::new("list")).allow_child("item");
    let text = "<list><item></item><p></p>stray</list>";
    let tree = parse_and_bind(text, &ParserOptions::default(), [list], None);

    let nested = count_errors(&tree, |kind| matches!(kind, ErrorKind::InvalidNestedTag { .. }));
    assert_eq!(nested, 1, "{}", debug_tree(&tree));
    let content = count_errors(&tree, |kind| {
        matches!(kind, ErrorKind::CannotHaveNonTagContent { .. })
    });
    assert_eq!(content, 1, "{}", debug_tree(&tree));
}

#[test]
fn empty_non_string_attribute_is_reported() {
    let text = "<card count=\"\"></card>";
    let tree = parse_and_bind(text, &ParserOptions::default(), [card()], None);
    let empty = count_errors(&tree, |kind| matches!(kind, ErrorKind::EmptyBoundAttribute { .. }));
    assert_eq!(empty, 1, "{}", debug_tree(&tree));
}

#[test]
fn escaped_tags_are_never_bound() {
    let tree = parse_and_bind("<!card></!card>", &ParserOptions::default(), [card()], None);
    assert!(tags(&tree).is_empty());
}

#[test]
fn document_prefix_selects_bound_tags() {
    let text = "@tagHelperPrefix \"x-\"\n<x-card></x-card><card></card>";
    let tree = parse(text, &ParserOptions::default());
    assert_eq!(tag_helper_prefix(&tree).as_deref(), Some("x-"));

    let tree = parse_and_bind(text, &ParserOptions::default(), [card()], None);
    assert_eq!(tags(&tree), [("x-card".to_owned(), TagMode::StartTagAndEndTag)]);
}

#[test]
fn binder_prefix_is_case_insensitive() {
    let binder = TagBinder::new([card()]).with_prefix(Some("x-".to_owned()));
    let tree = rewrite(&parse("<X-Card></X-Card>", &ParserOptions::default()), &binder, None);
    assert_eq!(tags(&tree).len(), 1);
}
