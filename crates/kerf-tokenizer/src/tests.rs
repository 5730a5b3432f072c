use expect_test::{Expect, expect};
use kerf_errors::{ErrorKind, SourceLocation};
use rstest::rstest;

use crate::SyntaxKind::*;
use crate::{
    CodeTokenizer, Keyword, Language, MarkupTokenizer, SeekableSource, SyntaxKind, Tokenize,
    tokenize, tokenize_text,
};

fn dump(language: Language, text: &str) -> String {
    tokenize_text(language, text, SourceLocation::ZERO)
        .iter()
        .map(|token| token.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn check(language: Language, text: &str, expect: Expect) {
    expect.assert_eq(&dump(language, text));
}

fn kinds(language: Language, text: &str) -> Vec<SyntaxKind> {
    tokenize_text(language, text, SourceLocation::ZERO).iter().map(|token| token.kind).collect()
}

#[test]
fn markup_tag_with_attribute() {
    check(
        Language::Markup,
        r#"<p class="x">Hi @name!</p>"#,
        expect![[r#"
            OPEN_ANGLE@0 "<"
            TEXT@1 "p"
            WHITESPACE@2 " "
            TEXT@3 "class"
            EQUALS@8 "="
            DOUBLE_QUOTE@9 "\""
            TEXT@10 "x"
            DOUBLE_QUOTE@11 "\""
            CLOSE_ANGLE@12 ">"
            TEXT@13 "Hi"
            WHITESPACE@15 " "
            TRANSITION@16 "@"
            TEXT@17 "name"
            BANG@21 "!"
            OPEN_ANGLE@22 "<"
            FORWARD_SLASH@23 "/"
            TEXT@24 "p"
            CLOSE_ANGLE@25 ">""#]],
    );
}

#[test]
fn markup_email_escape_and_comments() {
    check(
        Language::Markup,
        "a@b.c @@ @* hi *@<!-- x -->",
        expect![[r#"
            TEXT@0 "a@b.c"
            WHITESPACE@5 " "
            TRANSITION@6 "@"
            TRANSITION@7 "@"
            WHITESPACE@8 " "
            RAZOR_COMMENT_TRANSITION@9 "@"
            RAZOR_COMMENT_STAR@10 "*"
            RAZOR_COMMENT_LITERAL@11 " hi "
            RAZOR_COMMENT_STAR@15 "*"
            RAZOR_COMMENT_TRANSITION@16 "@"
            OPEN_ANGLE@17 "<"
            BANG@18 "!"
            DOUBLE_HYPHEN@19 "--"
            WHITESPACE@21 " "
            TEXT@22 "x"
            WHITESPACE@23 " "
            DOUBLE_HYPHEN@24 "--"
            CLOSE_ANGLE@26 ">""#]],
    );
}

#[test]
fn code_statement() {
    check(
        Language::Code,
        r#"if (x.Length >= 10) { var s = @"a""b"; } // done"#,
        expect![[r#"
            KEYWORD@0 "if"
            WHITESPACE@2 " "
            LEFT_PAREN@3 "("
            IDENTIFIER@4 "x"
            DOT@5 "."
            IDENTIFIER@6 "Length"
            WHITESPACE@12 " "
            GREATER_THAN_EQUALS@13 ">="
            WHITESPACE@15 " "
            INTEGER_LITERAL@16 "10"
            RIGHT_PAREN@18 ")"
            WHITESPACE@19 " "
            LEFT_BRACE@20 "{"
            WHITESPACE@21 " "
            IDENTIFIER@22 "var"
            WHITESPACE@25 " "
            IDENTIFIER@26 "s"
            WHITESPACE@27 " "
            EQUALS@28 "="
            WHITESPACE@29 " "
            STRING_LITERAL@30 "@\"a\"\"b\""
            SEMICOLON@37 ";"
            WHITESPACE@38 " "
            RIGHT_BRACE@39 "}"
            WHITESPACE@40 " "
            COMMENT@41 "// done""#]],
    );
}

#[rstest]
#[case("0x1F", INTEGER_LITERAL)]
#[case("10UL", INTEGER_LITERAL)]
#[case("42", INTEGER_LITERAL)]
#[case("1.5e-3", REAL_LITERAL)]
#[case(".5f", REAL_LITERAL)]
#[case("3d", REAL_LITERAL)]
#[case("2E10", REAL_LITERAL)]
fn numeric_literals(#[case] text: &str, #[case] kind: SyntaxKind) {
    let tokens = tokenize_text(Language::Code, text, SourceLocation::ZERO);
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, kind);
    assert_eq!(tokens[0].content, text);
}

#[rstest]
#[case("??", NULL_COALESCE)]
#[case("=>", ARROW)]
#[case("->", ARROW)]
#[case("<<=", LEFT_SHIFT_ASSIGN)]
#[case("::", DOUBLE_COLON)]
#[case("!=", NOT_EQUALS)]
#[case("|=", OR_ASSIGN)]
#[case("--", DECREMENT)]
fn multi_character_operators(#[case] text: &str, #[case] kind: SyntaxKind) {
    assert_eq!(kinds(Language::Code, text), vec![kind]);
}

#[test]
fn keywords_are_tagged() {
    let tokens = tokenize_text(Language::Code, "foreach await When", SourceLocation::ZERO);
    assert_eq!(tokens[0].keyword, Some(Keyword::Foreach));
    assert_eq!(tokens[2].keyword, Some(Keyword::Await));
    assert_eq!(tokens[4].kind, IDENTIFIER);
    assert_eq!(tokens[4].keyword, None);
}

#[test]
fn unterminated_string_stops_at_line_end() {
    let tokens = tokenize_text(Language::Code, "\"abc\nx", SourceLocation::ZERO);
    assert_eq!(tokens[0].kind, STRING_LITERAL);
    assert_eq!(tokens[0].content, "\"abc");
    assert_eq!(tokens[0].diagnostics.len(), 1);
    assert_eq!(tokens[0].diagnostics[0].kind(), &ErrorKind::UnterminatedString);
    assert_eq!(tokens[1].kind, NEW_LINE);
}

#[test]
fn escaped_quote_does_not_terminate() {
    let tokens = tokenize_text(Language::Code, r#""a\"b" 'c'"#, SourceLocation::ZERO);
    assert_eq!(tokens[0].content, r#""a\"b""#);
    assert!(tokens[0].diagnostics.is_empty());
    assert_eq!(tokens[2].kind, CHARACTER_LITERAL);
}

#[test]
fn unterminated_block_comment() {
    let tokens = tokenize_text(Language::Code, "x /* never", SourceLocation::ZERO);
    let comment = &tokens[2];
    assert_eq!(comment.kind, COMMENT);
    assert_eq!(comment.content, "/* never");
    assert_eq!(comment.diagnostics[0].kind(), &ErrorKind::UnterminatedBlockComment);
}

#[rstest]
#[case(Language::Markup, "@* abc", " abc")]
#[case(Language::Code, "@* abc", " abc")]
#[case(Language::Markup, "@*", "")]
fn unterminated_template_comment(
    #[case] language: Language,
    #[case] text: &str,
    #[case] literal: &str,
) {
    let tokens = tokenize_text(language, text, SourceLocation::ZERO);
    assert_eq!(
        tokens.iter().map(|token| token.kind).collect::<Vec<_>>(),
        vec![RAZOR_COMMENT_TRANSITION, RAZOR_COMMENT_STAR, RAZOR_COMMENT_LITERAL]
    );
    assert_eq!(tokens[2].content, literal);
    let diagnostics = tokens.iter().flat_map(|token| &token.diagnostics).collect::<Vec<_>>();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind(), &ErrorKind::UnterminatedComment);
}

#[test]
fn empty_comment_has_no_literal() {
    assert_eq!(
        kinds(Language::Code, "@**@"),
        vec![
            RAZOR_COMMENT_TRANSITION,
            RAZOR_COMMENT_STAR,
            RAZOR_COMMENT_STAR,
            RAZOR_COMMENT_TRANSITION
        ]
    );
}

#[test]
fn crlf_is_one_newline() {
    assert_eq!(kinds(Language::Markup, "a\r\n\rb"), vec![TEXT, NEW_LINE, NEW_LINE, TEXT]);
}

#[rstest]
#[case(Language::Markup, "<div class='a' data-x=\"@(1 + 2)\">\r\n  text -- @* c *@ </div>")]
#[case(Language::Code, "foreach (var i in items) { <p>@i</p> } /* x */ 'q' $\"{a}\" ~#")]
#[case(Language::Markup, "unicode ünï @ 日本語 \u{2028} done")]
fn tokens_cover_the_input(#[case] language: Language, #[case] text: &str) {
    let tokens = tokenize_text(language, text, SourceLocation::ZERO);
    let joined = tokens.iter().map(|token| token.content.as_str()).collect::<String>();
    assert_eq!(joined, text);

    let mut location = SourceLocation::ZERO;
    for token in &tokens {
        assert_eq!(token.location, location, "{token}");
        location = token.end();
    }
}

#[test]
fn reset_after_seek_restarts_in_data_state() {
    let mut source = SeekableSource::new("@* a *@x");
    let mut tokenizer = MarkupTokenizer::default();
    tokenizer.next_token(&mut source);
    tokenizer.next_token(&mut source);
    source.seek(7);
    tokenizer.reset();
    let token = tokenizer.next_token(&mut source).unwrap();
    assert_eq!(token.kind, TEXT);
    assert_eq!(token.content, "x");
}

#[test]
fn tokenize_whole_source() {
    let tokens = tokenize::<CodeTokenizer>(SeekableSource::new("a.b"));
    assert_eq!(tokens.len(), 3);
}
