use kerf_errors::{ErrorKind, SourceLocation};
use kerf_syntax::{
    AcceptedCharacters, Block, BlockChunkGenerator, BlockKind, EditHandler, LocationTagged,
    SpanChunkGenerator, SpanKind, SyntaxNode,
};
use kerf_tokenizer::SyntaxKind::*;
use kerf_tokenizer::{Language, SyntaxKind, SyntaxSet, Token};

use super::code::{self, resume_after_other_parser};
use crate::parser::{BlockMarker, CodeParser, MarkupParser, SpanConfig, offset};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

const SPACING: SyntaxSet = SyntaxSet::new([WHITESPACE, NEW_LINE]);

const TAG_RECOVERY_STOP: SyntaxSet =
    SyntaxSet::new([CLOSE_ANGLE, FORWARD_SLASH, OPEN_ANGLE, SINGLE_QUOTE, DOUBLE_QUOTE]);

const UNQUOTED_VALUE_END: SyntaxSet = SyntaxSet::new([
    DOUBLE_QUOTE,
    SINGLE_QUOTE,
    OPEN_ANGLE,
    EQUALS,
    CLOSE_ANGLE,
    WHITESPACE,
    NEW_LINE,
]);

const NOT_ATTRIBUTE_NAME: SyntaxSet = SyntaxSet::new([
    WHITESPACE,
    NEW_LINE,
    CLOSE_ANGLE,
    OPEN_ANGLE,
    FORWARD_SLASH,
    DOUBLE_QUOTE,
    SINGLE_QUOTE,
    EQUALS,
    UNKNOWN,
]);

/// A start tag still waiting for its end tag.
struct OpenTag {
    name: String,
    /// Location of the `<`.
    start: SourceLocation,
}

fn markup_config() -> SpanConfig {
    SpanConfig {
        generator: SpanChunkGenerator::Markup,
        edit_handler: EditHandler::new(Language::Markup, AcceptedCharacters::ANY),
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(name))
}

fn is_hyphen(token: &Token) -> bool {
    token.is(TEXT) && token.content == "-"
}

fn concat(tokens: &[Token]) -> String {
    tokens.iter().map(|token| token.content.as_str()).collect()
}

/// Parses the whole document as top-level markup.
pub(crate) fn parse_document(p: &mut MarkupParser<'_>) {
    p.with_span_config(markup_config(), |p| {
        let block = p.start_block(BlockKind::Markup);
        let start = p.current_location();
        p.span.set_start(start);

        let mut tags = Vec::new();
        p.next_token();
        while p.ensure_current() {
            skip_to_and_parse_code(p, |p| p.at(OPEN_ANGLE));
            scan_tag_in_document_context(p, &mut tags);
        }
        report_unclosed(p, &mut tags);

        p.add_marker_if_necessary();
        p.output(SpanKind::Markup);
        block.complete(p);
    });
}

/// Parses markup embedded in code: a tag with its content, `@:` to the end
/// of the line, or `@<tag>`.
pub(crate) fn parse_block(p: &mut MarkupParser<'_>) {
    p.with_span_config(markup_config(), |p| {
        let block = p.start_block(BlockKind::Markup);
        let start = p.current_location();
        p.span.set_start(start);

        if p.next_token() {
            p.accept_while_in(SPACING);
            if p.at(OPEN_ANGLE) {
                tag_block(p, &mut Vec::new());
            } else if p.at(TRANSITION) {
                p.output(SpanKind::Markup);
                p.accept_and_move_next();
                p.set_generator(SpanChunkGenerator::Null);
                p.output_with(SpanKind::Transition, AcceptedCharacters::NONE);
                if p.at(TRANSITION) {
                    p.set_generator(SpanChunkGenerator::Null);
                    p.accept_and_move_next();
                    p.output(SpanKind::MetaCode);
                }
                after_transition(p);
            } else {
                p.error(ErrorKind::MarkupBlockMustStartWithTag, p.current_start(), p.current_len());
            }
            p.put_current_back();
            p.output(SpanKind::Markup);
        }
        block.complete(p);
    });
}

/// Parses a section body up to its balancing `close`, leaving the source at it.
pub(crate) fn parse_razor_block(p: &mut MarkupParser<'_>, open: &str, close: &str) {
    p.with_span_config(markup_config(), |p| {
        let start = p.current_location();
        p.span.set_start(start);
        let block = p.start_block(BlockKind::Markup);
        p.next_token();

        let mut tags = Vec::new();
        nesting_section(p, open, close, &mut tags);
        report_unclosed(p, &mut tags);

        p.add_marker_if_necessary();
        p.output(SpanKind::Markup);
        block.complete(p);
    });
}

fn after_transition(p: &mut MarkupParser<'_>) {
    if p.at(COLON) {
        p.accept_and_move_next();
        p.set_generator(SpanChunkGenerator::Null);
        p.output(SpanKind::MetaCode);
        single_line_markup(p);
    } else if p.at(OPEN_ANGLE) {
        tag_block(p, &mut Vec::new());
    }
}

fn single_line_markup(p: &mut MarkupParser<'_>) {
    let significant = p.ctx.whitespace_is_significant_to_ancestor;
    p.ctx.whitespace_is_significant_to_ancestor = true;
    p.span.edit_handler = EditHandler::new(Language::Markup, AcceptedCharacters::ANY);

    skip_to_and_parse_code(p, |p| p.at(NEW_LINE));
    if p.at(NEW_LINE) {
        p.accept_and_move_next();
        p.set_accepted(AcceptedCharacters::NONE);
    }
    p.put_current_back();

    p.ctx.whitespace_is_significant_to_ancestor = significant;
    p.output(SpanKind::Markup);
}

/// Accepts markup until `stop` holds, handing every `@` to the code parser.
fn skip_to_and_parse_code(
    p: &mut MarkupParser<'_>,
    mut stop: impl FnMut(&mut MarkupParser<'_>) -> bool,
) {
    let mut last: Option<Token> = None;
    let mut start_of_line = false;
    while p.ensure_current() && !stop(p) {
        if p.ctx.null_generate_whitespace_and_newline {
            p.ctx.null_generate_whitespace_and_newline = false;
            p.set_generator(SpanChunkGenerator::Null);
            p.accept_while_in(SyntaxSet::new([WHITESPACE]));
            if p.at(NEW_LINE) {
                p.accept_and_move_next();
            }
            p.output(SpanKind::Markup);
        } else if p.at(NEW_LINE) {
            if let Some(token) = last.take() {
                p.accept(token);
            }
            start_of_line = true;
            p.accept_and_move_next();
        } else if p.at(TRANSITION) {
            let Some(transition) = p.take_current() else {
                break;
            };
            p.next_token();
            if p.at(TRANSITION) {
                // `@@` is a literal `@`.
                if let Some(token) = last.take() {
                    p.accept(token);
                }
                p.output(SpanKind::Markup);
                p.accept(transition);
                p.set_generator(SpanChunkGenerator::Null);
                p.output(SpanKind::Markup);
                p.accept_and_move_next();
                continue;
            }

            p.put_current_back();
            p.put_back(&transition);
            if let Some(token) = last.take() {
                // Indentation before a code line belongs to the code at run time.
                if !p.ctx.design_time() && token.is(WHITESPACE) && start_of_line {
                    start_of_line = false;
                    p.put_back(&token);
                } else {
                    p.accept(token);
                }
            }
            other_parser_block(p);
        } else if p.at(RAZOR_COMMENT_TRANSITION) {
            if let Some(token) = last.take() {
                if start_of_line && token.is(WHITESPACE) {
                    p.add_marker_if_necessary();
                    p.output(SpanKind::Markup);
                    p.set_generator(SpanChunkGenerator::Null);
                }
                p.accept(token);
            }
            p.add_marker_if_necessary();
            p.output(SpanKind::Markup);
            p.razor_comment();

            // A comment alone on its line takes the line break with it.
            if start_of_line && (p.at(NEW_LINE) || (p.at(WHITESPACE) && p.next_is(NEW_LINE))) {
                p.accept_while_in(SyntaxSet::new([WHITESPACE]));
                p.accept_and_move_next();
                p.set_generator(SpanChunkGenerator::Null);
                p.output(SpanKind::Markup);
            }
        } else {
            start_of_line &= p.at(WHITESPACE);
            if let Some(token) = last.take() {
                p.accept(token);
            }
            last = p.take_current();
            p.next_token();
        }
    }
    if let Some(token) = last {
        p.accept(token);
    }
}

/// Hands the source to a fresh code parser and resumes after what it consumed.
fn other_parser_block(p: &mut MarkupParser<'_>) {
    p.add_marker_if_necessary();
    p.output(SpanKind::Markup);
    {
        let mut code = CodeParser::new(&mut *p.ctx);
        code::parse_block(&mut code);
    }
    resume_after_other_parser(p);
}

fn accept_open_angle(p: &mut MarkupParser<'_>) {
    if let Some(token) = p.buffered_open_angle.take() {
        p.accept(token);
    }
}

fn is_bang_escape(p: &mut MarkupParser<'_>, lookahead: usize) -> bool {
    let bang = p.lookahead(lookahead);
    if !bang.is_some_and(|token| token.is(BANG)) {
        return false;
    }
    p.lookahead(lookahead + 1)
        .is_some_and(|token| token.is(TEXT) && !token.content.eq_ignore_ascii_case("DOCTYPE"))
}

/// `<!p>` opts a tag out of tag binding; the `!` is metacode.
fn optional_bang_escape(p: &mut MarkupParser<'_>) {
    if is_bang_escape(p, 0) {
        p.output(SpanKind::Markup);
        p.accept_and_move_next();
        p.set_generator(SpanChunkGenerator::Null);
        p.output_with(SpanKind::MetaCode, AcceptedCharacters::NONE);
    }
}

/// `<!--`, `<![CDATA[`, `<!DOCTYPE` and `<?...?>` are not element tags.
fn at_special_tag(p: &mut MarkupParser<'_>) -> bool {
    if !p.at(OPEN_ANGLE) {
        return false;
    }
    if p.next_is(BANG) {
        return !is_bang_escape(p, 1);
    }
    p.next_is(QUESTION_MARK)
}

fn complete_tag_block_with_span(
    p: &mut MarkupParser<'_>,
    wrapper: &mut Option<BlockMarker>,
    accepted: AcceptedCharacters,
    kind: SpanKind,
) {
    p.set_accepted(accepted);
    p.output(kind);
    if let Some(marker) = wrapper.take() {
        marker.complete(p);
    }
}

/// Markup starting at `<` inside code; ends once every opened tag is closed.
fn tag_block(p: &mut MarkupParser<'_>, tags: &mut Vec<OpenTag>) {
    let mut complete = false;
    loop {
        skip_to_and_parse_code(p, |p| p.at(OPEN_ANGLE));
        p.output(SpanKind::Markup);

        let at_special = at_special_tag(p);
        let mut wrapper = None;
        if !p.is_eof() && !at_special {
            wrapper = Some(p.start_block(BlockKind::Tag));
        }

        if p.is_eof() {
            end_tag_block(p, tags, true);
        } else {
            p.last_tag_start = p.current_start();
            p.buffered_open_angle = p.take_current();
            if p.next_token() {
                complete = after_tag_start(p, tags, at_special, &mut wrapper);
            } else {
                accept_open_angle(p);
                end_tag_block(p, tags, false);
            }
        }

        if complete {
            p.set_accepted(AcceptedCharacters::NONE);
        }
        p.output(SpanKind::Markup);
        if let Some(marker) = wrapper.take() {
            marker.complete(p);
        }
        if tags.is_empty() {
            break;
        }
    }
    end_tag_block(p, tags, complete);
}

fn after_tag_start(
    p: &mut MarkupParser<'_>,
    tags: &mut Vec<OpenTag>,
    at_special: bool,
    wrapper: &mut Option<BlockMarker>,
) -> bool {
    match p.current_kind() {
        Some(FORWARD_SLASH) => end_tag(p, tags, wrapper),
        Some(BANG) if at_special => {
            accept_open_angle(p);
            bang_tag(p)
        }
        Some(QUESTION_MARK) => {
            accept_open_angle(p);
            xml_processing_instruction(p)
        }
        Some(_) => start_tag(p, tags, wrapper),
        None => {
            if tags.is_empty() {
                p.error(ErrorKind::OuterTagMissingName, p.last_tag_start, 1);
            }
            false
        }
    }
}

fn xml_processing_instruction(p: &mut MarkupParser<'_>) -> bool {
    p.accept_and_move_next();
    accept_until_all(p, &[QUESTION_MARK, CLOSE_ANGLE])
}

/// Accepts tokens until `sequence` has been accepted in full.
fn accept_until_all(p: &mut MarkupParser<'_>, sequence: &[SyntaxKind]) -> bool {
    let Some(&first) = sequence.first() else {
        return true;
    };
    while p.ensure_current() {
        skip_to_and_parse_code(p, |p| p.at(first));
        if accept_all(p, sequence) {
            return true;
        }
    }
    p.set_accepted(AcceptedCharacters::ANY);
    false
}

/// Accepts one token per kind while they match; stops at the first mismatch.
fn accept_all(p: &mut MarkupParser<'_>, kinds: &[SyntaxKind]) -> bool {
    for &kind in kinds {
        if !p.at(kind) {
            return false;
        }
        p.accept_and_move_next();
    }
    true
}

/// The part after `<!`: a comment, a CDATA section or a declaration.
fn bang_tag(p: &mut MarkupParser<'_>) -> bool {
    if !p.accept_and_move_next() {
        return false;
    }

    if is_html_comment_ahead(p) {
        let block = p.start_block(BlockKind::HtmlComment);
        p.accept_and_move_next();
        p.output_with(SpanKind::Markup, AcceptedCharacters::NONE);
        p.set_accepted(AcceptedCharacters::WHITE_SPACE);
        while p.ensure_current() {
            skip_to_and_parse_code(p, |p| p.at(DOUBLE_HYPHEN));
            let last = accept_all_but_last_double_hyphens(p);
            if p.at(CLOSE_ANGLE) {
                p.output_with(SpanKind::Markup, AcceptedCharacters::WHITE_SPACE);
                if let Some(token) = last {
                    p.accept(token);
                }
                p.accept_and_move_next();
                p.output_with(SpanKind::Markup, AcceptedCharacters::NONE);
                block.complete(p);
                return true;
            }
            if let Some(token) = last {
                p.accept(token);
            }
        }
        block.complete(p);
        return false;
    }

    if p.at(LEFT_BRACKET) {
        return p.accept_and_move_next() && cdata(p);
    }
    p.accept_and_move_next();
    accept_until_all(p, &[CLOSE_ANGLE])
}

fn cdata(p: &mut MarkupParser<'_>) -> bool {
    let keyword = p.current().is_some_and(|token| {
        token.is(TEXT) && token.content.eq_ignore_ascii_case("cdata")
    });
    if keyword && p.accept_and_move_next() && p.at(LEFT_BRACKET) {
        return accept_until_all(p, &[RIGHT_BRACKET, RIGHT_BRACKET, CLOSE_ANGLE]);
    }
    false
}

/// Accepts a run of `--` tokens except the last, which is returned so it can
/// open the closing `-->` span.
fn accept_all_but_last_double_hyphens(p: &mut MarkupParser<'_>) -> Option<Token> {
    loop {
        let current = p.take_current()?;
        p.next_token();
        if p.at(DOUBLE_HYPHEN) {
            p.accept(current);
            continue;
        }

        if !p.current().is_some_and(is_hyphen) {
            return Some(current);
        }
        if !p.next_is(CLOSE_ANGLE) {
            p.accept(current);
            p.accept_and_move_next();
            return None;
        }
        // `--->`: the comment text ends with a hyphen and `-->` closes it.
        let (head, _) = current.split(1, TEXT, DOUBLE_HYPHEN);
        let closing = Token::new(DOUBLE_HYPHEN, "--", head.end());
        p.accept(head);
        p.take_current();
        p.next_token();
        return Some(closing);
    }
}

/// True when the `--` after `<!` starts a comment the HTML syntax accepts.
fn is_html_comment_ahead(p: &mut MarkupParser<'_>) -> bool {
    if !p.at(DOUBLE_HYPHEN) {
        return false;
    }
    let tokens = p.scan_ahead(comment_scan_finished);
    html_comment_is_valid(&tokens)
}

fn comment_scan_finished(seen: &[Token]) -> bool {
    match seen {
        [.., dash, close] if dash.is(DOUBLE_HYPHEN) && close.is(CLOSE_ANGLE) => true,
        [.., dash, middle, close]
            if dash.is(DOUBLE_HYPHEN)
                && (middle.is(BANG) || is_hyphen(middle))
                && close.is(CLOSE_ANGLE) =>
        {
            true
        }
        [_, .., open, bang, dash]
            if open.is(OPEN_ANGLE) && bang.is(BANG) && dash.is(DOUBLE_HYPHEN) =>
        {
            true
        }
        _ => false,
    }
}

/// The comment text must not start with `>` or `->`, contain `<!--` or
/// `--!>`, or end with `<!-`.
fn html_comment_is_valid(tokens: &[Token]) -> bool {
    let at = |i: usize, kind: SyntaxKind| tokens.get(i).is_some_and(|token| token.is(kind));
    let hyphen = |i: usize| tokens.get(i).is_some_and(is_hyphen);

    if at(1, CLOSE_ANGLE) || (hyphen(1) && at(2, CLOSE_ANGLE)) {
        return false;
    }
    for i in 1..tokens.len() {
        if at(i, DOUBLE_HYPHEN) {
            if at(i + 1, CLOSE_ANGLE) {
                let text = &tokens[1..i];
                return !matches!(text, [.., open, bang, dash]
                    if open.is(OPEN_ANGLE) && bang.is(BANG) && is_hyphen(dash));
            }
            if hyphen(i + 1) && at(i + 2, CLOSE_ANGLE) {
                return true;
            }
            if at(i + 1, BANG) && at(i + 2, CLOSE_ANGLE) {
                return false;
            }
        } else if at(i, OPEN_ANGLE) && at(i + 1, BANG) && at(i + 2, DOUBLE_HYPHEN) {
            return false;
        }
    }
    false
}

fn end_tag(
    p: &mut MarkupParser<'_>,
    tags: &mut Vec<OpenTag>,
    wrapper: &mut Option<BlockMarker>,
) -> bool {
    let tag_start = p.last_tag_start;
    let Some(slash) = p.take_current() else {
        return false;
    };
    if !p.next_token() {
        accept_open_angle(p);
        p.accept(slash);
        return false;
    }

    let mut name = String::new();
    if p.at(BANG) {
        if let Some(next) = p.lookahead(1) {
            if next.is(TEXT) {
                name = format!("!{}", next.content);
            }
        }
    } else if p.at(TEXT) {
        name = p.current_content();
    }

    let matched = remove_tag(p, tags, &name, tag_start);
    if tags.is_empty() && matched && name.eq_ignore_ascii_case("text") {
        return end_text_tag(p, slash, wrapper);
    }

    accept_open_angle(p);
    p.accept(slash);
    optional_bang_escape(p);
    p.accept_until(SyntaxSet::new([CLOSE_ANGLE]));
    p.optional(CLOSE_ANGLE)
}

/// `</text>` closing an outermost `<text>` is a transition, not markup.
fn end_text_tag(p: &mut MarkupParser<'_>, slash: Token, wrapper: &mut Option<BlockMarker>) -> bool {
    accept_open_angle(p);
    p.accept(slash);
    let text_location = p.current_start();
    p.accept_and_move_next();

    let seen_close = p.optional(CLOSE_ANGLE);
    if seen_close {
        p.set_accepted(AcceptedCharacters::NONE);
    } else {
        p.error(ErrorKind::TextTagCannotContainAttributes, text_location, 4);
        p.set_accepted(AcceptedCharacters::ANY);
        recover_text_tag(p);
    }
    p.set_generator(SpanChunkGenerator::Null);
    let accepted = p.span.edit_handler.accepted;
    complete_tag_block_with_span(p, wrapper, accepted, SpanKind::Transition);
    seen_close
}

fn recover_text_tag(p: &mut MarkupParser<'_>) {
    p.accept_until(SyntaxSet::new([CLOSE_ANGLE, NEW_LINE]));
    p.optional(CLOSE_ANGLE);
}

/// Pops open tags down to the one named `name`, reporting each tag it skips.
///
/// Returns whether a matching tag was found.
fn remove_tag(
    p: &mut MarkupParser<'_>,
    tags: &mut Vec<OpenTag>,
    name: &str,
    tag_start: SourceLocation,
) -> bool {
    if tags.is_empty() {
        let location = tag_start.advance("</");
        p.error(ErrorKind::UnexpectedEndTag(name.to_owned()), location, name.len() as u32);
        return false;
    }
    while let Some(tag) = tags.pop() {
        if tag.name.eq_ignore_ascii_case(name) {
            return true;
        }
        report_missing_end_tag(p, &tag);
    }
    false
}

fn report_missing_end_tag(p: &mut MarkupParser<'_>, tag: &OpenTag) {
    let location = tag.start.advance("<");
    p.error(ErrorKind::MissingEndTag(tag.name.clone()), location, tag.name.len() as u32);
}

/// At end of input only the outermost unclosed tag is reported.
fn report_unclosed(p: &mut MarkupParser<'_>, tags: &mut Vec<OpenTag>) {
    if let Some(tag) = tags.first() {
        report_missing_end_tag(p, tag);
    }
    tags.clear();
}

fn end_tag_block(p: &mut MarkupParser<'_>, tags: &mut Vec<OpenTag>, complete: bool) {
    if tags.is_empty() {
        if complete {
            p.set_accepted(AcceptedCharacters::NONE);
        }
    } else {
        report_unclosed(p, tags);
    }

    if !p.ctx.design_time() {
        let mut accept_trailing = true;
        if p.ctx.tree.last_span().is_some_and(|span| span.kind() == SpanKind::Transition) {
            // After `</text>` the rest of the line stays with the code unless markup follows.
            let spacing = p.read_while_in(SPACING);
            let markup_follows = p.at(OPEN_ANGLE)
                || (p.at(TRANSITION)
                    && p.lookahead(1).is_some_and(|token| token.content.starts_with(':')));
            accept_trailing = markup_follows;
            p.put_current_back();
            p.put_back_all(&spacing);
        }
        if accept_trailing {
            p.accept_while_in(SyntaxSet::new([WHITESPACE]));
            p.optional(NEW_LINE);
        }
    } else if p.span.edit_handler.accepted == AcceptedCharacters::ANY {
        p.accept_while_in(SyntaxSet::new([WHITESPACE]));
        p.optional(NEW_LINE);
    }
    p.put_current_back();

    if !complete {
        p.add_marker_if_necessary();
    }
    p.output(SpanKind::Markup);
}

fn tag_content(p: &mut MarkupParser<'_>) {
    if !p.at_any(SPACING) {
        recover_to_end_of_tag(p);
        return;
    }
    while p.ensure_current() && !is_end_of_tag(p) {
        before_attribute(p);
    }
}

/// A `/` not followed by `>` is accepted as tag content.
fn is_end_of_tag(p: &mut MarkupParser<'_>) -> bool {
    if p.at(FORWARD_SLASH) {
        if p.next_is(CLOSE_ANGLE) {
            return true;
        }
        p.accept_and_move_next();
    }
    p.at(CLOSE_ANGLE) || p.at(OPEN_ANGLE)
}

fn before_attribute(p: &mut MarkupParser<'_>) {
    let whitespace = p.read_while_in(SPACING);
    let valid_name = p.current().is_some_and(|token| !NOT_ATTRIBUTE_NAME.contains(token.kind));
    if p.at(TRANSITION) || p.at(RAZOR_COMMENT_TRANSITION) || !valid_name {
        p.accept_all(whitespace);
        recover_to_end_of_tag(p);
        return;
    }

    let mut name = Vec::new();
    while let Some(token) = p.current() {
        let ends = NOT_ATTRIBUTE_NAME.contains(token.kind);
        if ends || token.is(TRANSITION) {
            break;
        }
        name.extend(p.take_current());
        if !p.next_token() {
            break;
        }
    }
    let after_name = p.read_while_in(SPACING);

    if !p.at(EQUALS) {
        // Minimized attribute such as `checked`.
        p.put_current_back();
        p.put_back_all(&after_name);
        p.output(SpanKind::Markup);
        let block = p.start_block(BlockKind::Markup);
        p.accept_all(whitespace);
        p.accept_all(name);
        p.output(SpanKind::Markup);
        block.complete(p);
        return;
    }

    p.output(SpanKind::Markup);
    let block = p.start_block(BlockKind::Markup);
    attribute_prefix(p, whitespace, name, after_name);
    block.complete(p);
}

fn attribute_prefix(
    p: &mut MarkupParser<'_>,
    whitespace: Vec<Token>,
    name_tokens: Vec<Token>,
    after_name: Vec<Token>,
) {
    let name = concat(&name_tokens);
    // `data-` attributes are always written out as they are.
    let conditional = !name.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("data-"));

    p.accept_all(whitespace);
    p.accept_all(name_tokens);
    p.accept_all(after_name);
    p.accept_and_move_next();

    let after_equals = p.read_while_in(SPACING);
    let spaced = !after_equals.is_empty();
    let mut quote = None;
    if p.at(SINGLE_QUOTE) || p.at(DOUBLE_QUOTE) {
        p.accept_all(after_equals);
        quote = p.current_kind();
        p.accept_and_move_next();
    } else if spaced {
        p.put_current_back();
        p.put_back_all(&after_equals);
    }

    if !conditional {
        p.output(SpanKind::Markup);
        if quote.is_none() && spaced {
            return;
        }
        skip_to_and_parse_code(p, |p| at_end_of_attribute_value(p, quote));
        p.output(SpanKind::Markup);
        if let Some(quote) = quote {
            p.optional(quote);
        }
        p.output(SpanKind::Markup);
        return;
    }

    let prefix = LocationTagged::new(p.span.content(), p.span.start());
    p.set_generator(SpanChunkGenerator::Null);
    p.output(SpanKind::Markup);

    if quote.is_some() || !spaced {
        while p.ensure_current() && !at_end_of_attribute_value(p, quote) {
            attribute_value(p, quote);
        }
    }

    let mut suffix = LocationTagged::new(String::new(), p.current_start());
    if let Some(quote) = quote {
        if p.at(quote) {
            suffix = LocationTagged::new(p.current_content(), p.current_start());
            p.accept_and_move_next();
        }
    }
    if !p.span.is_empty() {
        p.set_generator(SpanChunkGenerator::Null);
        p.output(SpanKind::Markup);
    }
    p.set_block_generator(BlockChunkGenerator::Attribute { name, prefix, suffix });
}

fn at_end_of_attribute_value(p: &mut MarkupParser<'_>, quote: Option<SyntaxKind>) -> bool {
    if p.is_eof() || p.current().is_none() {
        return true;
    }
    match quote {
        Some(quote) => p.at(quote),
        None => p.at_any(UNQUOTED_VALUE_END) || (p.at(FORWARD_SLASH) && p.next_is(CLOSE_ANGLE)),
    }
}

/// One whitespace-separated piece of a conditional attribute's value.
fn attribute_value(p: &mut MarkupParser<'_>, quote: Option<SyntaxKind>) {
    let prefix_start = p.current_start();
    let whitespace = p.read_while_in(SPACING);
    let prefix = LocationTagged::new(concat(&whitespace), prefix_start);

    if p.at(TRANSITION) {
        if p.next_is(TRANSITION) {
            let block = p.start_block(BlockKind::Markup);
            p.accept_all(whitespace);
            let value = LocationTagged::new(p.current_content(), p.current_start());
            p.set_generator(SpanChunkGenerator::LiteralAttribute { prefix, value });
            p.accept_and_move_next();
            p.output_with(SpanKind::Markup, AcceptedCharacters::NONE);
            p.set_generator(SpanChunkGenerator::Null);
            p.accept_and_move_next();
            p.output_with(SpanKind::Markup, AcceptedCharacters::NONE);
            block.complete(p);
        } else {
            p.accept_all(whitespace);
            let value_start = p.current_start();
            p.put_current_back();
            p.set_generator(SpanChunkGenerator::Null);
            let generator = BlockChunkGenerator::DynamicAttribute { prefix, value_start };
            let block = p.start_block_with(BlockKind::Markup, generator);
            other_parser_block(p);
            block.complete(p);
        }
    } else {
        p.accept_all(whitespace);
        let value_start = p.current_start();
        let mut value = Vec::new();
        while p.ensure_current()
            && !p.at_any(SPACING)
            && !p.at(TRANSITION)
            && !at_end_of_attribute_value(p, quote)
        {
            value.extend(p.take_current());
            p.next_token();
        }
        let value_text = LocationTagged::new(concat(&value), value_start);
        p.accept_all(value);
        p.set_generator(SpanChunkGenerator::LiteralAttribute { prefix, value: value_text });
    }
    p.output(SpanKind::Markup);
}

fn recover_to_end_of_tag(p: &mut MarkupParser<'_>) {
    while p.ensure_current() {
        skip_to_and_parse_code(p, |p| p.at_any(TAG_RECOVERY_STOP));
        match p.current_kind() {
            Some(SINGLE_QUOTE | DOUBLE_QUOTE) => parse_quoted(p),
            Some(OPEN_ANGLE | FORWARD_SLASH | CLOSE_ANGLE) | None => return,
            Some(_) => {
                p.accept_and_move_next();
            }
        }
    }
}

fn parse_quoted(p: &mut MarkupParser<'_>) {
    let Some(quote) = p.current_kind() else {
        return;
    };
    p.accept_and_move_next();
    skip_to_and_parse_code(p, |p| p.at(quote));
    if p.ensure_current() {
        p.accept_and_move_next();
    }
}

fn start_tag(
    p: &mut MarkupParser<'_>,
    tags: &mut Vec<OpenTag>,
    wrapper: &mut Option<BlockMarker>,
) -> bool {
    let bang = p.at(BANG);
    let name_token = if bang { p.lookahead(1) } else { p.current().cloned() };
    let name = match name_token {
        Some(token) if token.is(TEXT) && bang => format!("!{}", token.content),
        Some(token) if token.is(TEXT) => token.content,
        _ => String::new(),
    };
    let tag = OpenTag { name, start: p.last_tag_start };

    if tags.is_empty() && tag.name.eq_ignore_ascii_case("text") {
        text_tag(p, tag, tags, wrapper);
        return true;
    }

    accept_open_angle(p);
    optional_bang_escape(p);
    p.optional(TEXT);
    rest_of_tag(p, tag, tags, wrapper)
}

/// `<text>` wraps markup without emitting a tag.
fn text_tag(
    p: &mut MarkupParser<'_>,
    tag: OpenTag,
    tags: &mut Vec<OpenTag>,
    wrapper: &mut Option<BlockMarker>,
) {
    p.output(SpanKind::Markup);
    p.set_generator(SpanChunkGenerator::Null);
    accept_open_angle(p);
    let text_location = p.current_start();
    p.accept_and_move_next();

    let mut bookmark = offset(p.current_start());
    let mut spacing = p.read_while_in(SPACING);
    let empty = p.at(FORWARD_SLASH);
    if empty {
        p.accept_all(spacing);
        p.accept_and_move_next();
        bookmark = offset(p.current_start());
        spacing = p.read_while_in(SPACING);
    }

    if p.at(CLOSE_ANGLE) {
        p.accept_all(spacing);
        p.accept_and_move_next();
        p.set_accepted(AcceptedCharacters::NONE);
    } else {
        p.seek(bookmark);
        p.next_token();
        p.error(ErrorKind::TextTagCannotContainAttributes, text_location, 4);
        recover_text_tag(p);
    }

    if !empty {
        tags.push(tag);
    }
    let accepted = p.span.edit_handler.accepted;
    complete_tag_block_with_span(p, wrapper, accepted, SpanKind::Transition);
}

fn rest_of_tag(
    p: &mut MarkupParser<'_>,
    tag: OpenTag,
    tags: &mut Vec<OpenTag>,
    wrapper: &mut Option<BlockMarker>,
) -> bool {
    tag_content(p);
    // A `<` inside the tag means it was never finished.
    if p.at(OPEN_ANGLE) {
        return false;
    }

    let self_closing = p.optional(FORWARD_SLASH);
    let seen_close = p.optional(CLOSE_ANGLE);
    if !seen_close {
        let length = tag.name.len().max(1) as u32;
        p.error(ErrorKind::UnfinishedTag(tag.name), tag.start.advance("<"), length);
        return false;
    }
    if self_closing {
        return true;
    }

    let name = tag.name.trim().to_owned();
    if is_void(&name) {
        complete_tag_block_with_span(p, wrapper, AcceptedCharacters::NONE, SpanKind::Markup);
        if let Some(complete) = stray_void_end_tag(p, &name) {
            return complete;
        }
    } else if name.eq_ignore_ascii_case("script") {
        if current_script_tag_expects_html(p) {
            tags.push(tag);
        } else {
            complete_tag_block_with_span(p, wrapper, AcceptedCharacters::NONE, SpanKind::Markup);
            skip_to_end_script_and_parse_code(p, AcceptedCharacters::NONE);
        }
    } else {
        tags.push(tag);
    }
    true
}

/// Gives `</br>` after `<br>` a tag block of its own instead of treating it
/// as unbalanced.
fn stray_void_end_tag(p: &mut MarkupParser<'_>, name: &str) -> Option<bool> {
    let bookmark = offset(p.current_start());
    let whitespace = p.read_while_in(SPACING);
    if p.at(OPEN_ANGLE) && p.next_is(FORWARD_SLASH) {
        let open = p.take_current();
        p.next_token();
        let slash = p.take_current();
        p.next_token();
        let named = |token: &Token| token.is(TEXT) && token.content.eq_ignore_ascii_case(name);
        if p.current().is_some_and(named) {
            p.accept_all(whitespace);
            p.output(SpanKind::Markup);
            let block = p.start_block(BlockKind::Tag);
            p.accept_all(open.into_iter().chain(slash).collect());
            p.accept_and_move_next();
            p.accept_until(SyntaxSet::new([CLOSE_ANGLE, OPEN_ANGLE]));
            let complete = p.optional(CLOSE_ANGLE);
            if complete {
                p.set_accepted(AcceptedCharacters::NONE);
            }
            p.output(SpanKind::Markup);
            block.complete(p);
            return Some(complete);
        }
    }
    p.seek(bookmark);
    p.next_token();
    None
}

/// Whether the open tag block carries `type="text/html"`.
fn current_script_tag_expects_html(p: &MarkupParser<'_>) -> bool {
    let Some(tag) = p.ctx.tree.current() else {
        return false;
    };
    let type_attribute = tag
        .children()
        .iter()
        .filter_map(SyntaxNode::as_block)
        .filter(|block| {
            matches!(block.generator(), BlockChunkGenerator::Attribute { .. })
                && block.children().len() >= 2
        })
        .find(|block| is_type_attribute(block));

    type_attribute.is_some_and(|attribute| {
        let value: String = attribute
            .children()
            .iter()
            .filter_map(SyntaxNode::as_span)
            .filter(|span| {
                matches!(span.generator(), SpanChunkGenerator::LiteralAttribute { .. })
            })
            .map(|span| span.content())
            .collect();
        value.trim().eq_ignore_ascii_case("text/html")
    })
}

fn is_type_attribute(block: &Block) -> bool {
    let Some(span) = block.children().first().and_then(SyntaxNode::as_span) else {
        return false;
    };
    let content = span.content().trim_start();
    let named_type = content.get(..4).is_some_and(|name| name.eq_ignore_ascii_case("type"));
    named_type
        && content
            .get(4..)
            .and_then(|rest| rest.chars().next())
            .is_none_or(|c| matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0c' | '='))
}

/// Script content is opaque markup up to `</script>`; `@` still switches to code.
fn skip_to_end_script_and_parse_code(p: &mut MarkupParser<'_>, end_accepted: AcceptedCharacters) {
    let mut seen_end = false;
    while !seen_end && p.ensure_current() {
        skip_to_and_parse_code(p, |p| p.at(OPEN_ANGLE));
        let tag_start = p.current_start();
        if p.next_is(FORWARD_SLASH) {
            seen_end = p.lookahead(2).is_some_and(|token| {
                token.is(TEXT) && token.content.eq_ignore_ascii_case("script")
            });
        }

        if seen_end {
            p.output(SpanKind::Markup);
            let block = p.start_block(BlockKind::Tag);
            p.set_accepted(end_accepted);
            p.accept_and_move_next();
            p.accept_and_move_next();
            skip_to_and_parse_code(p, |p| p.at(CLOSE_ANGLE));
            if !p.optional(CLOSE_ANGLE) {
                let error = ErrorKind::UnfinishedTag("script".to_owned());
                p.error(error, tag_start.advance("</"), 6);
            }
            p.output(SpanKind::Markup);
            block.complete(p);
        } else {
            p.accept_and_move_next();
        }
    }
}

/// One tag at document level: start and end tags each get a block of their own.
fn scan_tag_in_document_context(p: &mut MarkupParser<'_>, tags: &mut Vec<OpenTag>) {
    if !p.at(OPEN_ANGLE) {
        return;
    }
    if p.next_is(BANG) {
        if !is_bang_escape(p, 1) {
            if p.lookahead(2).is_some_and(|token| token.is(DOUBLE_HYPHEN)) {
                p.output(SpanKind::Markup);
            }
            p.accept_and_move_next();
            bang_tag(p);
            return;
        }
    } else if p.next_is(QUESTION_MARK) {
        p.accept_and_move_next();
        xml_processing_instruction(p);
        return;
    }

    p.output(SpanKind::Markup);
    let block = p.start_block(BlockKind::Tag);
    let tag_start = p.current_start();
    p.accept_and_move_next();

    if p.at(FORWARD_SLASH) {
        p.accept_and_move_next();
        let name = tag_name_after_escape(p);
        p.optional(TEXT);
        p.optional(WHITESPACE);
        p.optional(CLOSE_ANGLE);
        if !name.is_empty() {
            remove_tag(p, tags, &name, tag_start);
        }
    } else {
        let name = tag_name_after_escape(p);
        let script = name.eq_ignore_ascii_case("script");
        p.optional(TEXT);
        tag_content(p);
        let self_closing = p.optional(FORWARD_SLASH);
        let closed = p.optional(CLOSE_ANGLE);

        if script && closed && !self_closing && !current_script_tag_expects_html(p) {
            p.output(SpanKind::Markup);
            block.complete(p);
            skip_to_end_script_and_parse_code(p, AcceptedCharacters::ANY);
            return;
        }
        if closed && !self_closing && !name.is_empty() && !is_void(&name) {
            tags.push(OpenTag { name, start: tag_start });
        }
    }
    p.output(SpanKind::Markup);
    block.complete(p);
}

/// Consumes a `!` escape and reads the tag name after it.
fn tag_name_after_escape(p: &mut MarkupParser<'_>) -> String {
    let escaped = is_bang_escape(p, 0);
    optional_bang_escape(p);
    match p.current() {
        Some(token) if token.is(TEXT) && escaped => format!("!{}", token.content),
        Some(token) if token.is(TEXT) => token.content.clone(),
        _ => String::new(),
    }
}

fn nesting_section(p: &mut MarkupParser<'_>, open: &str, close: &str, tags: &mut Vec<OpenTag>) {
    let mut nesting = 1;
    while nesting > 0 && p.ensure_current() {
        skip_to_and_parse_code(p, |p| p.at(TEXT) || p.at(OPEN_ANGLE));
        if p.at(TEXT) {
            nesting += process_text_token(p, open, close, nesting);
            if p.current().is_some() {
                p.accept_and_move_next();
            } else if nesting > 0 {
                p.next_token();
            }
        } else {
            scan_tag_in_document_context(p, tags);
        }
    }
}

/// Adjusts nesting for the first `open` or `close` inside a text token.
///
/// The token is split around the sequence; when it closes the section the
/// source is left at the closing sequence.
fn process_text_token(p: &mut MarkupParser<'_>, open: &str, close: &str, nesting: i32) -> i32 {
    let Some(content) = p.current().map(|token| token.content.clone()) else {
        return 0;
    };
    for (position, _) in content.char_indices() {
        let rest = &content[position..];
        let found = if rest.starts_with(open) {
            Some((open, 1))
        } else if rest.starts_with(close) {
            Some((close, -1))
        } else {
            None
        };
        if let Some((sequence, delta)) = found {
            let Some(token) = p.take_current() else {
                return 0;
            };
            let start = offset(token.location);
            let (before, rest) = token.split(position, TEXT, TEXT);
            let (sequence_token, _) = rest.split(sequence.len(), TEXT, TEXT);
            if !before.content.is_empty() {
                p.accept(before);
            }
            if nesting + delta == 0 {
                p.seek(start + position);
            } else {
                p.accept(sequence_token);
                p.seek(start + position + sequence.len());
            }
            return delta;
        }
    }
    0
}
