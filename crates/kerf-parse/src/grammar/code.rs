use std::sync::Arc;

use kerf_errors::{ErrorKind, SourceLocation};
use kerf_syntax::{
    AcceptedCharacters, BlockChunkGenerator, BlockKind, EditHandler, EditHandlerKind, SpanBuilder,
    SpanChunkGenerator, SpanKind, SyntaxNode,
};
use kerf_tokenizer::SyntaxKind::*;
use kerf_tokenizer::{Keyword, Language, SyntaxKind, SyntaxSet, Token, Tokenize};

use super::{directives, markup};
use crate::parser::{CodeParser, MarkupParser, Parser, SpanConfig, offset};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) struct BalancingModes: u8 {
        const BACKTRACK_ON_FAILURE = 1;
        const NO_ERROR_ON_FAILURE = 1 << 1;
        const ALLOW_COMMENTS_AND_TEMPLATES = 1 << 2;
    }
}

const STATEMENT_TERMINATORS: SyntaxSet = SyntaxSet::new([
    SEMICOLON,
    RAZOR_COMMENT_TRANSITION,
    TRANSITION,
    LEFT_BRACE,
    LEFT_PAREN,
    LEFT_BRACKET,
    RIGHT_BRACE,
]);

/// Name and opening location of a braced construct, for end-of-file errors.
#[derive(Debug, Clone)]
pub(super) struct BlockStart {
    name: String,
    start: SourceLocation,
}

impl BlockStart {
    fn new(name: impl Into<String>, start: SourceLocation) -> Self {
        Self { name: name.into(), start }
    }

    fn at_current(p: &CodeParser<'_>) -> Self {
        Self::new(p.current_content(), p.current_start())
    }
}

fn statement_config() -> SpanConfig {
    SpanConfig {
        generator: SpanChunkGenerator::Statement,
        edit_handler: EditHandler::new(Language::Code, AcceptedCharacters::ANY),
    }
}

pub(super) fn is_spacing(token: &Token, newlines: bool, comments: bool) -> bool {
    token.is(WHITESPACE)
        || (newlines && token.is(NEW_LINE))
        || (comments && token.is(COMMENT))
}

pub(super) fn accept_spacing(p: &mut CodeParser<'_>, newlines: bool, comments: bool) {
    p.accept_while(|token| is_spacing(token, newlines, comments));
}

/// Parses one code block, starting at an optional `@`.
pub(crate) fn parse_block(p: &mut CodeParser<'_>) {
    p.with_span_config(statement_config(), |p| {
        let start = p.current_location();
        p.span.set_start(start);
        let block = p.start_block(BlockKind::Statement);
        p.next_token();
        accept_spacing(p, true, true);

        let mut transition = None;
        if p.at(STRING_LITERAL) && p.current().is_some_and(|token| token.content.starts_with('@'))
        {
            if let Some(token) = p.take_current() {
                let (head, tail) = token.split(1, TRANSITION, STRING_LITERAL);
                p.seek(offset(tail.location));
                p.next_token();
                transition = Some(head);
            }
        } else if p.at(TRANSITION) {
            transition = p.take_current();
            p.next_token();
        }

        match transition {
            Some(transition) => {
                p.output(SpanKind::Code);
                at_transition(p, transition);
            }
            None => after_transition(p),
        }

        p.output(SpanKind::Code);
        block.complete(p);
    });
}

fn at_transition(p: &mut CodeParser<'_>, transition: Token) {
    p.accept(transition);
    p.set_accepted(AcceptedCharacters::NONE);
    p.set_generator(SpanChunkGenerator::Null);
    p.output(SpanKind::Transition);
    after_transition(p);
}

fn after_transition(p: &mut CodeParser<'_>) {
    p.with_span_config(statement_config(), |p| {
        p.ensure_current();
        dispatch(p);
        p.put_current_back();
    });
}

fn dispatch(p: &mut CodeParser<'_>) {
    if !p.is_eof() {
        match p.current_kind() {
            Some(LEFT_PAREN) => {
                p.set_block_kind(BlockKind::Expression);
                p.set_block_generator(BlockChunkGenerator::Expression);
                explicit_expression(p);
                return;
            }
            Some(IDENTIFIER) => {
                if directives::try_parse(p) {
                    return;
                }
                if p.at_text(IDENTIFIER, "helper") {
                    let (start, length) = (p.current_start(), p.current_len());
                    p.error(ErrorKind::HelperDirectiveNotAvailable, start, length);
                }
                p.set_block_kind(BlockKind::Expression);
                p.set_block_generator(BlockChunkGenerator::Expression);
                implicit_expression(p, AcceptedCharacters::NON_WHITE_SPACE);
                return;
            }
            Some(KEYWORD) => {
                if !directives::try_parse(p) {
                    keyword_block(p, true);
                }
                return;
            }
            Some(LEFT_BRACE) => {
                verbatim_block(p);
                return;
            }
            _ => {}
        }
    }

    p.set_block_kind(BlockKind::Expression);
    p.set_block_generator(BlockChunkGenerator::Expression);
    p.add_marker_if_necessary();
    p.set_generator(SpanChunkGenerator::Expression);
    p.span.edit_handler = EditHandler::implicit_expression(Arc::clone(&p.ctx.keywords), p.nested);

    let start = p.current_start();
    if p.at(WHITESPACE) || p.at(NEW_LINE) {
        p.error(ErrorKind::UnexpectedWhiteSpaceAtStartOfCodeBlock, start, p.current_len());
    } else if p.is_eof() {
        p.error(ErrorKind::UnexpectedEofAtStartOfCodeBlock, start, 1);
    } else {
        let content = p.current_content();
        p.error(ErrorKind::UnexpectedCharacterAtStartOfCodeBlock(content), start, p.current_len());
    }
}

fn verbatim_block(p: &mut CodeParser<'_>) {
    let block = BlockStart::new("code", p.current_start());
    p.accept_and_move_next();
    p.set_accepted(AcceptedCharacters::NONE);
    p.set_generator(SpanChunkGenerator::Null);
    p.output(SpanKind::MetaCode);

    p.span.edit_handler = EditHandler::auto_complete(false);
    code_block(p, false, &block);

    p.set_generator(SpanChunkGenerator::Statement);
    p.add_marker_if_necessary();
    if !p.at(RIGHT_BRACE) {
        request_closing_brace(p);
    }
    p.output(SpanKind::Code);

    if p.optional(RIGHT_BRACE) {
        p.set_accepted(AcceptedCharacters::NONE);
        p.set_generator(SpanChunkGenerator::Null);
    }

    if !p.nested {
        p.ensure_current();
        if p.at(NEW_LINE) || (p.at(WHITESPACE) && p.next_is(NEW_LINE)) {
            p.ctx.null_generate_whitespace_and_newline = true;
        }
    }

    p.output(SpanKind::MetaCode);
}

/// Marks the auto-complete span of the current block as missing its `}`.
///
/// The span may already be in the tree when statements were flushed after it.
pub(super) fn request_closing_brace(p: &mut CodeParser<'_>) {
    if matches!(p.span.edit_handler.kind, EditHandlerKind::AutoComplete { .. }) {
        p.span.edit_handler.set_auto_complete_string("}");
        return;
    }

    let Some(block) = p.ctx.tree.current_mut() else {
        return;
    };
    let children = block.children_mut();
    let pending = children.iter().rposition(|child| {
        child.as_span().is_some_and(|span| {
            matches!(
                span.edit_handler().kind,
                EditHandlerKind::AutoComplete { auto_complete_string: None, .. }
            )
        })
    });
    let Some(index) = pending else {
        return;
    };
    let rebuilt = children[index].as_span().map(|span| {
        let mut builder = SpanBuilder::from_span(span);
        builder.edit_handler.set_auto_complete_string("}");
        builder.build()
    });
    if let Some(span) = rebuilt {
        children[index] = SyntaxNode::from(span);
    }
}

pub(super) fn implicit_expression(p: &mut CodeParser<'_>, accepted: AcceptedCharacters) {
    p.set_block_kind(BlockKind::Expression);
    p.set_block_generator(BlockChunkGenerator::Expression);

    let edit_handler =
        EditHandler::implicit_expression(Arc::clone(&p.ctx.keywords), p.nested)
            .with_accepted(accepted);
    let config = SpanConfig { generator: SpanChunkGenerator::Expression, edit_handler };
    p.with_span_config(config, |p| {
        loop {
            if p.at(IDENTIFIER) || p.at(KEYWORD) {
                p.accept_and_move_next();
            }
            if !method_call_or_array_index(p, accepted) {
                break;
            }
        }
        p.put_current_back();
        p.output(SpanKind::Code);
    });
}

/// Extends an implicit expression over calls, indexers and member accesses.
fn method_call_or_array_index(p: &mut CodeParser<'_>, accepted: AcceptedCharacters) -> bool {
    if p.is_eof() {
        return false;
    }

    if p.at(LEFT_PAREN) || p.at(LEFT_BRACKET) {
        // Whitespace is fine while inside the brackets.
        p.set_accepted(AcceptedCharacters::ANY);
        let right = p.current_kind().and_then(SyntaxKind::closing);
        let mut config = p.span_config();
        config.edit_handler.accepted = AcceptedCharacters::ANY;
        let success = p.with_span_config(config, |p| {
            balance(
                p,
                BalancingModes::BACKTRACK_ON_FAILURE | BalancingModes::ALLOW_COMMENTS_AND_TEMPLATES,
            )
        });
        if !success {
            p.accept_until(SyntaxSet::new([LESS_THAN]));
        }
        if right.is_some_and(|right| p.at(right)) {
            p.accept_and_move_next();
            p.set_accepted(accepted);
        }
        return method_call_or_array_index(p, accepted);
    }

    if p.at(QUESTION_MARK) {
        match p.lookahead(1).map(|token| token.kind) {
            Some(DOT) => {
                p.accept_and_move_next();
                p.accept_and_move_next();
                return p.at(IDENTIFIER) || p.at(KEYWORD);
            }
            Some(LEFT_BRACKET) => {
                p.accept_and_move_next();
                return method_call_or_array_index(p, accepted);
            }
            _ => {}
        }
    } else if p.at(DOT) {
        if let Some(dot) = p.take_current() {
            if p.next_token() {
                if p.at(IDENTIFIER) || p.at(KEYWORD) {
                    p.accept(dot);
                    return true;
                }
                p.put_current_back();
            }
            if p.nested {
                p.accept(dot);
            } else {
                p.put_back(&dot);
            }
        }
    } else if !p.at(WHITESPACE) && !p.at(NEW_LINE) {
        p.put_current_back();
    }

    false
}

/// Ends a top-level construct, taking trailing whitespace and the newline of a code-only line.
pub(super) fn complete_block(
    p: &mut CodeParser<'_>,
    insert_marker: bool,
    capture_whitespace: bool,
) {
    if insert_marker && p.ctx.tree.last_accepted() != AcceptedCharacters::ANY {
        p.add_marker_if_necessary();
    }

    p.ensure_current();

    if !p.ctx.whitespace_is_significant_to_ancestor
        && p.ctx.tree.current_kind() != Some(BlockKind::Expression)
        && capture_whitespace
        && !p.ctx.design_time()
        && !p.nested
    {
        let whitespace = p.read_while_in(SyntaxSet::new([WHITESPACE]));
        if p.at(NEW_LINE) {
            p.accept_all(whitespace);
            p.accept_and_move_next();
            p.put_current_back();
        } else {
            p.put_current_back();
            p.put_back_all(&whitespace);
        }
    } else {
        p.put_current_back();
    }
}

fn explicit_expression(p: &mut CodeParser<'_>) {
    let start = p.current_start();
    p.accept_and_move_next();
    p.set_accepted(AcceptedCharacters::NONE);
    p.set_generator(SpanChunkGenerator::Null);
    p.output(SpanKind::MetaCode);

    let config = SpanConfig {
        generator: SpanChunkGenerator::Expression,
        edit_handler: EditHandler::new(Language::Code, AcceptedCharacters::ANY),
    };
    p.with_span_config(config, |p| {
        let success = balance_pair(
            p,
            BalancingModes::all(),
            LEFT_PAREN,
            RIGHT_PAREN,
            start,
        );
        if !success {
            p.accept_until(SyntaxSet::new([LESS_THAN]));
            let error = ErrorKind::ExpectedEndOfBlockBeforeEof {
                block: "explicit expression".into(),
                close: ')',
                open: '(',
            };
            p.error(error, start, 1);
        }

        if p.span.is_empty() {
            let marker = Token::marker(p.span.start());
            p.accept(marker);
        }
        p.output(SpanKind::Code);
    });

    p.optional(RIGHT_PAREN);
    if !p.is_eof() {
        p.put_current_back();
    }
    p.set_accepted(AcceptedCharacters::NONE);
    p.set_generator(SpanChunkGenerator::Null);
    complete_block(p, false, false);
    p.output(SpanKind::MetaCode);
}

fn sample(kind: SyntaxKind) -> char {
    match kind {
        LEFT_PAREN => '(',
        RIGHT_PAREN => ')',
        LEFT_BRACKET => '[',
        RIGHT_BRACKET => ']',
        LEFT_BRACE => '{',
        RIGHT_BRACE => '}',
        LESS_THAN => '<',
        GREATER_THAN => '>',
        _ => '?',
    }
}

/// Accepts the bracket under the cursor and everything up to its partner, which stays current.
pub(super) fn balance(p: &mut CodeParser<'_>, mode: BalancingModes) -> bool {
    let Some(left) = p.current_kind() else {
        return false;
    };
    let Some(right) = left.closing() else {
        return false;
    };
    let start = p.current_start();
    p.accept_and_move_next();
    if p.is_eof() && !mode.contains(BalancingModes::NO_ERROR_ON_FAILURE) {
        let error =
            ErrorKind::ExpectedCloseBracketBeforeEof { open: sample(left), close: sample(right) };
        p.error(error, start, 1);
    }
    balance_pair(p, mode, left, right, start)
}

pub(super) fn balance_pair(
    p: &mut CodeParser<'_>,
    mode: BalancingModes,
    left: SyntaxKind,
    right: SyntaxKind,
    start: SourceLocation,
) -> bool {
    let mut start_position = offset(p.current_start());
    let mut nesting = 1;
    if p.is_eof() {
        return false;
    }

    let mut tokens = Vec::new();
    loop {
        if mode.contains(BalancingModes::ALLOW_COMMENTS_AND_TEMPLATES) && at_embedded_transition(p)
        {
            p.accept_all(std::mem::take(&mut tokens));
            if p.at(TRANSITION) {
                p.put_current_back();
                template(p);
            } else {
                p.razor_comment();
            }
            // Spans were emitted; backtracking can only go this far.
            start_position = offset(p.current_start());
        }

        if p.at(left) {
            nesting += 1;
        } else if p.at(right) {
            nesting -= 1;
        }
        if nesting == 0 {
            break;
        }
        tokens.extend(p.take_current());
        if !p.next_token() {
            break;
        }
    }

    if nesting > 0 {
        if !mode.contains(BalancingModes::NO_ERROR_ON_FAILURE) {
            let error = ErrorKind::ExpectedCloseBracketBeforeEof {
                open: sample(left),
                close: sample(right),
            };
            p.error(error, start, 1);
        }
        if mode.contains(BalancingModes::BACKTRACK_ON_FAILURE) {
            p.seek(start_position);
            p.next_token();
        } else {
            p.accept_all(tokens);
        }
    } else {
        p.accept_all(tokens);
    }
    nesting == 0
}

fn at_embedded_transition(p: &mut CodeParser<'_>) -> bool {
    if p.at(RAZOR_COMMENT_TRANSITION) {
        return true;
    }
    p.at(TRANSITION) && p.next_is_any(SyntaxSet::new([LESS_THAN, COLON, DOUBLE_COLON]))
}

/// Inline markup inside code, such as `@<p>@item</p>`.
fn template(p: &mut CodeParser<'_>) {
    if p.ctx.tree.open_kinds().any(|kind| kind == BlockKind::Template) {
        p.error(ErrorKind::InlineMarkupBlocksCannotBeNested, p.current_start(), 1);
    }
    p.output(SpanKind::Code);
    let block = p.start_block_with(BlockKind::Template, BlockChunkGenerator::Template);
    p.put_current_back();
    other_parser_block(p);
    block.complete(p);
}

/// Hands the source to a fresh markup parser and resumes after what it consumed.
fn other_parser_block(p: &mut CodeParser<'_>) {
    {
        let mut markup = MarkupParser::new(&mut *p.ctx);
        markup::parse_block(&mut markup);
    }
    resume_after_other_parser(p);
}

pub(super) fn resume_after_other_parser<T: Tokenize>(p: &mut Parser<'_, T>) {
    let start = p.current_location();
    p.span.set_start(start);
    p.initialize();
    p.next_token();
}

fn nested_block(p: &mut CodeParser<'_>) {
    p.output(SpanKind::Code);

    let was_nested = p.nested;
    p.nested = true;
    parse_block(p);

    let start = p.current_location();
    p.span.set_start(start);
    p.initialize();
    p.nested = was_nested;
    p.next_token();
}

fn code_block(p: &mut CodeParser<'_>, accept_terminating_brace: bool, block: &BlockStart) {
    p.ensure_current();
    while !p.is_eof() && !p.at(RIGHT_BRACE) {
        statement(p, None);
        p.ensure_current();
    }

    if p.is_eof() {
        let error = ErrorKind::ExpectedEndOfBlockBeforeEof {
            block: block.name.clone(),
            close: '}',
            open: '{',
        };
        p.error(error, block.start, 1);
    } else if accept_terminating_brace {
        p.set_accepted(AcceptedCharacters::NONE);
        p.accept_and_move_next();
    }
}

/// Accepts whitespace and newlines, holding back the last run of whitespace on the final line.
fn accept_whitespace_in_lines(p: &mut CodeParser<'_>) -> Option<Token> {
    let mut last = None;
    while p.at(WHITESPACE) || p.at(NEW_LINE) {
        if let Some(whitespace) = last.take() {
            p.accept(whitespace);
        }
        let Some(token) = p.take_current() else {
            break;
        };
        if token.is(WHITESPACE) {
            last = Some(token);
        } else {
            p.accept(token);
        }
        p.next_token();
    }
    last
}

fn statement(p: &mut CodeParser<'_>, block: Option<&BlockStart>) {
    p.set_accepted(AcceptedCharacters::ANY);

    let last_whitespace = accept_whitespace_in_lines(p);
    if p.is_eof() {
        p.accept_all(last_whitespace.into_iter().collect());
        return;
    }
    let Some(kind) = p.current_kind() else {
        return;
    };
    let location = p.current_start();

    // `@:` and `@::` both start a line of markup.
    let single_line_markup =
        kind == TRANSITION && p.next_is_any(SyntaxSet::new([COLON, DOUBLE_COLON]));
    let is_markup = single_line_markup
        || kind == LESS_THAN
        || (kind == TRANSITION && p.next_is(LESS_THAN));

    if p.ctx.design_time() || !is_markup {
        p.accept_all(last_whitespace.into_iter().collect());
    } else {
        let next = p.lookahead(1);
        p.put_current_back();
        match (next, last_whitespace) {
            (Some(next), Some(whitespace)) if next.content != "text" => p.put_back(&whitespace),
            // `<text>` leaves the indentation with the code.
            (_, Some(whitespace)) => p.accept(whitespace),
            (_, None) => {}
        }
    }

    if is_markup {
        if kind == TRANSITION && !single_line_markup {
            p.error(ErrorKind::AtInCodeMustBeFollowedByColonParenOrIdentifierStart, location, 1);
        }
        p.output(SpanKind::Code);
        if p.ctx.design_time() && (p.at(LESS_THAN) || p.at(TRANSITION)) {
            p.put_current_back();
        }
        other_parser_block(p);
    } else {
        handle_statement(p, block, kind);
    }
}

fn handle_statement(p: &mut CodeParser<'_>, block: Option<&BlockStart>, kind: SyntaxKind) {
    match kind {
        RAZOR_COMMENT_TRANSITION => {
            p.output(SpanKind::Code);
            p.razor_comment();
            statement(p, block);
        }
        LEFT_BRACE => {
            let block =
                block.cloned().unwrap_or_else(|| BlockStart::new("code", p.current_start()));
            p.accept_and_move_next();
            code_block(p, true, &block);
        }
        KEYWORD => {
            if !handle_keyword(p, false) {
                standard_statement(p);
            }
        }
        TRANSITION => embedded_expression(p),
        // End of the enclosing code block.
        RIGHT_BRACE => {}
        COMMENT => {
            p.accept_and_move_next();
        }
        _ => standard_statement(p),
    }
}

fn embedded_expression(p: &mut CodeParser<'_>) {
    let Some(transition) = p.take_current() else {
        return;
    };
    p.next_token();

    if p.at(TRANSITION) {
        // `@@` in code is an escaped `@`.
        p.output(SpanKind::Code);
        p.accept(transition);
        p.set_generator(SpanChunkGenerator::Null);
        p.output(SpanKind::Code);
        p.accept_and_move_next();
        standard_statement(p);
    } else {
        if p.at(LEFT_BRACE) {
            p.error(ErrorKind::UnexpectedNestedCodeBlock, p.current_start(), 1);
        }
        p.put_current_back();
        p.put_back(&transition);
        p.add_marker_if_necessary();
        nested_block(p);
    }
}

fn standard_statement(p: &mut CodeParser<'_>) {
    while !p.is_eof() {
        let bookmark = offset(p.current_start());
        let read = p.read_while(|token| !STATEMENT_TERMINATORS.contains(token.kind));

        if p.at(LEFT_BRACE) || p.at(LEFT_PAREN) || p.at(LEFT_BRACKET) {
            p.accept_all(read);
            let modes =
                BalancingModes::ALLOW_COMMENTS_AND_TEMPLATES | BalancingModes::BACKTRACK_ON_FAILURE;
            if balance(p, modes) {
                p.optional(RIGHT_BRACE);
            } else {
                p.accept_until(SyntaxSet::new([LESS_THAN, RIGHT_BRACE]));
                return;
            }
        } else if p.at(TRANSITION) && p.next_is_any(SyntaxSet::new([LESS_THAN, COLON])) {
            p.accept_all(read);
            p.output(SpanKind::Code);
            template(p);
        } else if p.at(RAZOR_COMMENT_TRANSITION) {
            p.accept_all(read);
            p.razor_comment();
        } else if p.at(SEMICOLON) {
            p.accept_all(read);
            p.accept_and_move_next();
            return;
        } else if p.at(RIGHT_BRACE) {
            p.accept_all(read);
            return;
        } else {
            p.seek(bookmark);
            p.next_token();
            p.accept_until(SyntaxSet::new([LESS_THAN, LEFT_BRACE, RIGHT_BRACE]));
            return;
        }
    }
}

type KeywordHandler = fn(&mut CodeParser<'_>, bool);

fn keyword_handler(keyword: Keyword) -> Option<KeywordHandler> {
    let handler: KeywordHandler = match keyword {
        Keyword::For | Keyword::Foreach | Keyword::While | Keyword::Switch | Keyword::Lock => {
            conditional_statement
        }
        Keyword::Case | Keyword::Default => case_statement,
        Keyword::If => if_statement,
        Keyword::Try => try_statement,
        Keyword::Using => using_keyword,
        Keyword::Do => do_statement,
        Keyword::Class | Keyword::Namespace => reserved_directive,
        Keyword::Await => await_expression,
        _ => return None,
    };
    Some(handler)
}

/// Runs the handler for the keyword under the cursor; false when it has none.
fn handle_keyword(p: &mut CodeParser<'_>, top_level: bool) -> bool {
    match p.current().and_then(|token| token.keyword).and_then(keyword_handler) {
        Some(handler) => {
            handler(p, top_level);
            true
        }
        None => false,
    }
}

fn keyword_block(p: &mut CodeParser<'_>, top_level: bool) {
    if !handle_keyword(p, top_level) {
        p.set_block_kind(BlockKind::Expression);
        p.set_block_generator(BlockChunkGenerator::Expression);
        implicit_expression(p, AcceptedCharacters::NON_WHITE_SPACE);
    }
}

fn conditional_statement(p: &mut CodeParser<'_>, top_level: bool) {
    let block = BlockStart::at_current(p);
    conditional_block(p, &block);
    if top_level {
        complete_block(p, true, true);
    }
}

fn conditional_block(p: &mut CodeParser<'_>, block: &BlockStart) {
    p.accept_and_move_next();
    accept_spacing(p, true, true);
    if accept_condition(p) {
        accept_spacing(p, true, true);
        expect_code_block(p, block);
    }
}

/// Accepts a parenthesized condition when one is present.
fn accept_condition(p: &mut CodeParser<'_>) -> bool {
    if !p.at(LEFT_PAREN) {
        return true;
    }
    let modes = BalancingModes::BACKTRACK_ON_FAILURE | BalancingModes::ALLOW_COMMENTS_AND_TEMPLATES;
    let complete = balance(p, modes);
    if complete {
        p.optional(RIGHT_PAREN);
    } else {
        p.accept_until(SyntaxSet::new([NEW_LINE]));
    }
    complete
}

fn expect_code_block(p: &mut CodeParser<'_>, block: &BlockStart) {
    if p.is_eof() {
        return;
    }
    if !p.at(LEFT_BRACE) {
        let content = p.current_content();
        p.error(
            ErrorKind::SingleLineControlFlowStatementsNotAllowed(content),
            p.current_start(),
            p.current_len(),
        );
    }
    statement(p, Some(block));
}

fn unconditional_block(p: &mut CodeParser<'_>) {
    let block = BlockStart::at_current(p);
    p.accept_and_move_next();
    accept_spacing(p, true, true);
    expect_code_block(p, &block);
}

fn case_statement(p: &mut CodeParser<'_>, _top_level: bool) {
    p.accept_until(SyntaxSet::new([COLON]));
    p.optional(COLON);
}

fn do_statement(p: &mut CodeParser<'_>, top_level: bool) {
    unconditional_block(p);
    while_clause(p);
    if top_level {
        complete_block(p, true, true);
    }
}

fn while_clause(p: &mut CodeParser<'_>) {
    p.set_accepted(AcceptedCharacters::ANY);
    let whitespace = skip_to_next_important_token(p);

    if p.at_keyword(Keyword::While) {
        p.accept_all(whitespace);
        p.accept_and_move_next();
        accept_spacing(p, true, true);
        if accept_condition(p) && p.optional(SEMICOLON) {
            p.set_accepted(AcceptedCharacters::NONE);
        }
    } else {
        p.put_current_back();
        p.put_back_all(&whitespace);
    }
}

/// Reads spacing, emitting any template comments in between; returns the trailing spacing.
fn skip_to_next_important_token(p: &mut CodeParser<'_>) -> Vec<Token> {
    while !p.is_eof() {
        let whitespace = p.read_while(|token| is_spacing(token, true, true));
        if p.at(RAZOR_COMMENT_TRANSITION) {
            p.accept_all(whitespace);
            p.set_accepted(AcceptedCharacters::ANY);
            p.razor_comment();
        } else {
            return whitespace;
        }
    }
    Vec::new()
}

fn using_keyword(p: &mut CodeParser<'_>, top_level: bool) {
    let block = BlockStart::at_current(p);
    p.accept_and_move_next();
    accept_spacing(p, false, true);

    if p.at(LEFT_PAREN) {
        if accept_condition(p) {
            accept_spacing(p, true, true);
            expect_code_block(p, &block);
        }
    } else if p.at(IDENTIFIER) || p.at_keyword(Keyword::Static) {
        if top_level {
            using_declaration(p);
        } else {
            p.error(
                ErrorKind::NamespaceImportAndTypeAliasCannotExistWithinCodeBlock,
                block.start,
                block.name.len() as u32,
            );
            standard_statement(p);
        }
    }

    if top_level {
        complete_block(p, true, true);
    }
}

fn using_declaration(p: &mut CodeParser<'_>) {
    p.set_block_kind(BlockKind::Directive);

    if p.at(IDENTIFIER) {
        namespace_or_type_name(p);
        let whitespace = p.read_while(|token| is_spacing(token, true, true));
        if p.at(EQUALS) {
            // Alias.
            p.accept_all(whitespace);
            p.accept_and_move_next();
            accept_spacing(p, true, true);
            namespace_or_type_name(p);
        } else {
            p.put_current_back();
            p.put_back_all(&whitespace);
        }
    } else if p.at_keyword(Keyword::Static) {
        p.accept_and_move_next();
        accept_spacing(p, false, true);
        namespace_or_type_name(p);
    }

    p.set_accepted(AcceptedCharacters::ANY_EXCEPT_NEWLINE);
    let namespace = p.span.tokens().iter().skip(1).map(|token| token.content.as_str()).collect();
    p.set_generator(SpanChunkGenerator::AddImport { namespace });

    if p.ensure_current() {
        p.optional(SEMICOLON);
    }
}

pub(super) fn namespace_or_type_name(p: &mut CodeParser<'_>) -> bool {
    if !p.optional(IDENTIFIER) && !p.optional(KEYWORD) {
        return false;
    }

    // Nullable.
    p.optional(QUESTION_MARK);
    if p.optional(DOUBLE_COLON) && !p.optional(IDENTIFIER) {
        p.optional(KEYWORD);
    }
    if p.at(LESS_THAN) {
        balance(p, BalancingModes::empty());
        p.optional(GREATER_THAN);
    }
    if p.optional(DOT) {
        namespace_or_type_name(p);
    }
    while p.at(LEFT_BRACKET) {
        balance(p, BalancingModes::empty());
        p.optional(RIGHT_BRACKET);
    }
    true
}

/// Accepts `a.b.c`; on failure nothing is consumed. Also returns the length to report.
pub(super) fn qualified_identifier(p: &mut CodeParser<'_>) -> (bool, u32) {
    let mut length = 0;
    let mut expecting_dot = false;
    let tokens = p.read_while(|token| {
        if (expecting_dot && token.is(DOT)) || (!expecting_dot && token.is(IDENTIFIER)) {
            expecting_dot = !expecting_dot;
            return true;
        }
        if !token.is(WHITESPACE) && !token.is(NEW_LINE) {
            expecting_dot = false;
            length += u32::from(token.len());
        }
        false
    });

    length += tokens.iter().map(|token| u32::from(token.len())).sum::<u32>();
    if expecting_dot {
        p.accept_all(tokens);
        (true, length)
    } else {
        p.put_current_back();
        p.put_back_all(&tokens);
        p.ensure_current();
        (false, length)
    }
}

fn try_statement(p: &mut CodeParser<'_>, top_level: bool) {
    unconditional_block(p);
    after_try_clause(p);
    if top_level {
        complete_block(p, true, true);
    }
}

fn after_try_clause(p: &mut CodeParser<'_>) {
    let whitespace = skip_to_next_important_token(p);

    if p.at_keyword(Keyword::Catch) {
        p.accept_all(whitespace);
        filterable_catch_block(p);
        after_try_clause(p);
    } else if p.at_keyword(Keyword::Finally) {
        p.accept_all(whitespace);
        unconditional_block(p);
    } else {
        p.put_current_back();
        p.put_back_all(&whitespace);
        p.set_accepted(AcceptedCharacters::ANY);
    }
}

fn filterable_catch_block(p: &mut CodeParser<'_>) {
    let block = BlockStart::at_current(p);
    p.accept_and_move_next();
    accept_spacing(p, true, true);

    // A missing condition is left for the code compiler to report.
    if !accept_condition(p) {
        return;
    }
    accept_spacing(p, true, true);

    if p.at_text(IDENTIFIER, "when") {
        p.accept_and_move_next();
        accept_spacing(p, true, true);
        if !accept_condition(p) {
            return;
        }
        accept_spacing(p, true, true);
    }

    expect_code_block(p, &block);
}

fn if_statement(p: &mut CodeParser<'_>, top_level: bool) {
    let block = BlockStart::at_current(p);
    conditional_block(p, &block);
    after_if_clause(p);
    if top_level {
        complete_block(p, true, true);
    }
}

fn after_if_clause(p: &mut CodeParser<'_>) {
    let whitespace = skip_to_next_important_token(p);

    if p.at_keyword(Keyword::Else) {
        p.accept_all(whitespace);
        else_clause(p);
    } else {
        p.put_current_back();
        p.put_back_all(&whitespace);
        p.set_accepted(AcceptedCharacters::ANY);
    }
}

fn else_clause(p: &mut CodeParser<'_>) {
    if !p.at_keyword(Keyword::Else) {
        return;
    }
    let mut block = BlockStart::at_current(p);
    p.accept_and_move_next();
    accept_spacing(p, true, true);

    if p.at_keyword(Keyword::If) {
        block.name = "else if".into();
        conditional_block(p, &block);
        after_if_clause(p);
    } else if !p.is_eof() {
        expect_code_block(p, &block);
    }
}

fn reserved_directive(p: &mut CodeParser<'_>, _top_level: bool) {
    let content = p.current_content();
    p.error(ErrorKind::ReservedWord(content), p.current_start(), p.current_len());
    p.accept_and_move_next();
    p.set_accepted(AcceptedCharacters::NONE);
    p.set_generator(SpanChunkGenerator::Null);
    p.set_block_kind(BlockKind::Directive);
    complete_block(p, true, true);
    p.output(SpanKind::MetaCode);
}

/// `@await Foo()` reads as an expression that may contain spaces.
fn await_expression(p: &mut CodeParser<'_>, top_level: bool) {
    p.accept_and_move_next();
    accept_spacing(p, false, true);
    if top_level {
        implicit_expression(p, AcceptedCharacters::ANY_EXCEPT_NEWLINE);
    }
}
