use kerf_errors::{ErrorKind, SourceLocation};
use kerf_syntax::{
    AcceptedCharacters, BlockChunkGenerator, BlockKind, DirectiveTokenKind, EditHandler,
    SpanChunkGenerator, SpanKind, TagHelperDirectiveKind,
};
use kerf_tokenizer::SyntaxKind::*;
use kerf_tokenizer::{SyntaxSet, is_newline, is_whitespace};

use super::code::{
    BalancingModes, accept_spacing, balance_pair, complete_block, namespace_or_type_name,
    qualified_identifier, request_closing_brace, resume_after_other_parser,
};
use super::markup;
use crate::parser::{CodeParser, MarkupParser, offset};
use crate::{DirectiveDescriptor, DirectiveKind, DirectiveUsage};

/// Parses the directive named by the current token, if there is one.
pub(super) fn try_parse(p: &mut CodeParser<'_>) -> bool {
    let Some(token) = p.current() else {
        return false;
    };
    if !token.is(IDENTIFIER) && !token.is(KEYWORD) {
        return false;
    }

    let tag_helper = match token.content.as_str() {
        "addTagHelper" => Some(TagHelperDirectiveKind::AddTagHelper),
        "removeTagHelper" => Some(TagHelperDirectiveKind::RemoveTagHelper),
        "tagHelperPrefix" => Some(TagHelperDirectiveKind::TagHelperPrefix),
        _ => None,
    };
    if let Some(kind) = tag_helper {
        p.set_generator(SpanChunkGenerator::Null);
        tag_helper_directive(p, kind);
        return true;
    }

    let Some(descriptor) = p.ctx.options.directive(&token.content).cloned() else {
        return false;
    };
    p.set_generator(SpanChunkGenerator::Null);
    handle_directive(p, &descriptor);
    true
}

fn token_name(kind: DirectiveTokenKind) -> &'static str {
    match kind {
        DirectiveTokenKind::Type => "type",
        DirectiveTokenKind::Namespace => "namespace",
        DirectiveTokenKind::Member => "member",
        DirectiveTokenKind::String => "string",
    }
}

/// Reports a directive that does not start its line or occurs twice.
///
/// Both diagnostics cover the `@` and the directive name.
fn check_placement(p: &mut CodeParser<'_>, name: &str, singly_occurring: bool) {
    let at = offset(p.current_start()).saturating_sub(1);
    let location = p.ctx.source.location_at(at);
    let length = name.len() as u32 + 1;

    let starts_line = p.ctx.source.text().get(..at).is_some_and(|before| {
        before.chars().rev().take_while(|c| !is_newline(*c)).all(is_whitespace)
    });
    if !starts_line {
        p.error(ErrorKind::DirectiveMustAppearAtStartOfLine(name.to_owned()), location, length);
    }

    if !p.ctx.seen_directives.insert(name.to_owned()) && singly_occurring {
        p.error(ErrorKind::DuplicateDirective(name.to_owned()), location, length);
    }
}

fn handle_directive(p: &mut CodeParser<'_>, descriptor: &DirectiveDescriptor) {
    let name = descriptor.name.clone();
    let is_section = name == "section";

    if is_section
        && p.ctx.tree.open_blocks().iter().any(|block| {
            matches!(block.generator, BlockChunkGenerator::Section { .. })
        })
    {
        let location = p.ctx.source.location_at(offset(p.current_start()).saturating_sub(1));
        p.error(ErrorKind::SectionsCannotBeNested, location, name.len() as u32 + 1);
    }
    let singly_occurring = descriptor.usage == DirectiveUsage::FileScopedSinglyOccurring;
    check_placement(p, &name, singly_occurring);

    p.set_block_kind(BlockKind::Directive);
    p.set_block_generator(BlockChunkGenerator::Directive { name: name.clone() });

    p.accept_and_move_next();
    p.output_with(SpanKind::MetaCode, AcceptedCharacters::NONE);

    for token in &descriptor.tokens {
        let separated = p.at(WHITESPACE);
        accept_spacing(p, false, true);

        p.set_generator(SpanChunkGenerator::Null);
        let kind = match token.kind {
            DirectiveTokenKind::String => SpanKind::Markup,
            _ => SpanKind::Code,
        };
        p.output_with(kind, AcceptedCharacters::WHITE_SPACE);

        if token.optional && (p.is_eof() || p.at(NEW_LINE)) {
            break;
        }
        if p.is_eof() {
            let error = ErrorKind::UnexpectedEofAfterDirective {
                directive: name,
                expected: token_name(token.kind).to_owned(),
            };
            p.error(error, p.current_start(), 1);
            return;
        }
        if !separated && !p.at(NEW_LINE) {
            let error = ErrorKind::DirectiveTokensMustBeSeparatedByWhitespace(name);
            p.error(error, p.current_start(), p.current_len());
            return;
        }

        let failure = match token.kind {
            DirectiveTokenKind::Type => (!namespace_or_type_name(p))
                .then(|| (ErrorKind::DirectiveExpectsTypeName(name.clone()), p.current_len())),
            DirectiveTokenKind::Namespace => {
                let (found, length) = qualified_identifier(p);
                (!found).then(|| (ErrorKind::DirectiveExpectsNamespace(name.clone()), length))
            }
            DirectiveTokenKind::Member => {
                if p.at(IDENTIFIER) {
                    if is_section {
                        let section = p.current_content();
                        p.set_block_generator(BlockChunkGenerator::Section { name: section });
                    }
                    p.accept_and_move_next();
                    None
                } else {
                    Some((ErrorKind::DirectiveExpectsIdentifier(name.clone()), p.current_len()))
                }
            }
            DirectiveTokenKind::String => {
                let well_formed = p.at(STRING_LITERAL)
                    && p.current().is_some_and(|token| token.diagnostics.is_empty());
                if well_formed {
                    p.accept_and_move_next();
                    None
                } else {
                    let error = ErrorKind::DirectiveExpectsQuotedStringLiteral(name.clone());
                    Some((error, p.current_len()))
                }
            }
        };
        if let Some((error, length)) = failure {
            p.error(error, p.current_start(), length);
            return;
        }

        p.set_generator(SpanChunkGenerator::DirectiveToken { kind: token.kind });
        p.span.edit_handler = EditHandler::directive_token();
        p.output_with(SpanKind::Code, AcceptedCharacters::NON_WHITE_SPACE);
    }

    accept_spacing(p, false, true);
    p.set_generator(SpanChunkGenerator::Null);

    match descriptor.kind {
        DirectiveKind::SingleLine => {
            p.optional(SEMICOLON);
            accept_spacing(p, false, true);
            if p.at(NEW_LINE) {
                p.accept_and_move_next();
            } else if !p.is_eof() {
                let error = ErrorKind::UnexpectedDirectiveLiteral {
                    directive: name,
                    expected: "line break".to_owned(),
                };
                p.error(error, p.current_start(), p.current_len());
            }
            p.output_with(SpanKind::MetaCode, AcceptedCharacters::WHITE_SPACE);
        }
        DirectiveKind::RazorBlock => {
            accept_spacing(p, true, true);
            p.output_with(SpanKind::Markup, AcceptedCharacters::ALL_WHITE_SPACE);
            directive_block(p, &name, |p, _| {
                {
                    let mut markup = MarkupParser::new(&mut *p.ctx);
                    markup::parse_razor_block(&mut markup, "{", "}");
                }
                resume_after_other_parser(p);
            });
        }
        DirectiveKind::CodeBlock => {
            accept_spacing(p, true, true);
            p.output_with(SpanKind::Markup, AcceptedCharacters::ALL_WHITE_SPACE);
            directive_block(p, &name, |p, brace| {
                p.next_token();
                let mode = BalancingModes::NO_ERROR_ON_FAILURE;
                balance_pair(p, mode, LEFT_BRACE, RIGHT_BRACE, brace);
                p.set_generator(SpanChunkGenerator::Statement);
                p.output(SpanKind::Code);
            });
        }
    }
}

/// The `{ ... }` body owned by a block directive.
fn directive_block(
    p: &mut CodeParser<'_>,
    name: &str,
    children: impl FnOnce(&mut CodeParser<'_>, SourceLocation),
) {
    if p.is_eof() {
        let error = ErrorKind::UnexpectedEofAfterDirective {
            directive: name.to_owned(),
            expected: "{".to_owned(),
        };
        p.error(error, p.current_start(), 1);
        return;
    }
    if !p.at(LEFT_BRACE) {
        let error = ErrorKind::UnexpectedDirectiveLiteral {
            directive: name.to_owned(),
            expected: "{".to_owned(),
        };
        p.error(error, p.current_start(), p.current_len());
        return;
    }

    p.span.edit_handler = EditHandler::auto_complete(true);
    let brace = p.current_start();
    if let Some(token) = p.take_current() {
        p.accept(token);
    }
    p.set_generator(SpanChunkGenerator::Null);
    p.output_with(SpanKind::MetaCode, AcceptedCharacters::NONE);

    children(p, brace);

    p.set_generator(SpanChunkGenerator::Null);
    if p.optional(RIGHT_BRACE) {
        p.set_accepted(AcceptedCharacters::NONE);
    } else {
        request_closing_brace(p);
        let error = ErrorKind::ExpectedEndOfBlockBeforeEof {
            block: name.to_owned(),
            close: '}',
            open: '{',
        };
        p.error(error, brace, 1);
    }
    complete_block(p, false, true);
    p.set_generator(SpanChunkGenerator::Null);
    p.output_with(SpanKind::MetaCode, AcceptedCharacters::NONE);
}

/// `@addTagHelper`, `@removeTagHelper` and `@tagHelperPrefix` take the rest of the line as a value.
fn tag_helper_directive(p: &mut CodeParser<'_>, kind: TagHelperDirectiveKind) {
    let keyword = p.current_content();
    let keyword_start = p.current_start();
    let keyword_length = keyword.len() as u32;
    check_placement(p, &keyword, kind == TagHelperDirectiveKind::TagHelperPrefix);

    p.accept_and_move_next();
    p.set_block_kind(BlockKind::Directive);

    // Typing inside the separating whitespace could change the directive.
    let found_whitespace = p.at(WHITESPACE);
    p.accept_while_in(SyntaxSet::new([WHITESPACE]));
    let accepted = if found_whitespace {
        AcceptedCharacters::NONE
    } else {
        AcceptedCharacters::ANY_EXCEPT_NEWLINE
    };
    p.output_with(SpanKind::MetaCode, accepted);

    let value = if p.is_eof() || p.at(NEW_LINE) {
        p.error(ErrorKind::DirectiveMustHaveValue(keyword), keyword_start, keyword_length);
        String::new()
    } else {
        let start = p.current_start();
        p.accept_until(SyntaxSet::new([NEW_LINE]));
        let raw = p.span.content().trim().to_owned();
        if raw.starts_with('"') != raw.ends_with('"') {
            p.error(ErrorKind::IncompleteQuotesAroundDirective(keyword), start, raw.len() as u32);
        }
        raw
    };

    p.set_generator(SpanChunkGenerator::TagHelperDirective { kind, value });
    complete_block(p, true, true);
    p.output_with(SpanKind::Code, AcceptedCharacters::ANY_EXCEPT_NEWLINE);
}
