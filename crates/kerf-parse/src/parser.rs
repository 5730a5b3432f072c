use std::sync::Arc;

use drop_bomb::DropBomb;
use kerf_errors::{Diagnostic, ErrorKind, SourceLocation};
use kerf_syntax::{
    AcceptedCharacters, BlockChunkGenerator, BlockKind, EditHandler, SpanBuilder,
    SpanChunkGenerator, SpanKind, SyntaxTree, TreeBuilder,
};
use kerf_tokenizer::{
    CodeTokenizer, Keyword, Language, MarkupTokenizer, SeekableSource, SyntaxKind, SyntaxSet,
    Token, Tokenize,
};
use rustc_hash::FxHashSet;
use tokio_util::sync::CancellationToken;

use crate::ParserOptions;

/// Words that start a code construct right after `@`.
const KEYWORDS: &[&str] = &[
    "tagHelperPrefix",
    "addTagHelper",
    "removeTagHelper",
    "if",
    "do",
    "try",
    "for",
    "foreach",
    "while",
    "switch",
    "lock",
    "using",
    "namespace",
    "class",
];

/// State shared by the markup and code parsers of one document.
pub(crate) struct ParserContext {
    pub(crate) source: SeekableSource,
    pub(crate) tree: TreeBuilder,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) options: ParserOptions,
    /// Implicit expressions stop before these words when they are edited in.
    pub(crate) keywords: Arc<FxHashSet<String>>,
    pub(crate) seen_directives: FxHashSet<String>,
    cancel: Option<CancellationToken>,
    /// Set by a code block ending a line; the markup parser then swallows the rest of the line.
    pub(crate) null_generate_whitespace_and_newline: bool,
    pub(crate) whitespace_is_significant_to_ancestor: bool,
}

impl ParserContext {
    pub(crate) fn new(
        source: SeekableSource,
        options: ParserOptions,
        cancel: Option<CancellationToken>,
    ) -> Self {
        let keywords = KEYWORDS
            .iter()
            .map(|word| (*word).to_owned())
            .chain(options.directives.iter().map(|directive| directive.name.clone()))
            .collect();
        Self {
            source,
            tree: TreeBuilder::new(),
            diagnostics: Vec::new(),
            options,
            keywords: Arc::new(keywords),
            seen_directives: FxHashSet::default(),
            cancel,
            null_generate_whitespace_and_newline: false,
            whitespace_is_significant_to_ancestor: false,
        }
    }

    pub(crate) fn design_time(&self) -> bool {
        self.options.design_time
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn finish(self) -> SyntaxTree {
        SyntaxTree::new(self.tree.build(), self.diagnostics)
    }
}

/// The generator and edit handler every fresh span starts with.
#[derive(Debug, Clone)]
pub(crate) struct SpanConfig {
    pub(crate) generator: SpanChunkGenerator,
    pub(crate) edit_handler: EditHandler,
}

/// A token-level parser for one language over the shared source.
///
/// The current token has been read from the source but not yet accepted into
/// the span; putting it back repositions the source at its start.
pub(crate) struct Parser<'c, T: Tokenize> {
    pub(crate) ctx: &'c mut ParserContext,
    tokenizer: T,
    current: Option<Token>,
    eof: bool,
    pub(crate) span: SpanBuilder,
    span_config: SpanConfig,
    pub(crate) nested: bool,
    /// Markup only: where the tag being parsed starts.
    pub(crate) last_tag_start: SourceLocation,
    /// Markup only: the `<` read before deciding what kind of tag follows.
    pub(crate) buffered_open_angle: Option<Token>,
}

pub(crate) type MarkupParser<'c> = Parser<'c, MarkupTokenizer>;
pub(crate) type CodeParser<'c> = Parser<'c, CodeTokenizer>;

impl<'c, T: Tokenize> Parser<'c, T> {
    pub(crate) fn new(ctx: &'c mut ParserContext) -> Self {
        let span = SpanBuilder::new(ctx.source.location());
        let span_config = SpanConfig {
            generator: SpanChunkGenerator::Null,
            edit_handler: EditHandler::new(T::LANGUAGE, AcceptedCharacters::ANY),
        };
        Self {
            ctx,
            tokenizer: T::default(),
            current: None,
            eof: false,
            span,
            span_config,
            nested: false,
            last_tag_start: SourceLocation::ZERO,
            buffered_open_angle: None,
        }
    }

    pub(crate) fn is_eof(&self) -> bool {
        self.eof
    }

    pub(crate) fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    pub(crate) fn current_kind(&self) -> Option<SyntaxKind> {
        self.current.as_ref().map(|token| token.kind)
    }

    pub(crate) fn take_current(&mut self) -> Option<Token> {
        self.current.take()
    }

    /// Reads the next token into `current`; false at the end of input or on cancellation.
    pub(crate) fn next_token(&mut self) -> bool {
        if self.ctx.is_cancelled() {
            self.current = None;
            self.eof = true;
            return false;
        }
        self.current = self.tokenizer.next_token(&mut self.ctx.source);
        self.eof = self.current.is_none();
        !self.eof
    }

    /// Reads a token if none is pending.
    pub(crate) fn ensure_current(&mut self) -> bool {
        if self.current.is_none() {
            return self.next_token();
        }
        true
    }

    pub(crate) fn at(&self, kind: SyntaxKind) -> bool {
        !self.eof && self.current.as_ref().is_some_and(|token| token.is(kind))
    }

    pub(crate) fn at_any(&self, set: SyntaxSet) -> bool {
        !self.eof && self.current.as_ref().is_some_and(|token| set.contains(token.kind))
    }

    pub(crate) fn at_keyword(&self, keyword: Keyword) -> bool {
        self.at(SyntaxKind::KEYWORD)
            && self.current.as_ref().is_some_and(|token| token.is_keyword(keyword))
    }

    pub(crate) fn at_text(&self, kind: SyntaxKind, text: &str) -> bool {
        self.at(kind) && self.current.as_ref().is_some_and(|token| token.content == text)
    }

    /// Start of the current token, or the source position when there is none.
    pub(crate) fn current_start(&self) -> SourceLocation {
        self.current.as_ref().map_or_else(|| self.ctx.source.location(), |token| token.location)
    }

    pub(crate) fn current_location(&self) -> SourceLocation {
        self.ctx.source.location()
    }

    pub(crate) fn current_len(&self) -> u32 {
        self.current.as_ref().map_or(0, |token| u32::from(token.len()))
    }

    pub(crate) fn current_content(&self) -> String {
        self.current.as_ref().map(|token| token.content.clone()).unwrap_or_default()
    }

    pub(crate) fn accept(&mut self, token: Token) {
        self.span.accept(token);
    }

    pub(crate) fn accept_all(&mut self, tokens: Vec<Token>) {
        for token in tokens {
            self.span.accept(token);
        }
    }

    pub(crate) fn accept_and_move_next(&mut self) -> bool {
        if let Some(token) = self.current.take() {
            self.span.accept(token);
        }
        self.next_token()
    }

    /// Accepts the current token when it has `kind`.
    pub(crate) fn optional(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.accept_and_move_next();
            return true;
        }
        false
    }

    /// Collects tokens while `condition` holds, leaving the first failing token current.
    pub(crate) fn read_while(&mut self, mut condition: impl FnMut(&Token) -> bool) -> Vec<Token> {
        let mut tokens = Vec::new();
        if !self.ensure_current() {
            return tokens;
        }
        while let Some(token) = self.current.take_if(|token| condition(token)) {
            tokens.push(token);
            if !self.next_token() {
                break;
            }
        }
        tokens
    }

    pub(crate) fn accept_while(&mut self, condition: impl FnMut(&Token) -> bool) {
        let tokens = self.read_while(condition);
        self.accept_all(tokens);
    }

    pub(crate) fn accept_while_in(&mut self, set: SyntaxSet) {
        self.accept_while(|token| set.contains(token.kind));
    }

    pub(crate) fn accept_until(&mut self, set: SyntaxSet) {
        self.accept_while(|token| !set.contains(token.kind));
    }

    pub(crate) fn read_while_in(&mut self, set: SyntaxSet) -> Vec<Token> {
        self.read_while(|token| set.contains(token.kind))
    }

    /// Moves the source to `position` and forgets the current token.
    pub(crate) fn seek(&mut self, position: usize) {
        self.ctx.source.seek(position);
        self.tokenizer.reset();
        self.current = None;
        self.eof = self.ctx.source.is_eof();
    }

    pub(crate) fn put_back(&mut self, token: &Token) {
        self.seek(offset(token.location));
    }

    pub(crate) fn put_back_all(&mut self, tokens: &[Token]) {
        if let Some(first) = tokens.first() {
            self.put_back(first);
        }
    }

    pub(crate) fn put_current_back(&mut self) {
        if self.eof {
            return;
        }
        if let Some(token) = self.current.take() {
            self.put_back(&token);
        }
    }

    /// The token `n` places after the current one, without moving; `lookahead(0)` is the current.
    pub(crate) fn lookahead(&mut self, n: usize) -> Option<Token> {
        let restore = match &self.current {
            Some(token) => offset(token.location),
            None => self.ctx.source.position(),
        };
        let mut found = None;
        if self.ensure_current() {
            found = self.current.clone();
            for _ in 0..n {
                if !self.next_token() {
                    found = None;
                    break;
                }
                found = self.current.clone();
            }
        }
        self.seek(restore);
        self.ensure_current();
        found
    }

    pub(crate) fn next_is(&mut self, kind: SyntaxKind) -> bool {
        self.lookahead(1).is_some_and(|token| token.is(kind))
    }

    pub(crate) fn next_is_any(&mut self, set: SyntaxSet) -> bool {
        self.lookahead(1).is_some_and(|token| set.contains(token.kind))
    }

    /// Collects tokens from the current one until `done` holds for everything
    /// read so far or input runs out, then rewinds.
    pub(crate) fn scan_ahead(&mut self, mut done: impl FnMut(&[Token]) -> bool) -> Vec<Token> {
        let restore = match &self.current {
            Some(token) => offset(token.location),
            None => self.ctx.source.position(),
        };
        let mut tokens = Vec::new();
        if self.ensure_current() {
            tokens.extend(self.current.clone());
            while !done(&tokens) && self.next_token() {
                tokens.extend(self.current.clone());
            }
        }
        self.seek(restore);
        self.ensure_current();
        tokens
    }

    pub(crate) fn set_accepted(&mut self, accepted: AcceptedCharacters) {
        self.span.edit_handler.accepted = accepted;
    }

    pub(crate) fn set_generator(&mut self, generator: SpanChunkGenerator) {
        self.span.generator = generator;
    }

    /// Finishes the pending span as `kind`; empty spans are not emitted.
    pub(crate) fn output(&mut self, kind: SpanKind) {
        self.span.kind = kind;
        if !self.span.is_empty() {
            let span = self.span.build();
            self.ctx.tree.add(span);
            self.initialize();
        }
    }

    pub(crate) fn output_with(&mut self, kind: SpanKind, accepted: AcceptedCharacters) {
        self.set_accepted(accepted);
        self.output(kind);
    }

    /// Applies the current span configuration to the pending span.
    pub(crate) fn initialize(&mut self) {
        self.span.generator = self.span_config.generator.clone();
        self.span.edit_handler = self.span_config.edit_handler.clone();
    }

    pub(crate) fn span_config(&self) -> SpanConfig {
        self.span_config.clone()
    }

    /// Runs `f` with `config` as the span configuration, then restores the old one.
    pub(crate) fn with_span_config<R>(
        &mut self,
        config: SpanConfig,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = std::mem::replace(&mut self.span_config, config);
        self.initialize();
        let result = f(self);
        self.span_config = previous;
        result
    }

    /// Puts a zero-width token in an empty span when the previous span rejects edits.
    pub(crate) fn add_marker_if_necessary(&mut self) {
        if self.span.is_empty() && self.ctx.tree.last_accepted() != AcceptedCharacters::ANY {
            let start = self.span.start();
            self.accept(Token::marker(start));
        }
    }

    pub(crate) fn start_block(&mut self, kind: BlockKind) -> BlockMarker {
        self.ctx.tree.start_block(kind);
        BlockMarker::new()
    }

    pub(crate) fn start_block_with(
        &mut self,
        kind: BlockKind,
        generator: BlockChunkGenerator,
    ) -> BlockMarker {
        self.ctx.tree.start_block(kind).generator = generator;
        BlockMarker::new()
    }

    pub(crate) fn set_block_kind(&mut self, kind: BlockKind) {
        if let Some(block) = self.ctx.tree.current_mut() {
            block.kind = kind;
        }
    }

    pub(crate) fn set_block_generator(&mut self, generator: BlockChunkGenerator) {
        if let Some(block) = self.ctx.tree.current_mut() {
            block.generator = generator;
        }
    }

    pub(crate) fn error(&mut self, kind: ErrorKind, location: SourceLocation, length: u32) {
        let file = self.ctx.source.file().cloned();
        self.ctx.diagnostics.push(Diagnostic::at(kind, location, length).with_file(file));
    }

    /// Parses `@* ... *@` into a comment block; the tokenizer reports unterminated comments.
    pub(crate) fn razor_comment(&mut self) {
        match T::LANGUAGE {
            Language::Markup => self.output(SpanKind::Markup),
            Language::Code => {
                self.add_marker_if_necessary();
                self.output(SpanKind::Code);
            }
        }

        let config = SpanConfig {
            generator: SpanChunkGenerator::Null,
            edit_handler: EditHandler::new(T::LANGUAGE, AcceptedCharacters::ANY),
        };
        self.with_span_config(config, |p| {
            let block = p.start_block_with(BlockKind::Comment, BlockChunkGenerator::RazorComment);

            p.accept_and_move_next();
            p.output_with(SpanKind::Transition, AcceptedCharacters::NONE);

            p.optional(SyntaxKind::RAZOR_COMMENT_STAR);
            p.output_with(SpanKind::MetaCode, AcceptedCharacters::NONE);

            p.optional(SyntaxKind::RAZOR_COMMENT_LITERAL);
            p.add_marker_if_necessary();
            p.output(SpanKind::Comment);

            if p.optional(SyntaxKind::RAZOR_COMMENT_STAR) {
                p.output_with(SpanKind::MetaCode, AcceptedCharacters::NONE);
            }
            if p.optional(SyntaxKind::RAZOR_COMMENT_TRANSITION) {
                p.output_with(SpanKind::Transition, AcceptedCharacters::NONE);
            }

            block.complete(p);
        });
        self.initialize();
    }
}

/// An open block; must be completed so the tree builder stays balanced.
pub(crate) struct BlockMarker {
    bomb: DropBomb,
}

impl BlockMarker {
    fn new() -> Self {
        Self { bomb: DropBomb::new("Block must be completed") }
    }

    pub(crate) fn complete<T: Tokenize>(mut self, p: &mut Parser<'_, T>) {
        self.bomb.defuse();
        p.ctx.tree.end_block();
    }
}

pub(crate) fn offset(location: SourceLocation) -> usize {
    u32::from(location.offset) as usize
}
