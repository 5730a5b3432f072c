//! Parses template documents into [`SyntaxTree`]s.
//!
//! The markup parser drives a document and hands each `@` to the code parser,
//! which hands embedded markup back. [`rewrite`] then binds tags to host
//! descriptors.

mod grammar;
mod options;
mod parser;
mod rewriter;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use kerf_syntax::{SpanChunkGenerator, SyntaxTree, TagDescriptor, TagHelperDirectiveKind};
use kerf_tokenizer::SeekableSource;
pub use options::{
    DirectiveDescriptor, DirectiveKind, DirectiveTokenDescriptor, DirectiveUsage, ParserOptions,
};
pub use rewriter::{TagBinder, rewrite};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::parser::{MarkupParser, ParserContext};

/// Parses `text` as a whole document.
pub fn parse(text: &str, options: &ParserOptions) -> SyntaxTree {
    let mut ctx = ParserContext::new(SeekableSource::new(text), options.clone(), None);
    parse_document(&mut ctx);
    ctx.finish()
}

/// Parses a document, giving up with `None` once `cancel` fires.
pub fn parse_source(
    source: SeekableSource,
    options: ParserOptions,
    cancel: Option<CancellationToken>,
) -> Option<SyntaxTree> {
    let mut ctx = ParserContext::new(source, options, cancel);
    parse_document(&mut ctx);
    if ctx.is_cancelled() {
        debug!("parse cancelled");
        return None;
    }
    Some(ctx.finish())
}

fn parse_document(ctx: &mut ParserContext) {
    let mut parser = MarkupParser::new(ctx);
    grammar::markup::parse_document(&mut parser);
}

/// The prefix declared by the document's `@tagHelperPrefix`, unquoted.
pub fn tag_helper_prefix(tree: &SyntaxTree) -> Option<String> {
    tree.spans().filter_map(|node| node.as_span()).find_map(|span| match span.generator() {
        SpanChunkGenerator::TagHelperDirective {
            kind: TagHelperDirectiveKind::TagHelperPrefix,
            value,
        } => Some(value.trim_matches('"').to_owned()),
        _ => None,
    })
}

/// Parses `text` and binds its tags against `descriptors`.
///
/// A prefix declared in the document wins over the one in `options`.
pub fn parse_and_bind(
    text: &str,
    options: &ParserOptions,
    descriptors: impl IntoIterator<Item = TagDescriptor>,
    file: Option<&Arc<str>>,
) -> SyntaxTree {
    let tree = parse(text, options);
    let prefix = tag_helper_prefix(&tree).or_else(|| options.tag_helper_prefix.clone());
    let binder = TagBinder::new(descriptors).with_prefix(prefix);
    rewrite(&tree, &binder, file)
}
