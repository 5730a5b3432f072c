//! The immutable template syntax tree and the policies for editing it in place.
//!
//! Spans are leaves carrying tokens; blocks and tag blocks group them. Once
//! built, a tree is never mutated: partial edits produce a new tree sharing
//! every untouched node with the old one.

mod accepted;
mod block;
mod change;
mod debug;
mod descriptor;
mod edit;
mod generator;
mod node;
mod span;
mod tag;
mod tree;
mod tree_builder;
mod walk;

/// Character classes an edit may introduce.
pub use accepted::AcceptedCharacters;
pub use block::{Block, BlockBuilder, BlockKind};
/// Buffer edits and the relocation they imply.
pub use change::{LocationShift, TextChange};
/// Host-supplied tag descriptors.
pub use descriptor::{
    AttributeMatch, BoundAttribute, NoDescriptors, RequiredAttribute, TagBinding, TagDescriptor,
    TagDescriptorProvider, TagMatchingRule, TagStructure,
};
pub use edit::{EditHandler, EditHandlerKind, EditResult, PartialParseResult};
/// Opaque tags consumed by code generation.
pub use generator::{
    BlockChunkGenerator, DirectiveTokenKind, LocationTagged, SpanChunkGenerator,
    TagHelperDirectiveKind,
};
pub use node::{Spans, SyntaxNode};
pub use span::{Span, SpanBuilder, SpanKind};
pub use tag::{AttributeStructure, TagAttribute, TagBlock, TagBlockBuilder, TagMode};
/// Navigable, indexed view of a finished tree.
pub use tree::{NodeRef, SyntaxTree};
pub use tree_builder::TreeBuilder;
pub use walk::{Preorder, WalkEvent};
