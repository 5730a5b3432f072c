use std::sync::Arc;

use kerf_errors::{Diagnostic, SourceLocation};
use text_size::TextSize;

use crate::{Block, LocationShift, Span, TagBlock};

/// A tree node: a leaf span, a block, or a tag block produced by rewriting.
///
/// Nodes are immutable and shared; cloning only bumps a reference count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxNode {
    Span(Arc<Span>),
    Block(Arc<Block>),
    Tag(Arc<TagBlock>),
}

impl From<Span> for SyntaxNode {
    fn from(span: Span) -> Self {
        Self::Span(Arc::new(span))
    }
}

impl From<Block> for SyntaxNode {
    fn from(block: Block) -> Self {
        Self::Block(Arc::new(block))
    }
}

impl From<TagBlock> for SyntaxNode {
    fn from(tag: TagBlock) -> Self {
        Self::Tag(Arc::new(tag))
    }
}

impl SyntaxNode {
    pub fn start(&self) -> SourceLocation {
        match self {
            Self::Span(span) => span.start(),
            Self::Block(block) => block.start(),
            Self::Tag(tag) => tag.start(),
        }
    }

    pub fn length(&self) -> TextSize {
        match self {
            Self::Span(span) => span.length(),
            Self::Block(block) => block.length(),
            Self::Tag(tag) => tag.length(),
        }
    }

    pub fn start_offset(&self) -> usize {
        u32::from(self.start().offset) as usize
    }

    pub fn end_offset(&self) -> usize {
        self.start_offset() + u32::from(self.length()) as usize
    }

    pub fn children(&self) -> &[SyntaxNode] {
        match self {
            Self::Span(_) => &[],
            Self::Block(block) => block.children(),
            Self::Tag(tag) => tag.children(),
        }
    }

    pub fn as_span(&self) -> Option<&Span> {
        match self {
            Self::Span(span) => Some(span),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Self::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> Option<&TagBlock> {
        match self {
            Self::Tag(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_span(&self) -> bool {
        matches!(self, Self::Span(_))
    }

    /// The concatenated content of every span below this node.
    pub fn content(&self) -> String {
        self.spans().map(Span::content).collect()
    }

    /// Every leaf span below this node, in document order.
    pub fn spans(&self) -> Spans<'_> {
        Spans { stack: vec![std::slice::from_ref(self).iter()] }
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.spans().flat_map(Span::diagnostics)
    }

    pub fn equivalent_to(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Span(a), Self::Span(b)) => a.equivalent_to(b),
            (Self::Block(a), Self::Block(b)) => a.equivalent_to(b),
            (Self::Tag(a), Self::Tag(b)) => a.equivalent_to(b),
            _ => false,
        }
    }

    pub(crate) fn shifted(&self, shift: &LocationShift) -> Self {
        if shift.is_identity() || self.end_offset() < u32::from(shift.old_end.offset) as usize {
            return self.clone();
        }
        match self {
            Self::Span(span) => Self::Span(Arc::new(span.shifted(shift))),
            Self::Block(block) => Self::Block(Arc::new(block.shifted(shift))),
            Self::Tag(tag) => Self::Tag(Arc::new(tag.shifted(shift))),
        }
    }
}

pub struct Spans<'a> {
    stack: Vec<std::slice::Iter<'a, SyntaxNode>>,
}

impl<'a> Iterator for Spans<'a> {
    type Item = &'a Span;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(SyntaxNode::Span(span)) => return Some(span),
                Some(node) => self.stack.push(node.children().iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
