use std::mem;

use kerf_errors::SourceLocation;
use text_size::TextSize;

use crate::{BlockChunkGenerator, LocationShift, SyntaxNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Statement,
    Directive,
    Expression,
    Markup,
    Template,
    Comment,
    Tag,
    HtmlComment,
}

/// A composite node owning its children in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    kind: BlockKind,
    generator: BlockChunkGenerator,
    children: Vec<SyntaxNode>,
    length: TextSize,
}

impl Block {
    pub fn new(kind: BlockKind, generator: BlockChunkGenerator, children: Vec<SyntaxNode>) -> Self {
        let length = children.iter().map(SyntaxNode::length).sum();
        Self { kind, generator, children, length }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn generator(&self) -> &BlockChunkGenerator {
        &self.generator
    }

    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    pub fn start(&self) -> SourceLocation {
        self.children.first().map_or(SourceLocation::ZERO, SyntaxNode::start)
    }

    pub fn length(&self) -> TextSize {
        self.length
    }

    pub fn equivalent_to(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.children.len() == other.children.len()
            && self.children.iter().zip(&other.children).all(|(a, b)| a.equivalent_to(b))
    }

    pub(crate) fn shifted(&self, shift: &LocationShift) -> Self {
        Self {
            kind: self.kind,
            generator: self.generator.shifted(shift),
            children: self.children.iter().map(|child| child.shifted(shift)).collect(),
            length: self.length,
        }
    }
}

/// Mutable staging area for a [`Block`].
#[derive(Debug, Clone)]
pub struct BlockBuilder {
    pub kind: BlockKind,
    pub generator: BlockChunkGenerator,
    children: Vec<SyntaxNode>,
}

impl BlockBuilder {
    pub fn new(kind: BlockKind) -> Self {
        Self { kind, generator: BlockChunkGenerator::Parent, children: Vec::new() }
    }

    pub fn from_block(block: &Block) -> Self {
        Self {
            kind: block.kind,
            generator: block.generator.clone(),
            children: block.children.clone(),
        }
    }

    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<SyntaxNode> {
        &mut self.children
    }

    pub fn add(&mut self, child: impl Into<SyntaxNode>) {
        self.children.push(child.into());
    }

    /// Freezes the staged block; the builder keeps its kind but loses its
    /// children and generator.
    pub fn build(&mut self) -> Block {
        Block::new(
            self.kind,
            mem::take(&mut self.generator),
            mem::take(&mut self.children),
        )
    }
}
