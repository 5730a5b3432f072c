use std::sync::Arc;

use crate::{AcceptedCharacters, Block, BlockBuilder, BlockKind, Span, SyntaxNode};

/// Assembles a tree from a stack of open blocks.
///
/// Ending the last open block leaves it in place as the root; [`build`](Self::build)
/// requires exactly that one frame.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    stack: Vec<BlockBuilder>,
    last_span: Option<Arc<Span>>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_block(&mut self, kind: BlockKind) -> &mut BlockBuilder {
        self.push(BlockBuilder::new(kind))
    }

    pub fn push(&mut self, builder: BlockBuilder) -> &mut BlockBuilder {
        self.stack.push(builder);
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn end_block(&mut self) {
        assert!(!self.stack.is_empty(), "end_block called without an open block");
        if self.stack.len() == 1 {
            return;
        }
        if let Some(mut builder) = self.stack.pop() {
            let block = builder.build();
            self.add(block);
        }
    }

    /// Appends a finished node to the innermost open block.
    pub fn add(&mut self, node: impl Into<SyntaxNode>) {
        let node = node.into();
        if let SyntaxNode::Span(span) = &node {
            self.last_span = Some(Arc::clone(span));
        }
        let Some(top) = self.stack.last_mut() else {
            panic!("add called without an open block");
        };
        top.add(node);
    }

    pub fn current(&self) -> Option<&BlockBuilder> {
        self.stack.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut BlockBuilder> {
        self.stack.last_mut()
    }

    pub fn current_kind(&self) -> Option<BlockKind> {
        self.current().map(|builder| builder.kind)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Open block kinds from the root inwards.
    pub fn open_kinds(&self) -> impl Iterator<Item = BlockKind> + '_ {
        self.stack.iter().map(|builder| builder.kind)
    }

    pub fn open_blocks(&self) -> &[BlockBuilder] {
        &self.stack
    }

    pub fn last_span(&self) -> Option<&Span> {
        self.last_span.as_deref()
    }

    /// What the most recently added span accepts; `NONE` before the first span.
    pub fn last_accepted(&self) -> AcceptedCharacters {
        self.last_span().map_or(AcceptedCharacters::NONE, |span| span.edit_handler().accepted)
    }

    pub fn build(mut self) -> Block {
        assert_eq!(self.stack.len(), 1, "a tree needs exactly one open root block to build");
        let Some(mut root) = self.stack.pop() else {
            panic!("a tree needs exactly one open root block to build");
        };
        root.build()
    }
}
