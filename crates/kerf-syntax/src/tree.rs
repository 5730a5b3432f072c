//! A frozen tree plus an index for navigating it.
//!
//! Nodes themselves hold no parent links. [`SyntaxTree`] flattens the tree into a
//! preorder table once, and [`NodeRef`] handles walk that table.

use std::fmt;

use kerf_errors::{Diagnostic, SourceSpan};
use text_size::TextSize;

use crate::{
    Block, LocationShift, Span, SyntaxNode, TagBlock, TagBlockBuilder, TextChange, walk::Preorder,
};

#[derive(Debug, Clone)]
struct Entry {
    node: SyntaxNode,
    parent: Option<u32>,
    /// One past the last entry of this node's subtree.
    subtree_end: u32,
    span_ordinal: Option<u32>,
}

/// Owned syntax tree for a single document.
#[derive(Clone)]
pub struct SyntaxTree {
    entries: Vec<Entry>,
    spans: Vec<u32>,
    diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    /// Indexes `root`. `diagnostics` are the ones the parsers reported; token
    /// diagnostics are collected from the spans.
    pub fn new(root: Block, diagnostics: Vec<Diagnostic>) -> Self {
        Self::from_node(SyntaxNode::from(root), diagnostics)
    }

    fn from_node(root: SyntaxNode, diagnostics: Vec<Diagnostic>) -> Self {
        let mut tree = Self { entries: Vec::new(), spans: Vec::new(), diagnostics };
        tree.index(root, None);
        tree
    }

    fn index(&mut self, node: SyntaxNode, parent: Option<u32>) {
        let index = self.entries.len() as u32;
        let span_ordinal = node.is_span().then(|| {
            self.spans.push(index);
            self.spans.len() as u32 - 1
        });
        let children = node.children().to_vec();
        self.entries.push(Entry { node, parent, subtree_end: index + 1, span_ordinal });
        for child in children {
            self.index(child, Some(index));
        }
        self.entries[index as usize].subtree_end = self.entries.len() as u32;
    }

    /// Returns the root node.
    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { tree: self, index: 0 }
    }

    /// Returns the root block.
    pub fn root_block(&self) -> &Block {
        match &self.entries[0].node {
            SyntaxNode::Block(block) => block,
            _ => unreachable!("the root of a syntax tree is always a block"),
        }
    }

    /// Returns the node at a preorder index.
    #[inline]
    pub fn node(&self, index: usize) -> Option<NodeRef<'_>> {
        (index < self.entries.len()).then_some(NodeRef { tree: self, index: index as u32 })
    }

    /// Number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every span in document order.
    pub fn spans(&self) -> impl DoubleEndedIterator<Item = NodeRef<'_>> + '_ {
        self.spans.iter().map(|&index| NodeRef { tree: self, index })
    }

    /// Walks the whole tree in preorder.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder::new(self.root())
    }

    /// The document text the tree was built from.
    pub fn content(&self) -> String {
        self.entries[0].node.content()
    }

    /// Diagnostics reported by the parsers only.
    pub fn parser_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// All diagnostics, including the ones carried by tokens, ordered by offset.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = self.diagnostics.clone();
        diagnostics.extend(self.entries[0].node.diagnostics().cloned());
        diagnostics.sort_by_key(|diagnostic| diagnostic.span().offset());
        diagnostics
    }

    /// Finds the first span, in document order, whose edit handler claims `change`.
    pub fn locate_owner(&self, change: &TextChange) -> Option<NodeRef<'_>> {
        let first = self.spans.partition_point(|&index| {
            self.entries[index as usize].node.end_offset() < change.old_position
        });
        self.spans[first..]
            .iter()
            .map(|&index| NodeRef { tree: self, index })
            .take_while(|node| node.node().start_offset() <= change.old_position)
            .find(|node| {
                node.as_span().is_some_and(|span| span.edit_handler().owns_change(span, change))
            })
    }

    /// Returns a copy of the tree with the span at `target` replaced.
    ///
    /// Nodes before the edit are shared with `self`; nodes after it are moved by
    /// the difference between the old and the new end of the span.
    pub fn with_replaced_span(&self, target: NodeRef<'_>, replacement: Span) -> Self {
        let Some(old) = target.as_span() else {
            return self.clone();
        };
        let shift = LocationShift { old_end: old.end(), new_end: replacement.end() };
        let replacement = SyntaxNode::from(replacement);
        let root = self.rebuild(0, target.index as usize, &replacement, &shift);

        let diagnostics = self
            .diagnostics
            .iter()
            .map(|diagnostic| {
                let span = diagnostic.span();
                let location = shift.apply(span.location);
                let span = SourceSpan { location, ..span.clone() };
                Diagnostic::error(diagnostic.kind().clone(), span)
            })
            .collect();
        Self::from_node(root, diagnostics)
    }

    fn rebuild(
        &self,
        index: usize,
        target: usize,
        replacement: &SyntaxNode,
        shift: &LocationShift,
    ) -> SyntaxNode {
        let entry = &self.entries[index];
        if index == target {
            return replacement.clone();
        }
        if target < index || target >= entry.subtree_end as usize {
            return entry.node.shifted(shift);
        }

        let children = self
            .children_indices(index)
            .map(|child| self.rebuild(child, target, replacement, shift))
            .collect();
        match &entry.node {
            SyntaxNode::Span(_) => unreachable!("spans have no children"),
            SyntaxNode::Block(block) => {
                let generator = block.generator().shifted(shift);
                SyntaxNode::from(Block::new(block.kind(), generator, children))
            }
            SyntaxNode::Tag(tag) => SyntaxNode::from(rebuild_tag(tag, children, shift)),
        }
    }

    fn children_indices(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let end = self.entries[index].subtree_end as usize;
        std::iter::successors(Some(index + 1).filter(|&first| first < end), move |&child| {
            let next = self.entries[child].subtree_end as usize;
            (next < end).then_some(next)
        })
    }

    /// Checks the structural invariants: parents match containers, block
    /// lengths add up, and spans tile the document without gaps.
    pub fn is_well_formed(&self) -> bool {
        let parents_match = self.entries.iter().enumerate().all(|(index, entry)| {
            self.children_indices(index)
                .all(|child| self.entries[child].parent == Some(index as u32))
                && (entry.node.is_span()
                    || entry.node.children().iter().map(SyntaxNode::length).sum::<TextSize>()
                        == entry.node.length())
        });

        let mut expected = self.entries[0].node.start_offset();
        let tiled = self.spans().all(|node| {
            let ok = node.node().start_offset() == expected;
            expected = node.node().end_offset();
            ok
        });

        parents_match && tiled
    }
}

fn rebuild_tag(tag: &TagBlock, children: Vec<SyntaxNode>, shift: &LocationShift) -> TagBlock {
    let mut builder = TagBlockBuilder::from_tag_block(&tag.shifted(shift));
    let has_start = builder.start_tag.is_some();
    let has_end = builder.end_tag.is_some();
    let mut children = children.into_iter();
    if has_start {
        builder.start_tag = children.next().and_then(|node| node.as_block().cloned());
    }
    let mut body: Vec<SyntaxNode> = children.collect();
    if has_end {
        builder.end_tag = body.pop().and_then(|node| node.as_block().cloned());
    }
    builder.body = body;
    builder.build()
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("nodes", &self.entries.len())
            .field("spans", &self.spans.len())
            .finish_non_exhaustive()
    }
}

/// Node handle tied to the lifetime of the tree.
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t SyntaxTree,
    index: u32,
}

impl<'t> NodeRef<'t> {
    #[inline]
    fn entry(self) -> &'t Entry {
        &self.tree.entries[self.index as usize]
    }

    /// Returns the preorder index of this node.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Returns the underlying node.
    #[inline]
    pub fn node(self) -> &'t SyntaxNode {
        &self.entry().node
    }

    #[inline]
    pub fn as_span(self) -> Option<&'t Span> {
        self.node().as_span()
    }

    #[inline]
    pub fn as_block(self) -> Option<&'t Block> {
        self.node().as_block()
    }

    #[inline]
    pub fn as_tag(self) -> Option<&'t TagBlock> {
        self.node().as_tag()
    }

    /// Returns the parent node, or `None` for the root.
    #[inline]
    pub fn parent(self) -> Option<Self> {
        Some(Self { tree: self.tree, index: self.entry().parent? })
    }

    /// Returns the first child, if any.
    #[inline]
    pub fn first_child(self) -> Option<Self> {
        let next = self.index + 1;
        (next < self.entry().subtree_end).then_some(Self { tree: self.tree, index: next })
    }

    /// Returns the next sibling, if any.
    pub fn next_sibling(self) -> Option<Self> {
        let parent = self.parent()?;
        let next = self.entry().subtree_end;
        (next < parent.entry().subtree_end).then_some(Self { tree: self.tree, index: next })
    }

    /// Iterates over direct children.
    pub fn children(self) -> impl Iterator<Item = Self> {
        std::iter::successors(self.first_child(), |child| child.next_sibling())
    }

    /// Iterates from the parent up to the root.
    pub fn ancestors(self) -> impl Iterator<Item = Self> {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// Returns the span before this one in document order.
    pub fn previous_span(self) -> Option<Self> {
        let ordinal = self.entry().span_ordinal?.checked_sub(1)?;
        let index = *self.tree.spans.get(ordinal as usize)?;
        Some(Self { tree: self.tree, index })
    }

    /// Returns the span after this one in document order.
    pub fn next_span(self) -> Option<Self> {
        let ordinal = self.entry().span_ordinal? + 1;
        let index = *self.tree.spans.get(ordinal as usize)?;
        Some(Self { tree: self.tree, index })
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.index == other.index
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node();
        write!(f, "NodeRef({}@{}..{})", self.index, node.start_offset(), node.end_offset())
    }
}

#[cfg(test)]
mod tests {
    use kerf_errors::{Diagnostic, ErrorKind, SourceLocation};
    use kerf_tokenizer::{Language, tokenize_text};

    use super::SyntaxTree;
    use crate::{
        AcceptedCharacters, Block, BlockChunkGenerator, BlockKind, EditHandler, Span,
        SpanBuilder, SpanKind, SyntaxNode, TextChange,
    };

    fn span(kind: SpanKind, language: Language, text: &str, offset: u32) -> SyntaxNode {
        let location = SourceLocation::new(offset, 0, offset);
        let mut builder = SpanBuilder::new(location);
        builder.kind = kind;
        builder.edit_handler = EditHandler::new(language, AcceptedCharacters::ANY);
        if kind == SpanKind::Transition {
            builder.edit_handler.accepted = AcceptedCharacters::NONE;
        }
        for token in tokenize_text(language, text, location) {
            builder.accept(token);
        }
        builder.build().into()
    }

    /// `a @foo b`
    fn sample() -> SyntaxTree {
        let expression = Block::new(
            BlockKind::Expression,
            BlockChunkGenerator::Expression,
            vec![
                span(SpanKind::Transition, Language::Markup, "@", 2),
                span(SpanKind::Code, Language::Code, "foo", 3),
            ],
        );
        let root = Block::new(
            BlockKind::Markup,
            BlockChunkGenerator::Parent,
            vec![
                span(SpanKind::Markup, Language::Markup, "a ", 0),
                expression.into(),
                span(SpanKind::Markup, Language::Markup, " b", 6),
            ],
        );
        let diagnostic =
            Diagnostic::at(ErrorKind::MissingEndTag("b".into()), SourceLocation::new(7, 0, 7), 1);
        SyntaxTree::new(root, vec![diagnostic])
    }

    #[test]
    fn navigation() {
        let tree = sample();
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.content(), "a @foo b");
        assert!(tree.is_well_formed());

        let root = tree.root();
        let children: Vec<_> = root.children().collect();
        assert_eq!(children.len(), 3);
        assert!(children[1].as_block().is_some());
        assert_eq!(children[1].next_sibling(), Some(children[2]));
        assert_eq!(children[2].next_sibling(), None);

        let code = tree.spans().nth(2).unwrap();
        assert_eq!(code.as_span().unwrap().content(), "foo");
        assert_eq!(code.parent(), Some(children[1]));
        assert_eq!(code.ancestors().count(), 2);
        assert_eq!(code.previous_span().unwrap().as_span().unwrap().content(), "@");
        assert_eq!(code.next_span().unwrap().as_span().unwrap().content(), " b");
        assert_eq!(tree.spans().next().unwrap().previous_span(), None);
    }

    #[test]
    fn locate_owner_prefers_earlier_span_at_boundary() {
        let tree = sample();
        let owner = tree.locate_owner(&TextChange::insert(6, "bar")).unwrap();
        assert_eq!(owner.as_span().unwrap().content(), "foo");

        let owner = tree.locate_owner(&TextChange::insert(2, "x")).unwrap();
        assert_eq!(owner.as_span().unwrap().content(), "a ");

        assert!(tree.locate_owner(&TextChange::insert(20, "x")).is_none());
    }

    #[test]
    fn replacing_a_span_moves_what_follows() {
        let tree = sample();
        let change = TextChange::insert(6, "bar");
        let owner = tree.locate_owner(&change).unwrap();
        let old: &Span = owner.as_span().unwrap();
        let edited = old.edit_handler().apply_change(old, &change, true).span.unwrap();

        let updated = tree.with_replaced_span(owner, edited);
        assert_eq!(updated.content(), "a @foobar b");
        assert!(updated.is_well_formed());

        let last = updated.spans().next_back().unwrap();
        assert_eq!(last.node().start(), SourceLocation::new(9, 0, 9));
        assert_eq!(u32::from(updated.root_block().length()), 11);

        let first = updated.spans().next().unwrap();
        assert_eq!(first.node(), tree.spans().next().unwrap().node());

        let diagnostics = updated.diagnostics();
        assert_eq!(diagnostics[0].span().location, SourceLocation::new(10, 0, 10));
    }

    #[test]
    fn diagnostics_include_token_errors_in_order() {
        let root = Block::new(
            BlockKind::Markup,
            BlockChunkGenerator::Parent,
            vec![span(SpanKind::Comment, Language::Markup, "@* open", 0)],
        );
        let late =
            Diagnostic::at(ErrorKind::MissingEndTag("p".into()), SourceLocation::new(5, 0, 5), 1);
        let tree = SyntaxTree::new(root, vec![late]);

        let kinds: Vec<_> = tree.diagnostics().into_iter().map(|d| d.kind().clone()).collect();
        assert_eq!(kinds, [ErrorKind::UnterminatedComment, ErrorKind::MissingEndTag("p".into())]);
        assert_eq!(tree.parser_diagnostics().len(), 1);
    }
}
