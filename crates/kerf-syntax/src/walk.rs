use crate::NodeRef;

pub struct Preorder<'t> {
    start: NodeRef<'t>,
    next: Option<WalkEvent<'t>>,
    skip_subtree: bool,
}

impl<'t> Preorder<'t> {
    pub fn new(start: NodeRef<'t>) -> Self {
        Self { start, next: Some(WalkEvent::Enter(start)), skip_subtree: false }
    }

    /// Skips the children of the node entered last.
    pub fn skip_subtree(&mut self) {
        self.skip_subtree = true;
    }
}

impl<'t> Iterator for Preorder<'t> {
    type Item = WalkEvent<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.skip_subtree {
            self.next = self.next.take().and_then(|next| match next {
                WalkEvent::Enter(first_child) => first_child.parent().map(WalkEvent::Leave),
                leave => Some(leave),
            });
            self.skip_subtree = false;
        }

        let next = self.next.take();

        self.next = next.and_then(|event| {
            Some(match event {
                WalkEvent::Enter(node) => match node.first_child() {
                    Some(child) => WalkEvent::Enter(child),
                    None => WalkEvent::Leave(node),
                },
                WalkEvent::Leave(node) => {
                    if node == self.start {
                        return None;
                    }

                    match node.next_sibling() {
                        Some(sibling) => WalkEvent::Enter(sibling),
                        None => WalkEvent::Leave(node.parent()?),
                    }
                }
            })
        });

        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEvent<'t> {
    Enter(NodeRef<'t>),
    Leave(NodeRef<'t>),
}

impl<'t> WalkEvent<'t> {
    pub fn node(self) -> NodeRef<'t> {
        match self {
            Self::Enter(node) | Self::Leave(node) => node,
        }
    }
}

#[cfg(test)]
mod tests {
    use kerf_errors::SourceLocation;
    use kerf_tokenizer::{SyntaxKind, Token};

    use super::WalkEvent;
    use crate::{Block, BlockChunkGenerator, BlockKind, SpanBuilder, SyntaxNode, SyntaxTree};

    fn text(content: &str, offset: u32) -> SyntaxNode {
        let mut builder = SpanBuilder::new(SourceLocation::new(offset, 0, offset));
        builder.accept(Token::new(
            SyntaxKind::TEXT,
            content,
            SourceLocation::new(offset, 0, offset),
        ));
        builder.build().into()
    }

    fn tree() -> SyntaxTree {
        let inner = Block::new(BlockKind::Tag, BlockChunkGenerator::Parent, vec![text("b", 1)]);
        let root = Block::new(
            BlockKind::Markup,
            BlockChunkGenerator::Parent,
            vec![text("a", 0), inner.into(), text("c", 2)],
        );
        SyntaxTree::new(root, Vec::new())
    }

    fn render(event: WalkEvent<'_>) -> String {
        let name = match event.node().node() {
            SyntaxNode::Span(span) => span.content().to_owned(),
            SyntaxNode::Block(block) => format!("{:?}", block.kind()),
            SyntaxNode::Tag(tag) => tag.tag_name().to_owned(),
        };
        match event {
            WalkEvent::Enter(_) => format!("+{name}"),
            WalkEvent::Leave(_) => format!("-{name}"),
        }
    }

    #[test]
    fn walks_in_document_order() {
        let tree = tree();
        let events: Vec<_> = tree.preorder().map(render).collect();
        assert_eq!(
            events,
            ["+Markup", "+a", "-a", "+Tag", "+b", "-b", "-Tag", "+c", "-c", "-Markup"]
        );
    }

    #[test]
    fn skip_subtree_leaves_immediately() {
        let tree = tree();
        let mut walk = tree.preorder();
        let mut events = Vec::new();
        while let Some(event) = walk.next() {
            let is_tag = |node: crate::NodeRef<'_>| {
                node.as_block().is_some_and(|block| block.kind() == BlockKind::Tag)
            };
            if matches!(event, WalkEvent::Enter(node) if is_tag(node)) {
                walk.skip_subtree();
            }
            events.push(render(event));
        }
        assert_eq!(events, ["+Markup", "+a", "-a", "+Tag", "-Tag", "+c", "-c", "-Markup"]);
    }

    #[test]
    fn walk_from_inner_node_stops_there() {
        let tree = tree();
        let inner = tree.root().children().nth(1).unwrap();
        let events: Vec<_> = super::Preorder::new(inner).map(render).collect();
        assert_eq!(events, ["+Tag", "+b", "-b", "-Tag"]);
    }
}
