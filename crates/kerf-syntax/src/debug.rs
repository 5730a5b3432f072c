//! Indented text rendering of a tree, used by golden tests and the `kerf` binary.

use std::fmt::{self, Write as _};

use crate::{BlockChunkGenerator, EditHandlerKind, Span, SyntaxNode, SyntaxTree, TagBlock};

impl SyntaxTree {
    pub fn debug_dump(&self) -> String {
        self.root().node().debug_dump()
    }
}

impl SyntaxNode {
    pub fn debug_dump(&self) -> String {
        let mut out = String::new();
        // Writing into a `String` cannot fail.
        let _ = write_node(&mut out, self, 0);
        out
    }
}

fn write_node(out: &mut String, node: &SyntaxNode, depth: usize) -> fmt::Result {
    let indent = depth * 2;
    let (start, end) = (node.start_offset(), node.end_offset());
    match node {
        SyntaxNode::Span(span) => {
            write!(out, "{:indent$}{:?}Span@{start}..{end} ", "", span.kind())?;
            write_span(out, span)?;
        }
        SyntaxNode::Block(block) => {
            write!(out, "{:indent$}{:?}Block@{start}..{end}", "", block.kind())?;
            if !matches!(block.generator(), BlockChunkGenerator::Parent) {
                write!(out, " {}", block.generator())?;
            }
            writeln!(out)?;
        }
        SyntaxNode::Tag(tag) => write_tag(out, tag, depth, start, end)?,
    }

    node.children().iter().try_for_each(|child| write_node(out, child, depth + 1))
}

fn write_span(out: &mut String, span: &Span) -> fmt::Result {
    let handler = span.edit_handler();
    write!(out, "{:?} {} {}", span.content(), span.generator(), handler.accepted.name())?;
    match &handler.kind {
        EditHandlerKind::Default => {}
        EditHandlerKind::ImplicitExpression { accept_trailing_dot, .. } => {
            write!(out, " ImplicitExpression")?;
            if *accept_trailing_dot {
                write!(out, "(trailing dot)")?;
            }
        }
        EditHandlerKind::CodeBlock => write!(out, " CodeBlock")?,
        EditHandlerKind::AutoComplete { auto_complete_string, .. } => {
            write!(out, " AutoComplete")?;
            if let Some(text) = auto_complete_string {
                write!(out, "({text:?})")?;
            }
        }
        EditHandlerKind::DirectiveToken => write!(out, " DirectiveToken")?,
    }
    writeln!(out)
}

fn write_tag(
    out: &mut String,
    tag: &TagBlock,
    depth: usize,
    start: usize,
    end: usize,
) -> fmt::Result {
    let indent = depth * 2;
    let (name, mode) = (tag.tag_name(), tag.tag_mode());
    write!(out, "{:indent$}TagBlock@{start}..{end} <{name}> {mode:?}", "")?;
    if let Some(binding) = tag.binding() {
        let names: Vec<&str> = binding.descriptors().map(|d| d.name.as_str()).collect();
        write!(out, " bound to {}", names.join(", "))?;
    }
    writeln!(out)?;

    let inner = indent + 2;
    for attribute in tag.attributes() {
        writeln!(out, "{:inner$}attribute {} {:?}", "", attribute.name, attribute.structure)?;
        if let Some(value) = &attribute.value {
            write_node(out, value, depth + 2)?;
        }
    }
    Ok(())
}
