use std::mem;
use std::sync::Arc;

use kerf_errors::SourceLocation;
use text_size::TextSize;

use crate::{Block, LocationShift, SyntaxNode, TagBinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagMode {
    SelfClosing,
    #[default]
    StartTagAndEndTag,
    StartTagOnly,
}

/// How an attribute value was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeStructure {
    Minimized,
    DoubleQuotes,
    SingleQuotes,
    NoQuotes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAttribute {
    pub name: String,
    pub value: Option<SyntaxNode>,
    pub structure: AttributeStructure,
}

impl TagAttribute {
    fn equivalent_to(&self, other: &Self) -> bool {
        self.name == other.name
            && self.structure == other.structure
            && match (&self.value, &other.value) {
                (Some(a), Some(b)) => a.equivalent_to(b),
                (None, None) => true,
                _ => false,
            }
    }
}

/// A tag bound to external descriptors by the tag-rewriting pass.
///
/// `children` holds the original start tag, the body and, when present, the
/// original end tag, so the node still covers every character of its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBlock {
    tag_name: String,
    tag_mode: TagMode,
    attributes: Vec<TagAttribute>,
    binding: Option<Arc<TagBinding>>,
    children: Vec<SyntaxNode>,
    has_start_tag: bool,
    has_end_tag: bool,
    length: TextSize,
}

impl TagBlock {
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn tag_mode(&self) -> TagMode {
        self.tag_mode
    }

    pub fn attributes(&self) -> &[TagAttribute] {
        &self.attributes
    }

    pub fn binding(&self) -> Option<&TagBinding> {
        self.binding.as_deref()
    }

    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    pub fn source_start_tag(&self) -> Option<&Block> {
        if self.has_start_tag { self.children.first().and_then(SyntaxNode::as_block) } else { None }
    }

    pub fn source_end_tag(&self) -> Option<&Block> {
        if self.has_end_tag { self.children.last().and_then(SyntaxNode::as_block) } else { None }
    }

    /// The children between the start and end tags.
    pub fn body(&self) -> &[SyntaxNode] {
        let start = usize::from(self.has_start_tag);
        let end = self.children.len() - usize::from(self.has_end_tag);
        self.children.get(start..end).unwrap_or_default()
    }

    pub fn start(&self) -> SourceLocation {
        self.children.first().map_or(SourceLocation::ZERO, SyntaxNode::start)
    }

    pub fn length(&self) -> TextSize {
        self.length
    }

    pub fn equivalent_to(&self, other: &Self) -> bool {
        self.tag_name == other.tag_name
            && self.tag_mode == other.tag_mode
            && self.binding.is_some() == other.binding.is_some()
            && self.attributes.len() == other.attributes.len()
            && self.attributes.iter().zip(&other.attributes).all(|(a, b)| a.equivalent_to(b))
            && self.children.len() == other.children.len()
            && self.children.iter().zip(&other.children).all(|(a, b)| a.equivalent_to(b))
    }

    pub(crate) fn shifted(&self, shift: &LocationShift) -> Self {
        Self {
            tag_name: self.tag_name.clone(),
            tag_mode: self.tag_mode,
            attributes: self
                .attributes
                .iter()
                .map(|attribute| TagAttribute {
                    name: attribute.name.clone(),
                    value: attribute.value.as_ref().map(|value| value.shifted(shift)),
                    structure: attribute.structure,
                })
                .collect(),
            binding: self.binding.clone(),
            children: self.children.iter().map(|child| child.shifted(shift)).collect(),
            has_start_tag: self.has_start_tag,
            has_end_tag: self.has_end_tag,
            length: self.length,
        }
    }
}

/// Mutable staging area for a [`TagBlock`].
#[derive(Debug, Clone, Default)]
pub struct TagBlockBuilder {
    pub tag_name: String,
    pub tag_mode: TagMode,
    pub attributes: Vec<TagAttribute>,
    pub binding: Option<Arc<TagBinding>>,
    pub start_tag: Option<Block>,
    pub end_tag: Option<Block>,
    pub body: Vec<SyntaxNode>,
}

impl TagBlockBuilder {
    pub fn new(tag_name: impl Into<String>, start_tag: Block) -> Self {
        Self { tag_name: tag_name.into(), start_tag: Some(start_tag), ..Self::default() }
    }

    pub fn from_tag_block(block: &TagBlock) -> Self {
        Self {
            tag_name: block.tag_name.clone(),
            tag_mode: block.tag_mode,
            attributes: block.attributes.clone(),
            binding: block.binding.clone(),
            start_tag: block.source_start_tag().cloned(),
            end_tag: block.source_end_tag().cloned(),
            body: block.body().to_vec(),
        }
    }

    pub fn add(&mut self, child: impl Into<SyntaxNode>) {
        self.body.push(child.into());
    }

    /// Freezes the staged tag and resets the builder to a blank state.
    pub fn build(&mut self) -> TagBlock {
        let Self { tag_name, tag_mode, attributes, binding, start_tag, end_tag, body } =
            mem::take(self);

        let has_start_tag = start_tag.is_some();
        let has_end_tag = end_tag.is_some();
        let mut children = Vec::with_capacity(body.len() + 2);
        children.extend(start_tag.map(SyntaxNode::from));
        children.extend(body);
        children.extend(end_tag.map(SyntaxNode::from));
        let length = children.iter().map(SyntaxNode::length).sum();

        TagBlock {
            tag_name,
            tag_mode,
            attributes,
            binding,
            children,
            has_start_tag,
            has_end_tag,
            length,
        }
    }
}
