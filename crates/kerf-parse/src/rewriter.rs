//! Binds plain tags to host descriptors after parsing.
//!
//! Start and end tags are sibling `Tag` blocks in the parsed tree. A bound start
//! tag opens a scope that collects every following sibling until the matching end
//! tag, and the whole run becomes one [`TagBlock`].

use std::sync::Arc;

use kerf_errors::{Diagnostic, ErrorKind, SourceLocation};
use kerf_syntax::{
    AttributeStructure, Block, BlockChunkGenerator, BlockKind, SpanKind, SyntaxNode, SyntaxTree,
    TagAttribute, TagBinding, TagBlockBuilder, TagDescriptor, TagDescriptorProvider,
    TagMatchingRule, TagMode, TagStructure,
};
use tracing::trace;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link",
    "meta", "param", "source", "track", "wbr",
];

/// Rewrites bound tags in `tree` into tag blocks.
///
/// Diagnostics from the rewrite are appended to the parser's.
pub fn rewrite(
    tree: &SyntaxTree,
    provider: &dyn TagDescriptorProvider,
    file: Option<&Arc<str>>,
) -> SyntaxTree {
    let mut rewriter = Rewriter {
        provider,
        trackers: Vec::new(),
        diagnostics: Vec::new(),
        file: file.cloned(),
    };
    let root = rewriter.rewrite_block(tree.root_block(), 0);

    let mut diagnostics = tree.parser_diagnostics().to_vec();
    diagnostics.append(&mut rewriter.diagnostics);
    SyntaxTree::new(root, diagnostics)
}

/// The default [`TagDescriptorProvider`]: matches rules of a fixed descriptor list.
///
/// With a prefix, only tags spelled `{prefix}{name}` are considered, and the
/// prefix is stripped before matching.
#[derive(Debug, Clone, Default)]
pub struct TagBinder {
    descriptors: Vec<Arc<TagDescriptor>>,
    prefix: Option<String>,
}

impl TagBinder {
    pub fn new(descriptors: impl IntoIterator<Item = TagDescriptor>) -> Self {
        Self { descriptors: descriptors.into_iter().map(Arc::new).collect(), prefix: None }
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|prefix| !prefix.is_empty());
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn strip_prefix<'n>(&self, name: &'n str) -> Option<&'n str> {
        let Some(prefix) = &self.prefix else {
            return Some(name);
        };
        let head = name.get(..prefix.len())?;
        let rest = &name[prefix.len()..];
        (head.eq_ignore_ascii_case(prefix) && !rest.is_empty()).then_some(rest)
    }
}

impl TagDescriptorProvider for TagBinder {
    fn binding(
        &self,
        tag_name: &str,
        attributes: &[(String, String)],
        parent_tag: Option<&str>,
        _parent_is_bound: bool,
    ) -> Option<TagBinding> {
        let name = self.strip_prefix(tag_name)?;
        let parent = parent_tag.map(|parent| self.strip_prefix(parent).unwrap_or(parent));

        let matches: Vec<_> = self
            .descriptors
            .iter()
            .filter_map(|descriptor| {
                let rules: Vec<TagMatchingRule> = descriptor
                    .rules
                    .iter()
                    .filter(|rule| rule.matches(name, attributes, parent))
                    .cloned()
                    .collect();
                (!rules.is_empty()).then(|| (Arc::clone(descriptor), rules))
            })
            .collect();

        (!matches.is_empty()).then(|| TagBinding { tag_name: tag_name.to_owned(), matches })
    }
}

/// An open tag in the rewrite's tracker stack.
struct Tracker {
    name: String,
    /// Nesting depth of the block holding the start tag.
    depth: usize,
    bound: Option<BoundScope>,
}

struct BoundScope {
    builder: TagBlockBuilder,
    start: SourceLocation,
}

struct Rewriter<'a> {
    provider: &'a dyn TagDescriptorProvider,
    trackers: Vec<Tracker>,
    diagnostics: Vec<Diagnostic>,
    file: Option<Arc<str>>,
}

/// What a `Tag` block spells.
struct TagInfo {
    name: String,
    is_end: bool,
    /// `<!p>` opts out of binding.
    escaped: bool,
}

fn node_text(nodes: &[SyntaxNode]) -> String {
    nodes.iter().map(SyntaxNode::content).collect()
}

fn tag_info(block: &Block) -> Option<TagInfo> {
    let first = block.children().first()?;
    if first.as_span().is_some_and(|span| span.kind() == SpanKind::Transition) {
        return None;
    }
    let text = node_text(block.children());
    let rest = text.strip_prefix('<')?;
    let (is_end, rest) = match rest.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let (escaped, rest) = match rest.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let name: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && !matches!(c, '/' | '>' | '<' | '@'))
        .collect();
    (!name.is_empty()).then_some(TagInfo { name, is_end, escaped })
}

/// Name, value and quoting of an attribute block.
fn split_attribute(text: &str) -> (String, String, AttributeStructure) {
    let text = text.trim_start();
    let name_end = text.find(|c: char| c.is_whitespace() || c == '=').unwrap_or(text.len());
    let name = text[..name_end].to_owned();
    let Some(rest) = text[name_end..].trim_start().strip_prefix('=') else {
        return (name, String::new(), AttributeStructure::Minimized);
    };
    let rest = rest.trim_start();
    let quoted = |quote: char| {
        let inner = &rest[1..];
        inner.strip_suffix(quote).unwrap_or(inner).to_owned()
    };
    match rest.chars().next() {
        Some('"') => (name, quoted('"'), AttributeStructure::DoubleQuotes),
        Some('\'') => (name, quoted('\''), AttributeStructure::SingleQuotes),
        _ => (name, rest.to_owned(), AttributeStructure::NoQuotes),
    }
}

fn leading_whitespace_location(node: &SyntaxNode) -> SourceLocation {
    let text = node.content();
    let leading = text.len() - text.trim_start().len();
    node.start().advance(&text[..leading])
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(name))
}

/// The structure the matched rules ask for: the first non-default rule of each descriptor.
fn tag_structures(binding: &TagBinding) -> Vec<(&str, TagStructure)> {
    binding
        .matches
        .iter()
        .filter_map(|(descriptor, rules)| {
            rules
                .iter()
                .map(|rule| rule.tag_structure)
                .find(|structure| *structure != TagStructure::Unspecified)
                .map(|structure| (descriptor.name.as_str(), structure))
        })
        .collect()
}

fn tag_mode(start_tag_text: &str, binding: &TagBinding) -> TagMode {
    if start_tag_text.ends_with("/>") {
        return TagMode::SelfClosing;
    }
    let without_end_tag = tag_structures(binding)
        .iter()
        .any(|(_, structure)| *structure == TagStructure::WithoutEndTag);
    if without_end_tag { TagMode::StartTagOnly } else { TagMode::StartTagAndEndTag }
}

impl Rewriter<'_> {
    fn error(&mut self, kind: ErrorKind, location: SourceLocation, length: usize) {
        let diagnostic = Diagnostic::at(kind, location, length as u32).with_file(self.file.clone());
        self.diagnostics.push(diagnostic);
    }

    fn rewrite_block(&mut self, block: &Block, depth: usize) -> Block {
        let mut out = Vec::with_capacity(block.children().len());
        for child in block.children() {
            self.rewrite_node(child, depth, &mut out);
        }
        self.close_scopes(depth, &mut out);
        Block::new(block.kind(), block.generator().clone(), out)
    }

    /// Adds `node` to the innermost bound tag open at `depth`, or to `out`.
    fn emit(&mut self, node: SyntaxNode, depth: usize, out: &mut Vec<SyntaxNode>) {
        let scope = self
            .trackers
            .iter_mut()
            .rev()
            .take_while(|tracker| tracker.depth == depth)
            .find_map(|tracker| tracker.bound.as_mut());
        match scope {
            Some(scope) => scope.builder.add(node),
            None => out.push(node),
        }
    }

    fn rewrite_node(&mut self, node: &SyntaxNode, depth: usize, out: &mut Vec<SyntaxNode>) {
        match node {
            SyntaxNode::Span(span) => {
                if !span.content().trim().is_empty() {
                    self.check_non_tag_content(node);
                }
                self.emit(node.clone(), depth, out);
            }
            SyntaxNode::Block(block) if block.kind() == BlockKind::Tag => {
                match tag_info(block) {
                    Some(info) if info.is_end => self.end_tag(block, info, depth, out),
                    Some(info) => self.start_tag(block, info, depth, out),
                    None => self.emit(node.clone(), depth, out),
                }
            }
            SyntaxNode::Block(block) => {
                let rewritten = self.rewrite_block(block, depth + 1);
                self.emit(rewritten.into(), depth, out);
            }
            SyntaxNode::Tag(_) => self.emit(node.clone(), depth, out),
        }
    }

    fn parent(&self) -> Option<&Tracker> {
        self.trackers.last()
    }

    /// The innermost open tag when it is bound and restricts its children.
    fn restricting_parent(&self) -> Option<(String, Vec<String>)> {
        let tracker = self.trackers.last()?;
        let binding = tracker.bound.as_ref()?.builder.binding.as_ref()?;
        let allowed = binding.allowed_children()?.into_iter().map(str::to_owned).collect();
        Some((tracker.name.clone(), allowed))
    }

    fn check_non_tag_content(&mut self, node: &SyntaxNode) {
        let Some((parent, allowed)) = self.restricting_parent() else {
            return;
        };
        let error = ErrorKind::CannotHaveNonTagContent { parent, allowed: allowed.join(", ") };
        let length = node.content().trim().len();
        self.error(error, leading_whitespace_location(node), length);
    }

    fn check_allowed_child(&mut self, name: &str, location: SourceLocation) {
        let Some((parent, allowed)) = self.restricting_parent() else {
            return;
        };
        if allowed.iter().any(|child| child.eq_ignore_ascii_case(name)) {
            return;
        }
        let error = ErrorKind::InvalidNestedTag {
            tag: name.to_owned(),
            parent,
            allowed: allowed.join(", "),
        };
        self.error(error, location, name.len());
    }

    fn start_tag(&mut self, block: &Block, info: TagInfo, depth: usize, out: &mut Vec<SyntaxNode>) {
        let name_location = block.start().advance("<");
        if info.escaped {
            self.plain_start_tag(block, info, depth, out);
            return;
        }

        let attributes: Vec<(String, String)> = block
            .children()
            .iter()
            .filter(|child| child.as_block().is_some_and(|b| b.kind() == BlockKind::Markup))
            .map(|child| {
                let (name, value, _) = split_attribute(&child.content());
                (name, value)
            })
            .collect();
        let parent = self.parent();
        let parent_name = parent.map(|tracker| tracker.name.clone());
        let parent_is_bound = parent.is_some_and(|tracker| tracker.bound.is_some());
        let binding =
            self.provider.binding(&info.name, &attributes, parent_name.as_deref(), parent_is_bound);

        let Some(binding) = binding else {
            self.plain_start_tag(block, info, depth, out);
            return;
        };
        trace!(tag = %info.name, descriptors = binding.matches.len(), "bound tag");
        self.check_allowed_child(&info.name, name_location);

        let text = node_text(block.children());
        if !text.ends_with('>') {
            let error = ErrorKind::TagHelperMissingCloseAngle(info.name.clone());
            self.error(error, name_location, info.name.len());
        }
        self.check_tag_structure(&binding, &info.name, name_location);

        let mode = tag_mode(&text, &binding);
        let mut builder = TagBlockBuilder::new(info.name.clone(), block.clone());
        builder.tag_mode = mode;
        builder.attributes = self.bound_attributes(block, &info.name, &binding);
        builder.binding = Some(Arc::new(binding));

        if mode == TagMode::StartTagAndEndTag {
            let scope = BoundScope { builder, start: block.start() };
            self.trackers.push(Tracker { name: info.name, depth, bound: Some(scope) });
        } else {
            self.emit(builder.build().into(), depth, out);
        }
    }

    fn plain_start_tag(
        &mut self,
        block: &Block,
        info: TagInfo,
        depth: usize,
        out: &mut Vec<SyntaxNode>,
    ) {
        let name = if info.escaped { format!("!{}", info.name) } else { info.name };
        self.check_allowed_child(&name, block.start().advance("<"));
        self.emit(block.clone().into(), depth, out);

        let self_closing = node_text(block.children()).ends_with("/>");
        if !self_closing && !is_void(&name) {
            self.trackers.push(Tracker { name, depth, bound: None });
        }
    }

    fn check_tag_structure(&mut self, binding: &TagBinding, tag: &str, location: SourceLocation) {
        let structures = tag_structures(binding);
        let Some((first, expected)) = structures.first().copied() else {
            return;
        };
        if let Some((second, _)) = structures.iter().find(|(_, structure)| *structure != expected)
        {
            let error = ErrorKind::InconsistentTagStructure {
                first: first.to_owned(),
                second: (*second).to_owned(),
                tag: tag.to_owned(),
            };
            self.error(error, location, tag.len());
        }
    }

    /// Types the start tag's attributes against the binding.
    ///
    /// Attribute parsing stops at the first piece of code or stray text in
    /// the tag; the remaining attributes are left untyped.
    fn bound_attributes(
        &mut self,
        block: &Block,
        tag: &str,
        binding: &TagBinding,
    ) -> Vec<TagAttribute> {
        let mut attributes = Vec::new();
        for (index, child) in block.children().iter().enumerate() {
            match child {
                SyntaxNode::Block(attribute) if attribute.kind() == BlockKind::Markup => {
                    attributes.push(self.bound_attribute(child, attribute, tag, binding));
                }
                SyntaxNode::Block(code) if code.kind() != BlockKind::Comment => {
                    let error = ErrorKind::TagHelpersCannotHaveCodeInTagDeclaration(tag.to_owned());
                    self.error(error, child.start(), u32::from(code.length()) as usize);
                    break;
                }
                SyntaxNode::Span(span) if index > 0 => {
                    let content = span.content();
                    let stray = content.trim_end_matches(['>', '/']).trim();
                    if !stray.is_empty() {
                        let error = ErrorKind::TagHelperAttributeListMustBeWellFormed;
                        self.error(error, leading_whitespace_location(child), stray.len());
                        break;
                    }
                }
                _ => {}
            }
        }
        attributes
    }

    fn bound_attribute(
        &mut self,
        node: &SyntaxNode,
        attribute: &Block,
        tag: &str,
        binding: &TagBinding,
    ) -> TagAttribute {
        let (name, value_text, structure) = split_attribute(&node.content());
        let location = leading_whitespace_location(node);

        let value = (structure != AttributeStructure::Minimized).then(|| {
            let children = attribute.children();
            let quoted = matches!(
                structure,
                AttributeStructure::DoubleQuotes | AttributeStructure::SingleQuotes
            );
            let end = children.len() - usize::from(quoted && children.len() > 1);
            let value_nodes = children.get(1..end).unwrap_or_default().to_vec();
            let is_string = binding
                .bound_attribute(&name)
                .is_none_or(|found| found.attribute.is_string);
            let kind = if is_string { BlockKind::Markup } else { BlockKind::Expression };
            SyntaxNode::from(Block::new(kind, BlockChunkGenerator::Parent, value_nodes))
        });

        if let Some(found) = binding.bound_attribute(&name) {
            let bound = found.attribute;
            let empty = match structure {
                AttributeStructure::Minimized => !bound.is_boolean,
                _ => !bound.is_string && value_text.trim().is_empty(),
            };
            if empty {
                let error = ErrorKind::EmptyBoundAttribute {
                    attribute: name.clone(),
                    tag: tag.to_owned(),
                    type_name: bound.type_name.clone(),
                };
                self.error(error, location, name.len());
            }
            let missing_key = found.is_indexer
                && bound.indexer_prefix.as_ref().is_some_and(|prefix| prefix.len() == name.len());
            if missing_key {
                let error = ErrorKind::IndexerAttributeNameMustIncludeKey {
                    attribute: name.clone(),
                    tag: tag.to_owned(),
                };
                self.error(error, location, name.len());
            }
        }

        TagAttribute { name, value, structure }
    }

    fn end_tag(&mut self, block: &Block, info: TagInfo, depth: usize, out: &mut Vec<SyntaxNode>) {
        let name = if info.escaped { format!("!{}", info.name) } else { info.name };
        let position = self
            .trackers
            .iter()
            .rposition(|tracker| {
                tracker.depth == depth && tracker.name.eq_ignore_ascii_case(&name)
            });

        let Some(position) = position else {
            self.check_end_tag_allowed(&name, block.start().advance("</"));
            self.emit(block.clone().into(), depth, out);
            return;
        };

        while self.trackers.len() > position + 1 {
            self.close_unmatched(out);
        }
        let Some(tracker) = self.trackers.pop() else {
            return;
        };
        match tracker.bound {
            Some(mut scope) => {
                scope.builder.end_tag = Some(block.clone());
                self.emit(scope.builder.build().into(), depth, out);
            }
            None => self.emit(block.clone().into(), depth, out),
        }
    }

    /// An end tag for a tag whose descriptors forbid one.
    fn check_end_tag_allowed(&mut self, name: &str, location: SourceLocation) {
        let parent = self.parent().map(|tracker| tracker.name.clone());
        let Some(binding) = self.provider.binding(name, &[], parent.as_deref(), false) else {
            return;
        };
        let structures = tag_structures(&binding);
        let forbidding = structures
            .iter()
            .find(|(_, structure)| *structure == TagStructure::WithoutEndTag);
        if let Some((helper, _)) = forbidding {
            let error = ErrorKind::TagHelperMustNotHaveAnEndTag {
                tag: name.to_owned(),
                helper: (*helper).to_owned(),
            };
            self.error(error, location, name.len());
        }
    }

    /// Pops the top tracker; a bound one is reported and emitted without an end tag.
    fn close_unmatched(&mut self, out: &mut Vec<SyntaxNode>) {
        let Some(tracker) = self.trackers.pop() else {
            return;
        };
        if let Some(mut scope) = tracker.bound {
            let error = ErrorKind::MalformedTagHelper(tracker.name.clone());
            self.error(error, scope.start.advance("<"), tracker.name.len());
            self.emit(scope.builder.build().into(), tracker.depth, out);
        }
    }

    /// Closes every tag still open at the end of the block at `depth`.
    fn close_scopes(&mut self, depth: usize, out: &mut Vec<SyntaxNode>) {
        while self.trackers.last().is_some_and(|tracker| tracker.depth == depth) {
            self.close_unmatched(out);
        }
    }
}
