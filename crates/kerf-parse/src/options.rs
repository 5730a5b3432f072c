use kerf_syntax::DirectiveTokenKind;

/// What follows a directive's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// The directive ends at the end of its line.
    SingleLine,
    /// A `{ ... }` body parsed as markup.
    RazorBlock,
    /// A `{ ... }` body parsed as code.
    CodeBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DirectiveUsage {
    #[default]
    Unrestricted,
    /// A second occurrence in the same document is reported.
    FileScopedSinglyOccurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectiveTokenDescriptor {
    pub kind: DirectiveTokenKind,
    pub optional: bool,
}

/// A table entry describing one `@name ...` directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectiveDescriptor {
    pub name: String,
    pub kind: DirectiveKind,
    pub usage: DirectiveUsage,
    pub tokens: Vec<DirectiveTokenDescriptor>,
}

impl DirectiveDescriptor {
    pub fn new(name: impl Into<String>, kind: DirectiveKind) -> Self {
        Self { name: name.into(), kind, usage: DirectiveUsage::Unrestricted, tokens: Vec::new() }
    }

    pub fn token(mut self, kind: DirectiveTokenKind) -> Self {
        self.tokens.push(DirectiveTokenDescriptor { kind, optional: false });
        self
    }

    pub fn optional_token(mut self, kind: DirectiveTokenKind) -> Self {
        self.tokens.push(DirectiveTokenDescriptor { kind, optional: true });
        self
    }

    pub fn singly_occurring(mut self) -> Self {
        self.usage = DirectiveUsage::FileScopedSinglyOccurring;
        self
    }

    pub fn section() -> Self {
        Self::new("section", DirectiveKind::RazorBlock).token(DirectiveTokenKind::Member)
    }

    pub fn functions() -> Self {
        Self::new("functions", DirectiveKind::CodeBlock)
    }

    pub fn inherits() -> Self {
        Self::new("inherits", DirectiveKind::SingleLine)
            .token(DirectiveTokenKind::Type)
            .singly_occurring()
    }
}

/// Knobs shared by every parse of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Keeps whitespace around code in markup so an editor can map it back.
    pub design_time: bool,
    pub directives: Vec<DirectiveDescriptor>,
    /// Prefix bound tags must carry when the document declares none.
    pub tag_helper_prefix: Option<String>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            design_time: false,
            directives: vec![
                DirectiveDescriptor::section(),
                DirectiveDescriptor::functions(),
                DirectiveDescriptor::inherits(),
            ],
            tag_helper_prefix: None,
        }
    }
}

impl ParserOptions {
    pub fn design_time(mut self, design_time: bool) -> Self {
        self.design_time = design_time;
        self
    }

    /// Registers a directive, replacing any existing one with the same name.
    pub fn with_directive(mut self, directive: DirectiveDescriptor) -> Self {
        self.directives.retain(|existing| existing.name != directive.name);
        self.directives.push(directive);
        self
    }

    pub fn with_tag_helper_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_helper_prefix = Some(prefix.into());
        self
    }

    pub fn directive(&self, name: &str) -> Option<&DirectiveDescriptor> {
        self.directives.iter().find(|directive| directive.name == name)
    }
}
