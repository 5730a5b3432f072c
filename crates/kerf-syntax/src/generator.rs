//! Opaque tags for downstream code generation.
//!
//! The front end never interprets these beyond storing and relocating them.

use std::fmt;

use kerf_errors::SourceLocation;

use crate::LocationShift;

/// A value together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationTagged<T> {
    pub value: T,
    pub location: SourceLocation,
}

impl<T> LocationTagged<T> {
    pub fn new(value: T, location: SourceLocation) -> Self {
        Self { value, location }
    }

    fn shifted(&self, shift: &LocationShift) -> Self
    where
        T: Clone,
    {
        Self { value: self.value.clone(), location: shift.apply(self.location) }
    }
}

impl<T: fmt::Display> fmt::Display for LocationTagged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.value.to_string(), u32::from(self.location.offset))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveTokenKind {
    Type,
    Namespace,
    Member,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagHelperDirectiveKind {
    AddTagHelper,
    RemoveTagHelper,
    TagHelperPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SpanChunkGenerator {
    #[default]
    Null,
    Markup,
    Statement,
    Expression,
    AddImport {
        namespace: String,
    },
    LiteralAttribute {
        prefix: LocationTagged<String>,
        value: LocationTagged<String>,
    },
    DirectiveToken {
        kind: DirectiveTokenKind,
    },
    TagHelperDirective {
        kind: TagHelperDirectiveKind,
        value: String,
    },
}

impl SpanChunkGenerator {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub(crate) fn shifted(&self, shift: &LocationShift) -> Self {
        match self {
            Self::LiteralAttribute { prefix, value } => Self::LiteralAttribute {
                prefix: prefix.shifted(shift),
                value: value.shifted(shift),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for SpanChunkGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("None"),
            Self::Markup => f.write_str("Markup"),
            Self::Statement => f.write_str("Stmt"),
            Self::Expression => f.write_str("Expr"),
            Self::AddImport { namespace } => write!(f, "Import:{namespace}"),
            Self::LiteralAttribute { prefix, value } => write!(f, "LitAttr:{prefix},{value}"),
            Self::DirectiveToken { kind } => write!(f, "DirectiveToken:{kind:?}"),
            Self::TagHelperDirective { kind, value } => write!(f, "{kind:?}:{value:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlockChunkGenerator {
    #[default]
    Parent,
    Expression,
    Template,
    Attribute {
        name: String,
        prefix: LocationTagged<String>,
        suffix: LocationTagged<String>,
    },
    DynamicAttribute {
        prefix: LocationTagged<String>,
        value_start: SourceLocation,
    },
    Directive {
        name: String,
    },
    Section {
        name: String,
    },
    RazorComment,
    TagHelper,
}

impl BlockChunkGenerator {
    pub(crate) fn shifted(&self, shift: &LocationShift) -> Self {
        match self {
            Self::Attribute { name, prefix, suffix } => Self::Attribute {
                name: name.clone(),
                prefix: prefix.shifted(shift),
                suffix: suffix.shifted(shift),
            },
            Self::DynamicAttribute { prefix, value_start } => Self::DynamicAttribute {
                prefix: prefix.shifted(shift),
                value_start: shift.apply(*value_start),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for BlockChunkGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => f.write_str("None"),
            Self::Expression => f.write_str("Expr"),
            Self::Template => f.write_str("Template"),
            Self::Attribute { name, prefix, suffix } => write!(f, "Attr:{name},{prefix},{suffix}"),
            Self::DynamicAttribute { prefix, value_start } => {
                write!(f, "DynAttr:{prefix},{}", u32::from(value_start.offset))
            }
            Self::Directive { name } => write!(f, "Directive:{name}"),
            Self::Section { name } => write!(f, "Section:{name}"),
            Self::RazorComment => f.write_str("Comment"),
            Self::TagHelper => f.write_str("TagHelper"),
        }
    }
}
