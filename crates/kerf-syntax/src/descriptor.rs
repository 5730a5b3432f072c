//! Descriptions of bindable tags, supplied by the host.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagStructure {
    #[default]
    Unspecified,
    NormalOrSelfClosing,
    WithoutEndTag,
}

/// An attribute a rule needs before it matches. A trailing `*` in `name` matches by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequiredAttribute {
    pub name: String,
    pub value: Option<String>,
}

impl RequiredAttribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn matches(&self, name: &str, value: &str) -> bool {
        let name_matches = match self.name.strip_suffix('*') {
            Some(prefix) => name.len() > prefix.len() && starts_with_ignore_case(name, prefix),
            None => self.name.eq_ignore_ascii_case(name),
        };
        name_matches && self.value.as_deref().is_none_or(|expected| expected == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagMatchingRule {
    /// Tag name to match, or `*` for any tag.
    pub tag_name: String,
    pub required_attributes: Vec<RequiredAttribute>,
    pub parent_tag: Option<String>,
    pub tag_structure: TagStructure,
}

impl TagMatchingRule {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            required_attributes: Vec::new(),
            parent_tag: None,
            tag_structure: TagStructure::Unspecified,
        }
    }

    pub fn require(mut self, attribute: RequiredAttribute) -> Self {
        self.required_attributes.push(attribute);
        self
    }

    pub fn with_parent(mut self, parent_tag: impl Into<String>) -> Self {
        self.parent_tag = Some(parent_tag.into());
        self
    }

    pub fn with_structure(mut self, tag_structure: TagStructure) -> Self {
        self.tag_structure = tag_structure;
        self
    }

    pub fn matches(
        &self,
        tag_name: &str,
        attributes: &[(String, String)],
        parent: Option<&str>,
    ) -> bool {
        (self.tag_name == "*" || self.tag_name.eq_ignore_ascii_case(tag_name))
            && self.parent_tag.as_deref().is_none_or(|expected| {
                parent.is_some_and(|parent| parent.eq_ignore_ascii_case(expected))
            })
            && self.required_attributes.iter().all(|required| {
                attributes.iter().any(|(name, value)| required.matches(name, value))
            })
    }
}

/// A property a bound tag exposes as an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundAttribute {
    pub name: String,
    pub type_name: String,
    pub is_string: bool,
    pub is_boolean: bool,
    /// Attributes named `{indexer_prefix}{key}` bind to a dictionary entry.
    pub indexer_prefix: Option<String>,
}

impl BoundAttribute {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let is_string = matches!(type_name.as_str(), "string" | "System.String");
        let is_boolean = matches!(type_name.as_str(), "bool" | "System.Boolean");
        Self { name: name.into(), type_name, is_string, is_boolean, indexer_prefix: None }
    }

    pub fn with_indexer(mut self, prefix: impl Into<String>) -> Self {
        self.indexer_prefix = Some(prefix.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagDescriptor {
    pub name: String,
    pub rules: Vec<TagMatchingRule>,
    pub attributes: Vec<BoundAttribute>,
    pub allowed_children: Option<Vec<String>>,
}

impl TagDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            attributes: Vec::new(),
            allowed_children: None,
        }
    }

    pub fn rule(mut self, rule: TagMatchingRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn attribute(mut self, attribute: BoundAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn allow_child(mut self, tag_name: impl Into<String>) -> Self {
        self.allowed_children.get_or_insert_with(Vec::new).push(tag_name.into());
        self
    }
}

/// How an attribute name resolved against a [`BoundAttribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeMatch<'a> {
    pub attribute: &'a BoundAttribute,
    pub is_indexer: bool,
}

/// The descriptors a tag bound to, each with the rules that matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBinding {
    pub tag_name: String,
    pub matches: Vec<(Arc<TagDescriptor>, Vec<TagMatchingRule>)>,
}

impl TagBinding {
    pub fn descriptors(&self) -> impl Iterator<Item = &TagDescriptor> {
        self.matches.iter().map(|(descriptor, _)| descriptor.as_ref())
    }

    pub fn rules(&self) -> impl Iterator<Item = &TagMatchingRule> {
        self.matches.iter().flat_map(|(_, rules)| rules)
    }

    /// Finds the bound property an attribute name sets, if any descriptor declares one.
    pub fn bound_attribute(&self, name: &str) -> Option<AttributeMatch<'_>> {
        let attributes = self.descriptors().flat_map(|descriptor| &descriptor.attributes);
        let mut indexer = None;
        for attribute in attributes {
            if attribute.name.eq_ignore_ascii_case(name) {
                return Some(AttributeMatch { attribute, is_indexer: false });
            }
            let prefix_matches = attribute
                .indexer_prefix
                .as_deref()
                .is_some_and(|prefix| starts_with_ignore_case(name, prefix));
            if prefix_matches && indexer.is_none() {
                indexer = Some(AttributeMatch { attribute, is_indexer: true });
            }
        }
        indexer
    }

    /// Union of the allowed child tag names; `None` when no descriptor restricts children.
    pub fn allowed_children(&self) -> Option<Vec<&str>> {
        let mut allowed: Option<Vec<&str>> = None;
        for descriptor in self.descriptors() {
            if let Some(children) = &descriptor.allowed_children {
                allowed
                    .get_or_insert_with(Vec::new)
                    .extend(children.iter().map(String::as_str));
            }
        }
        allowed
    }
}

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// The opaque lookup that decides which descriptors a tag binds to.
pub trait TagDescriptorProvider: Send + Sync {
    fn binding(
        &self,
        tag_name: &str,
        attributes: &[(String, String)],
        parent_tag: Option<&str>,
        parent_is_bound: bool,
    ) -> Option<TagBinding>;
}

/// A provider that never binds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDescriptors;

impl TagDescriptorProvider for NoDescriptors {
    fn binding(
        &self,
        _tag_name: &str,
        _attributes: &[(String, String)],
        _parent_tag: Option<&str>,
        _parent_is_bound: bool,
    ) -> Option<TagBinding> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        BoundAttribute, RequiredAttribute, TagBinding, TagDescriptor, TagMatchingRule,
    };

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(name, value)| (name.to_string(), value.to_string())).collect()
    }

    #[test]
    fn rule_matching() {
        let rule = TagMatchingRule::new("input")
            .require(RequiredAttribute::new("asp-*"))
            .with_parent("form");

        assert!(rule.matches("INPUT", &attrs(&[("asp-for", "x")]), Some("form")));
        assert!(!rule.matches("input", &attrs(&[("asp-", "x")]), Some("form")));
        assert!(!rule.matches("input", &attrs(&[("asp-for", "x")]), None));
        assert!(!rule.matches("select", &attrs(&[("asp-for", "x")]), Some("form")));

        let any = TagMatchingRule::new("*").require(RequiredAttribute::new("type").with_value("a"));
        assert!(any.matches("p", &attrs(&[("type", "a")]), None));
        assert!(!any.matches("p", &attrs(&[("type", "b")]), None));
    }

    #[test]
    fn bound_attribute_lookup() {
        let descriptor = TagDescriptor::new("InputTagHelper")
            .attribute(BoundAttribute::new("value", "string"))
            .attribute(
                BoundAttribute::new("items", "IDictionary<string, int>").with_indexer("item-"),
            )
            .allow_child("option");
        let binding = TagBinding {
            tag_name: "input".into(),
            matches: vec![(Arc::new(descriptor.clone()), descriptor.rules.clone())],
        };

        let value = binding.bound_attribute("VALUE").unwrap();
        assert!(value.attribute.is_string);
        assert!(!value.is_indexer);

        let item = binding.bound_attribute("item-one").unwrap();
        assert!(item.is_indexer);
        assert!(!item.attribute.is_string);

        assert!(binding.bound_attribute("other").is_none());
        assert_eq!(binding.allowed_children(), Some(vec!["option"]));
    }
}
