//! Generic request document tree.
//!
//! Request documents reach this crate already decoded: an [`Element`] tree
//! whose names are kept exactly as written (`csw:Query`, `ogc:PropertyName`)
//! together with the `xmlns` declarations made on each element. Names are
//! resolved lazily against the namespace scope in force at that element.

use crate::error::CswError;
use crate::namespace::{NamespaceTable, QualifiedName, split_prefixed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    /// `xmlns` declarations made on this element; `""` is the default namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespaces: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn local_name(&self) -> &str {
        split_prefixed(&self.name).1
    }

    pub fn prefix(&self) -> Option<&str> {
        split_prefixed(&self.name).0
    }

    /// Attribute by exact name, falling back to a match on the local part
    /// (`gml:id` is found by `id`).
    pub fn attribute(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value.as_str());
        }
        self.attributes
            .iter()
            .find(|(key, _)| split_prefixed(key).1 == name)
            .map(|(_, value)| value.as_str())
    }

    /// Trimmed text content, `None` when blank.
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children
            .iter()
            .filter(move |child| child.local_name() == local)
    }

    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.local_name() == local)
    }

    /// Namespace scope in force inside this element.
    pub fn scope(&self, parent: &Arc<NamespaceTable>) -> Arc<NamespaceTable> {
        if self.namespaces.is_empty() {
            return Arc::clone(parent);
        }
        let mut declared = NamespaceTable::new();
        for (prefix, uri) in &self.namespaces {
            declared.bind(prefix.clone(), uri.clone());
        }
        Arc::new(parent.merged(&declared))
    }

    /// Resolves the element's own name against `scope`.
    ///
    /// `scope` must already include this element's declarations.
    pub fn qualified_name(&self, scope: &NamespaceTable) -> Result<QualifiedName, CswError> {
        scope.resolve(&self.name)
    }
}
