//! Prefix to namespace URI resolution.
//!
//! A [`NamespaceTable`] is built once per request, either from the KVP
//! `namespace` parameter (`xmlns(prefix=uri)` groups) or from the `xmlns`
//! declarations in scope in a request document, and then threaded by
//! reference through every stage that turns a prefixed token into a
//! [`QualifiedName`]. Tables are never mutated after construction; nested
//! document scopes derive a new table instead.

use crate::error::CswError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const CSW_NAMESPACE: &str = "http://www.opengis.net/cat/csw/2.0.2";
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";
pub const DCT_NAMESPACE: &str = "http://purl.org/dc/terms/";
pub const OGC_NAMESPACE: &str = "http://www.opengis.net/ogc";
pub const FES_NAMESPACE: &str = "http://www.opengis.net/fes/2.0";
pub const OWS_NAMESPACE: &str = "http://www.opengis.net/ows";
pub const GML_NAMESPACE: &str = "http://www.opengis.net/gml";
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
pub const GMD_NAMESPACE: &str = "http://www.isotc211.org/2005/gmd";
pub const RIM_NAMESPACE: &str = "urn:oasis:names:tc:ebxml-regrep:xsd:rim:3.0";

// Bindings every request starts from. `rim` is deliberately absent: ebRIM
// names must be declared by the client.
const DEFAULT_BINDINGS: &[(&str, &str)] = &[
    ("csw", CSW_NAMESPACE),
    ("dc", DC_NAMESPACE),
    ("dct", DCT_NAMESPACE),
    ("ogc", OGC_NAMESPACE),
    ("fes", FES_NAMESPACE),
    ("ows", OWS_NAMESPACE),
    ("gml", GML_NAMESPACE),
    ("xlink", XLINK_NAMESPACE),
    ("gmd", GMD_NAMESPACE),
];

/// A namespace-qualified name. Equal iff both the URI and local part match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub namespace: String,
    pub local: String,
}

impl QualifiedName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

impl fmt::Display for QualifiedName {
    // Clark notation; use `NamespaceTable::render` for prefixed output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

/// Splits `prefix:local` into its parts; unprefixed tokens yield `None`.
pub fn split_prefixed(token: &str) -> (Option<&str>, &str) {
    match token.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, token),
    }
}

/// Whether `value` is an XML NCName (the shape of a prefix or local part).
pub fn is_ncname(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Prefix to URI bindings; the empty prefix holds the default namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceTable {
    bindings: BTreeMap<String, String>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the protocol's own schema prefixes.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (prefix, uri) in DEFAULT_BINDINGS {
            table.bind(*prefix, *uri);
        }
        table
    }

    /// Parses the KVP `namespace` parameter.
    ///
    /// The syntax is one or more comma-separated `xmlns(prefix=uri)` groups;
    /// `xmlns(uri)` declares the default namespace. Only the declared
    /// bindings are returned; merge them over a base table with
    /// [`NamespaceTable::merged`].
    pub fn parse_declarations(raw: &str) -> Result<Self, CswError> {
        let mut table = Self::new();
        let mut rest = raw.trim();
        if rest.is_empty() {
            return Ok(table);
        }

        loop {
            let body = rest
                .strip_prefix("xmlns(")
                .ok_or_else(|| CswError::malformed_namespace(rest, "expected 'xmlns('"))?;
            let close = body
                .find(')')
                .ok_or_else(|| CswError::malformed_namespace(rest, "missing closing ')'"))?;
            let declaration = &body[..close];
            let (prefix, uri) = match declaration.split_once('=') {
                Some((prefix, uri)) if is_ncname(prefix.trim()) => (prefix.trim(), uri.trim()),
                Some((prefix, _)) if !prefix.contains(':') => {
                    return Err(CswError::malformed_namespace(
                        declaration,
                        format!("'{}' is not a valid prefix", prefix.trim()),
                    ));
                }
                _ => ("", declaration.trim()),
            };
            if uri.is_empty() {
                return Err(CswError::malformed_namespace(
                    declaration,
                    "namespace URI must not be empty",
                ));
            }
            if let Some(existing) = table.uri(prefix) {
                if existing != uri {
                    return Err(CswError::malformed_namespace(
                        declaration,
                        format!("prefix '{prefix}' is already bound to '{existing}'"),
                    ));
                }
            }
            table.bind(prefix, uri);

            rest = body[close + 1..].trim_start();
            if rest.is_empty() {
                break;
            }
            rest = rest
                .strip_prefix(',')
                .ok_or_else(|| {
                    CswError::malformed_namespace(rest, "expected ',' between declarations")
                })?
                .trim_start();
            if rest.is_empty() {
                return Err(CswError::malformed_namespace(raw, "trailing ','"));
            }
        }

        Ok(table)
    }

    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    /// A new table holding `self` overridden by the bindings in `other`.
    pub fn merged(&self, other: &NamespaceTable) -> NamespaceTable {
        let mut merged = self.clone();
        for (prefix, uri) in &other.bindings {
            merged.bind(prefix.clone(), uri.clone());
        }
        merged
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.uri("")
    }

    /// Reverse lookup used when rendering names for humans.
    ///
    /// Prefers a non-empty prefix; ties resolve to the alphabetically first.
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .filter(|(_, bound)| bound.as_str() == uri)
            .map(|(prefix, _)| prefix.as_str())
            .min_by_key(|prefix| (prefix.is_empty(), *prefix))
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    /// Resolves a prefixed token; unprefixed tokens take the default
    /// namespace when one is declared, else no namespace.
    pub fn resolve(&self, token: &str) -> Result<QualifiedName, CswError> {
        self.resolve_or(token, self.default_namespace().unwrap_or(""))
    }

    /// Resolves a prefixed token; unprefixed tokens take the declared default
    /// namespace, falling back to `fallback` when none is declared.
    pub fn resolve_or(&self, token: &str, fallback: &str) -> Result<QualifiedName, CswError> {
        let token = token.trim();
        match split_prefixed(token) {
            (Some(prefix), local) => {
                if !is_ncname(local) {
                    return Err(CswError::invalid(
                        "",
                        format!("'{token}' is not a valid qualified name"),
                    ));
                }
                let uri = self
                    .uri(prefix)
                    .ok_or_else(|| CswError::unresolved_prefix(prefix))?;
                Ok(QualifiedName::new(uri, local))
            }
            (None, local) => {
                if !is_ncname(local) {
                    return Err(CswError::invalid(
                        "",
                        format!("'{token}' is not a valid qualified name"),
                    ));
                }
                let uri = self.default_namespace().unwrap_or(fallback);
                Ok(QualifiedName::new(uri, local))
            }
        }
    }

    /// Renders `name` as `prefix:local` when a prefix is bound, else in Clark
    /// notation.
    pub fn render(&self, name: &QualifiedName) -> String {
        match self.prefix_for(&name.namespace) {
            Some("") => name.local.clone(),
            Some(prefix) => format!("{prefix}:{}", name.local),
            None => name.to_string(),
        }
    }
}
