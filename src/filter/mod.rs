//! Constraint parsing into a language-neutral [`Predicate`] tree.
//!
//! Constraints arrive as CQL text or as a structured filter (either embedded
//! in a request document or supplied as XML text in the KVP `constraint`
//! parameter). Both paths produce the same tree, with every property
//! reference resolved to a [`QualifiedName`] through the request's
//! [`NamespaceTable`].

pub mod cql;
pub mod like;
pub mod ogc;

pub use like::{LikePattern, LikeToken};
pub use ogc::FilterVersion;

use crate::document::Element;
use crate::error::CswError;
use crate::namespace::{CSW_NAMESPACE, NamespaceTable, QualifiedName, is_ncname, split_prefixed};
use crate::record_schema::{self, ANY_TEXT};
use crate::xml;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const CQL_DEFAULT_VERSION: &str = "1.0.0";
pub const FILTER_DEFAULT_VERSION: &str = "1.1.0";

/// Deepest nesting of logical operators and groups a constraint may use.
pub const MAX_NESTING: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConstraintLanguage {
    #[serde(rename = "CQL_TEXT")]
    CqlText,
    #[serde(rename = "FILTER")]
    Filter,
}

impl ConstraintLanguage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CQL_TEXT" => Some(ConstraintLanguage::CqlText),
            "FILTER" => Some(ConstraintLanguage::Filter),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintLanguage::CqlText => "CQL_TEXT",
            ConstraintLanguage::Filter => "FILTER",
        }
    }

    pub fn default_version(self) -> &'static str {
        match self {
            ConstraintLanguage::CqlText => CQL_DEFAULT_VERSION,
            ConstraintLanguage::Filter => FILTER_DEFAULT_VERSION,
        }
    }
}

/// A resolved record property, optionally narrowed to a sub-element.
///
/// The namespace table the reference was resolved against travels with it
/// so the name can be rendered with its original prefixes.
#[derive(Clone, Debug, Serialize)]
pub struct PropertyReference {
    pub name: QualifiedName,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<QualifiedName>,
    #[serde(skip)]
    namespaces: Arc<NamespaceTable>,
}

impl PartialEq for PropertyReference {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.path == other.path
    }
}

impl Eq for PropertyReference {}

impl PropertyReference {
    pub fn new(
        name: QualifiedName,
        path: Vec<QualifiedName>,
        namespaces: Arc<NamespaceTable>,
    ) -> Self {
        Self {
            name,
            path,
            namespaces,
        }
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// `prefix:local` rendering including the structural path,
    /// e.g. `dc:title/dc:value`.
    pub fn rendered(&self) -> String {
        std::iter::once(&self.name)
            .chain(self.path.iter())
            .map(|step| self.namespaces.render(step))
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PropertyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(value) => f.write_str(value),
            Literal::Integer(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value}"),
            Literal::Boolean(value) => write!(f, "{value}"),
            Literal::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Literal::DateTime(value) => f.write_str(&value.to_rfc3339()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Property(PropertyReference),
    /// Free-text match across every field of a record.
    AnyText,
    Literal(Literal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "<>",
            ComparisonOp::Less => "<",
            ComparisonOp::Greater => ">",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::GreaterOrEqual => ">=",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Include,
    Exclude,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Comparison {
        op: ComparisonOp,
        left: Expression,
        right: Expression,
        match_case: bool,
    },
    Like {
        expression: Expression,
        pattern: LikePattern,
        match_case: bool,
    },
    IsNull(Expression),
    Between {
        expression: Expression,
        lower: Expression,
        upper: Expression,
    },
    /// Record identifiers, from identifier filters.
    Ids(Vec<String>),
}

impl Predicate {
    /// Conjunction, flattening nested conjunctions.
    pub fn and(parts: Vec<Predicate>) -> Predicate {
        Self::combine(parts, true)
    }

    /// Disjunction, flattening nested disjunctions.
    pub fn or(parts: Vec<Predicate>) -> Predicate {
        Self::combine(parts, false)
    }

    fn combine(parts: Vec<Predicate>, conjunction: bool) -> Predicate {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Predicate::And(inner) if conjunction => flat.extend(inner),
                Predicate::Or(inner) if !conjunction => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            if let Some(only) = flat.pop() {
                return only;
            }
        }
        if conjunction {
            Predicate::And(flat)
        } else {
            Predicate::Or(flat)
        }
    }

    pub fn negate(inner: Predicate) -> Predicate {
        Predicate::Not(Box::new(inner))
    }
}

/// The authored form of a constraint.
#[derive(Clone, Copy, Debug)]
pub enum ConstraintBody<'a> {
    Text(&'a str),
    Document(&'a Element),
}

/// Parses a constraint in `language`/`version` against `namespaces`.
///
/// Structured filters given as text are decoded first; a decoding failure
/// is a syntax error positioned in that text.
pub fn parse_constraint(
    body: ConstraintBody<'_>,
    language: ConstraintLanguage,
    version: &str,
    namespaces: &Arc<NamespaceTable>,
) -> Result<Predicate, CswError> {
    debug!(language = language.as_str(), version, "parsing constraint");
    match (language, body) {
        (ConstraintLanguage::CqlText, ConstraintBody::Text(text)) => cql::parse(text, namespaces),
        (ConstraintLanguage::CqlText, ConstraintBody::Document(element)) => {
            let text = element.text().unwrap_or("");
            cql::parse(text, namespaces)
        }
        (ConstraintLanguage::Filter, body) => {
            let dialect = FilterVersion::parse(version).ok_or_else(|| {
                CswError::invalid(
                    "constraint_language_version",
                    format!("filter version '{version}' is not supported"),
                )
            })?;
            match body {
                ConstraintBody::Document(element) => ogc::parse(element, dialect, namespaces),
                ConstraintBody::Text(text) => {
                    let element = xml::parse_document(text)
                        .map_err(|err| CswError::syntax_at(err.position, "", err.message))?;
                    ogc::parse(&element, dialect, namespaces)
                }
            }
        }
    }
}

/// Resolves a property token (`title`, `dc:title`, `dc:title/dc:value`,
/// `AnyText`) into an expression.
///
/// Unprefixed steps resolve through the record schema; a path spelled out
/// explicitly replaces the schema's default structural path.
pub fn property_expression(
    token: &str,
    namespaces: &Arc<NamespaceTable>,
) -> Result<Expression, CswError> {
    let steps = split_steps(token)?;
    let name = resolve_step(steps[0], namespaces)?;
    if record_schema::is_any_text(&name) {
        if steps.len() > 1 {
            return Err(CswError::invalid(
                "",
                format!("'{token}' cannot select below {ANY_TEXT}"),
            ));
        }
        return Ok(Expression::AnyText);
    }
    let path = if steps.len() > 1 {
        steps[1..]
            .iter()
            .map(|step| resolve_step(step, namespaces))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        record_schema::structural_path(&name)
    };
    Ok(Expression::Property(PropertyReference::new(
        name,
        path,
        Arc::clone(namespaces),
    )))
}

/// Like [`property_expression`] but rejects the free-text pseudo-property;
/// used for sort keys.
pub fn property_reference(
    token: &str,
    namespaces: &Arc<NamespaceTable>,
) -> Result<PropertyReference, CswError> {
    match property_expression(token, namespaces)? {
        Expression::Property(reference) => Ok(reference),
        _ => Err(CswError::invalid(
            "",
            format!("'{}' does not name a single record property", token.trim()),
        )),
    }
}

/// Resolves a single record property name (no path).
pub fn resolve_property_name(
    token: &str,
    namespaces: &NamespaceTable,
) -> Result<QualifiedName, CswError> {
    let steps = split_steps(token)?;
    if steps.len() > 1 {
        return Err(CswError::invalid(
            "",
            format!("'{}' must be a single element name", token.trim()),
        ));
    }
    resolve_step(steps[0], namespaces)
}

fn split_steps(token: &str) -> Result<Vec<&str>, CswError> {
    let token = token.trim();
    let steps: Vec<&str> = token.split('/').map(str::trim).collect();
    if token.is_empty() || steps.iter().any(|step| step.is_empty()) {
        return Err(CswError::invalid(
            "",
            format!("'{token}' is not a valid property name"),
        ));
    }
    Ok(steps)
}

fn resolve_step(step: &str, namespaces: &NamespaceTable) -> Result<QualifiedName, CswError> {
    match split_prefixed(step) {
        (Some(_), _) => namespaces.resolve(step),
        (None, local) if !is_ncname(local) => Err(CswError::invalid(
            "",
            format!("'{step}' is not a valid property name"),
        )),
        (None, ANY_TEXT) => Ok(QualifiedName::new(CSW_NAMESPACE, ANY_TEXT)),
        (None, local) => Ok(record_schema::property_name(local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{DC_NAMESPACE, DCT_NAMESPACE};

    fn defaults() -> Arc<NamespaceTable> {
        Arc::new(NamespaceTable::with_defaults())
    }

    #[test]
    fn unqualified_and_qualified_properties_are_equal() {
        let ns = defaults();
        let bare = property_expression("title", &ns).unwrap();
        let prefixed = property_expression("dc:title", &ns).unwrap();
        let explicit = property_expression("dc:title/dc:value", &ns).unwrap();
        assert_eq!(bare, prefixed);
        assert_eq!(prefixed, explicit);
    }

    #[test]
    fn references_render_with_request_prefixes() {
        let mut table = NamespaceTable::new();
        table.bind("d", DC_NAMESPACE);
        let reference = property_reference("d:title", &Arc::new(table)).unwrap();
        assert_eq!(reference.rendered(), "d:title/d:value");
    }

    #[test]
    fn any_text_is_tagged() {
        let ns = defaults();
        assert_eq!(property_expression("AnyText", &ns).unwrap(), Expression::AnyText);
        assert_eq!(
            property_expression("csw:AnyText", &ns).unwrap(),
            Expression::AnyText
        );
        assert!(property_reference("AnyText", &ns).is_err());
    }

    #[test]
    fn terms_resolve_to_dct() {
        let name = resolve_property_name("modified", &NamespaceTable::with_defaults()).unwrap();
        assert_eq!(name, QualifiedName::new(DCT_NAMESPACE, "modified"));
    }

    #[test]
    fn unknown_filter_version_names_the_parameter() {
        let err = parse_constraint(
            ConstraintBody::Text("<ogc:Filter/>"),
            ConstraintLanguage::Filter,
            "3.0.0",
            &defaults(),
        )
        .unwrap_err();
        assert_eq!(err.locator(), Some("constraint_language_version"));
    }

    #[test]
    fn combinators_flatten() {
        let nested = Predicate::and(vec![
            Predicate::Include,
            Predicate::and(vec![Predicate::Exclude, Predicate::Include]),
        ]);
        assert_eq!(
            nested,
            Predicate::And(vec![
                Predicate::Include,
                Predicate::Exclude,
                Predicate::Include
            ])
        );
        assert_eq!(Predicate::or(vec![Predicate::Include]), Predicate::Include);
    }
}
