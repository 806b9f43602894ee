//! Structured filter documents (OGC Filter Encoding 1.0.0/1.1.0, FES 2.0.0).
//!
//! The decoded tree is interpreted directly; element names are resolved
//! against the namespace scope in force at each element and must belong to
//! the declared dialect's namespace.

use super::{
    ComparisonOp, Expression, LikePattern, Literal, MAX_NESTING, Predicate, property_expression,
};
use crate::document::Element;
use crate::error::CswError;
use crate::namespace::{FES_NAMESPACE, NamespaceTable, OGC_NAMESPACE};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

const COMMON_ELEMENTS: &[&str] = &[
    "Filter",
    "And",
    "Or",
    "Not",
    "PropertyIsEqualTo",
    "PropertyIsNotEqualTo",
    "PropertyIsLessThan",
    "PropertyIsGreaterThan",
    "PropertyIsLessThanOrEqualTo",
    "PropertyIsGreaterThanOrEqualTo",
    "PropertyIsLike",
    "PropertyIsNull",
    "PropertyIsBetween",
    "LowerBoundary",
    "UpperBoundary",
    "Literal",
];

const SPATIAL_OPERATORS: &[&str] = &[
    "BBOX",
    "Equals",
    "Disjoint",
    "Touches",
    "Within",
    "Overlaps",
    "Crosses",
    "Intersects",
    "Contains",
    "DWithin",
    "Beyond",
];

const TEMPORAL_OPERATORS: &[&str] = &[
    "After",
    "Before",
    "Begins",
    "BegunBy",
    "TContains",
    "During",
    "EndedBy",
    "Ends",
    "TEquals",
    "Meets",
    "MetBy",
    "TOverlaps",
    "OverlappedBy",
    "AnyInteracts",
];

const EXPRESSIONS: &[&str] = &["Function", "Add", "Sub", "Mul", "Div"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FilterVersion {
    #[serde(rename = "1.0.0")]
    V1_0_0,
    #[serde(rename = "1.1.0")]
    V1_1_0,
    #[serde(rename = "2.0.0")]
    V2_0_0,
}

impl FilterVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1.0.0" => Some(FilterVersion::V1_0_0),
            "1.1.0" => Some(FilterVersion::V1_1_0),
            "2.0.0" => Some(FilterVersion::V2_0_0),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterVersion::V1_0_0 => "1.0.0",
            FilterVersion::V1_1_0 => "1.1.0",
            FilterVersion::V2_0_0 => "2.0.0",
        }
    }

    pub fn namespace(self) -> &'static str {
        match self {
            FilterVersion::V2_0_0 => FES_NAMESPACE,
            _ => OGC_NAMESPACE,
        }
    }

    /// Whether `element` is defined in this dialect.
    pub fn allows(self, element: &str) -> bool {
        if COMMON_ELEMENTS.contains(&element) {
            return true;
        }
        match self {
            FilterVersion::V1_0_0 => matches!(element, "PropertyName" | "FeatureId"),
            FilterVersion::V1_1_0 => {
                matches!(element, "PropertyName" | "FeatureId" | "GmlObjectId")
            }
            FilterVersion::V2_0_0 => {
                matches!(element, "ValueReference" | "PropertyIsNil" | "ResourceId")
            }
        }
    }

    fn escape_attribute(self) -> &'static str {
        match self {
            FilterVersion::V1_0_0 => "escape",
            _ => "escapeChar",
        }
    }

    fn id_attribute(element: &str) -> &'static str {
        match element {
            "FeatureId" => "fid",
            "GmlObjectId" => "id",
            _ => "rid",
        }
    }
}

impl fmt::Display for FilterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interprets a `Filter` element in the given dialect.
pub fn parse(
    root: &Element,
    version: FilterVersion,
    namespaces: &Arc<NamespaceTable>,
) -> Result<Predicate, CswError> {
    let interpreter = Interpreter {
        version,
        depth: Cell::new(0),
    };
    let scope = root.scope(namespaces);
    let name = interpreter.operator(root, &scope)?;
    if name != "Filter" {
        return Err(CswError::syntax_in(
            &root.name,
            format!("expected a Filter element, found '{name}'"),
        ));
    }
    match root.children.as_slice() {
        [] => Err(CswError::syntax_in(&root.name, "filter is empty")),
        [only] => interpreter.predicate_or_ids(only, &scope),
        children => {
            // Only identifier filters may repeat at the top level.
            let mut ids = Vec::with_capacity(children.len());
            for child in children {
                let child_scope = child.scope(&scope);
                let operator = interpreter.operator(child, &child_scope)?;
                if !is_id_element(operator.as_str()) {
                    return Err(CswError::syntax_in(
                        &child.name,
                        "a filter holds a single predicate",
                    ));
                }
                ids.push(interpreter.id_value(child, &operator)?);
            }
            Ok(Predicate::Ids(ids))
        }
    }
}

fn is_id_element(local: &str) -> bool {
    matches!(local, "FeatureId" | "GmlObjectId" | "ResourceId")
}

struct Interpreter {
    version: FilterVersion,
    // Logical operators entered so far.
    depth: Cell<usize>,
}

impl Interpreter {
    /// Resolves the element name, checks the dialect, and returns its local
    /// part.
    fn operator(&self, element: &Element, scope: &NamespaceTable) -> Result<String, CswError> {
        let name = element.qualified_name(scope)?;
        let local = name.local.as_str();
        if SPATIAL_OPERATORS.contains(&local) {
            return Err(CswError::syntax_in(
                &element.name,
                "spatial operators are not supported",
            ));
        }
        if TEMPORAL_OPERATORS.contains(&local) {
            return Err(CswError::syntax_in(
                &element.name,
                "temporal operators are not supported",
            ));
        }
        if EXPRESSIONS.contains(&local) {
            return Err(CswError::syntax_in(
                &element.name,
                "functions and arithmetic expressions are not supported",
            ));
        }
        if name.namespace != self.version.namespace() {
            return Err(CswError::syntax_in(
                &element.name,
                format!(
                    "element is not in the {} namespace required by filter version {}",
                    self.version.namespace(),
                    self.version
                ),
            ));
        }
        if !self.version.allows(local) {
            return Err(CswError::syntax_in(
                &element.name,
                format!("'{local}' is not defined in filter version {}", self.version),
            ));
        }
        Ok(name.local)
    }

    fn predicate_or_ids(
        &self,
        element: &Element,
        parent: &Arc<NamespaceTable>,
    ) -> Result<Predicate, CswError> {
        let scope = element.scope(parent);
        let operator = self.operator(element, &scope)?;
        if is_id_element(&operator) {
            return Ok(Predicate::Ids(vec![self.id_value(element, &operator)?]));
        }
        self.predicate(element, &operator, &scope)
    }

    fn child_predicate(
        &self,
        element: &Element,
        parent: &Arc<NamespaceTable>,
    ) -> Result<Predicate, CswError> {
        let scope = element.scope(parent);
        let operator = self.operator(element, &scope)?;
        if is_id_element(&operator) {
            return Err(CswError::syntax_in(
                &element.name,
                "identifier filters cannot be combined with other predicates",
            ));
        }
        let depth = self.depth.get();
        if depth >= MAX_NESTING {
            return Err(CswError::syntax_in(&element.name, "filter nested too deeply"));
        }
        self.depth.set(depth + 1);
        let predicate = self.predicate(element, &operator, &scope);
        self.depth.set(depth);
        predicate
    }

    fn predicate(
        &self,
        element: &Element,
        operator: &str,
        scope: &Arc<NamespaceTable>,
    ) -> Result<Predicate, CswError> {
        match operator {
            "And" | "Or" => {
                if element.children.len() < 2 {
                    return Err(CswError::syntax_in(
                        &element.name,
                        "logical operators need at least two operands",
                    ));
                }
                let parts = element
                    .children
                    .iter()
                    .map(|child| self.child_predicate(child, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if operator == "And" {
                    Predicate::and(parts)
                } else {
                    Predicate::or(parts)
                })
            }
            "Not" => match element.children.as_slice() {
                [only] => Ok(Predicate::negate(self.child_predicate(only, scope)?)),
                _ => Err(CswError::syntax_in(
                    &element.name,
                    "Not takes exactly one operand",
                )),
            },
            "PropertyIsLike" => self.like(element, scope),
            "PropertyIsNull" | "PropertyIsNil" => {
                let [operand] = self.operands::<1>(element)?;
                Ok(Predicate::IsNull(self.expression(operand, scope)?))
            }
            "PropertyIsBetween" => self.between(element, scope),
            comparison => {
                let op = comparison_op(comparison).ok_or_else(|| {
                    CswError::syntax_in(&element.name, format!("'{comparison}' is not a predicate"))
                })?;
                let match_case = self.match_case(element)?;
                let [left, right] = self.operands::<2>(element)?;
                Ok(Predicate::Comparison {
                    op,
                    left: self.expression(left, scope)?,
                    right: self.expression(right, scope)?,
                    match_case,
                })
            }
        }
    }

    fn like(&self, element: &Element, scope: &Arc<NamespaceTable>) -> Result<Predicate, CswError> {
        let match_case = self.match_case(element)?;
        let misspelled = match self.version {
            FilterVersion::V1_0_0 => "escapeChar",
            _ => "escape",
        };
        if element.attributes.contains_key(misspelled) {
            return Err(CswError::syntax_in(
                &element.name,
                format!(
                    "filter version {} spells the escape attribute '{}'",
                    self.version,
                    self.version.escape_attribute()
                ),
            ));
        }
        let wildcard = marker(element, "wildCard", '%')?;
        let single = marker(element, "singleChar", '_')?;
        let escape = match element.attribute(self.version.escape_attribute()) {
            Some(_) => Some(marker(element, self.version.escape_attribute(), '\\')?),
            None => Some('\\'),
        };

        let [property, literal] = self.operands::<2>(element)?;
        let expression = self.expression(property, scope)?;
        let literal_scope = literal.scope(scope);
        if self.operator(literal, &literal_scope)? != "Literal" {
            return Err(CswError::syntax_in(
                &literal.name,
                "the pattern of PropertyIsLike must be a Literal",
            ));
        }
        let pattern = LikePattern::parse(literal.text().unwrap_or(""), wildcard, single, escape)
            .map_err(|err| match err {
                CswError::ConstraintSyntax { message, .. } => {
                    CswError::syntax_in(&element.name, message)
                }
                other => other,
            })?;
        Ok(Predicate::Like {
            expression,
            pattern,
            match_case,
        })
    }

    fn between(
        &self,
        element: &Element,
        scope: &Arc<NamespaceTable>,
    ) -> Result<Predicate, CswError> {
        let [operand, lower, upper] = self.operands::<3>(element)?;
        let bound = |boundary: &Element, expected: &str| -> Result<Expression, CswError> {
            let boundary_scope = boundary.scope(scope);
            if self.operator(boundary, &boundary_scope)? != expected {
                return Err(CswError::syntax_in(
                    &boundary.name,
                    format!("expected {expected}"),
                ));
            }
            let [inner] = self.operands::<1>(boundary)?;
            self.expression(inner, &boundary_scope)
        };
        Ok(Predicate::Between {
            expression: self.expression(operand, scope)?,
            lower: bound(lower, "LowerBoundary")?,
            upper: bound(upper, "UpperBoundary")?,
        })
    }

    fn expression(
        &self,
        element: &Element,
        parent: &Arc<NamespaceTable>,
    ) -> Result<Expression, CswError> {
        let scope = element.scope(parent);
        let operator = self.operator(element, &scope)?;
        match operator.as_str() {
            "PropertyName" | "ValueReference" => {
                let token = element.text().ok_or_else(|| {
                    CswError::syntax_in(&element.name, "property name is empty")
                })?;
                property_expression(token, &scope)
            }
            "Literal" => Ok(Expression::Literal(Literal::String(
                element.text().unwrap_or("").to_string(),
            ))),
            other => Err(CswError::syntax_in(
                &element.name,
                format!("'{other}' is not a value expression"),
            )),
        }
    }

    fn operands<'e, const N: usize>(
        &self,
        element: &'e Element,
    ) -> Result<[&'e Element; N], CswError> {
        let children: Vec<&Element> = element.children.iter().collect();
        children.try_into().map_err(|found: Vec<&Element>| {
            CswError::syntax_in(
                &element.name,
                format!("expected {N} operand(s), found {}", found.len()),
            )
        })
    }

    fn match_case(&self, element: &Element) -> Result<bool, CswError> {
        let Some(raw) = element.attributes.get("matchCase") else {
            return Ok(true);
        };
        if self.version == FilterVersion::V1_0_0 {
            return Err(CswError::syntax_in(
                &element.name,
                "matchCase is not defined in filter version 1.0.0",
            ));
        }
        match raw.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(CswError::syntax_in(
                &element.name,
                format!("matchCase must be a boolean, found '{other}'"),
            )),
        }
    }

    fn id_value(&self, element: &Element, operator: &str) -> Result<String, CswError> {
        let attribute = FilterVersion::id_attribute(operator);
        element
            .attribute(attribute)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                CswError::syntax_in(&element.name, format!("missing '{attribute}' attribute"))
            })
    }
}

fn marker(element: &Element, attribute: &str, default: char) -> Result<char, CswError> {
    let Some(raw) = element.attribute(attribute) else {
        return Ok(default);
    };
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CswError::syntax_in(
            &element.name,
            format!("'{attribute}' must be a single character"),
        )),
    }
}

fn comparison_op(local: &str) -> Option<ComparisonOp> {
    Some(match local {
        "PropertyIsEqualTo" => ComparisonOp::Equal,
        "PropertyIsNotEqualTo" => ComparisonOp::NotEqual,
        "PropertyIsLessThan" => ComparisonOp::Less,
        "PropertyIsGreaterThan" => ComparisonOp::Greater,
        "PropertyIsLessThanOrEqualTo" => ComparisonOp::LessOrEqual,
        "PropertyIsGreaterThanOrEqualTo" => ComparisonOp::GreaterOrEqual,
        _ => return None,
    })
}
