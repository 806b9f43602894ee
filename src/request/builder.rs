//! Shared GetRecords validation core.
//!
//! Adapters hand over every field as raw text plus the namespace scope it
//! was written in. Fields are checked in a fixed order so that a request
//! with several problems always reports the same one first.

use super::{
    Constraint, DistributedSearch, Query, ResultType, SearchRequest, SortOrder, SortProperty,
    check_service, check_version,
};
use crate::config::{DEFAULT_OUTPUT_FORMAT, ServiceConfig};
use crate::document::Element;
use crate::error::CswError;
use crate::filter::{self, ConstraintBody, ConstraintLanguage};
use crate::namespace::{CSW_NAMESPACE, NamespaceTable, QualifiedName};
use crate::record_schema::ElementSet;
use std::sync::Arc;
use tracing::debug;

/// A prefixed token together with the scope it must be resolved in.
#[derive(Clone, Debug)]
pub struct RawName {
    pub token: String,
    pub scope: Arc<NamespaceTable>,
}

impl RawName {
    pub fn new(token: impl Into<String>, scope: &Arc<NamespaceTable>) -> Self {
        Self {
            token: token.into(),
            scope: Arc::clone(scope),
        }
    }
}

#[derive(Clone, Debug)]
pub enum RawConstraintBody {
    Text(String),
    Document(Element),
}

#[derive(Clone, Debug)]
pub struct RawConstraint {
    pub language: Option<String>,
    pub version: Option<String>,
    pub body: Option<RawConstraintBody>,
    pub scope: Arc<NamespaceTable>,
}

#[derive(Clone, Debug)]
pub struct RawSort {
    pub name: RawName,
    pub order: Option<String>,
}

/// GetRecords fields as written by the client.
#[derive(Clone, Debug, Default)]
pub struct RawSearch {
    pub service: Option<String>,
    pub version: Option<String>,
    pub request_id: Option<String>,
    pub type_names: Vec<RawName>,
    pub element_set_name: Option<String>,
    pub element_set_type_names: Vec<RawName>,
    pub element_names: Vec<RawName>,
    pub constraint: Option<RawConstraint>,
    pub sort_by: Vec<RawSort>,
    pub result_type: Option<String>,
    pub start_position: Option<String>,
    pub max_records: Option<String>,
    pub output_format: Option<String>,
    pub output_schema: Option<String>,
    pub distributed_search: Option<String>,
    pub hop_count: Option<String>,
    pub response_handler: Option<String>,
}

pub fn build_search(raw: RawSearch, config: &ServiceConfig) -> Result<SearchRequest, CswError> {
    let service = check_service(raw.service.as_deref())?;

    let version = check_version(raw.version.as_deref(), config)?;

    if raw.type_names.is_empty() {
        return Err(CswError::missing("typeNames"));
    }
    let type_names = resolve_type_names(&raw.type_names, "typeNames")?;

    let element_set = match non_blank(raw.element_set_name) {
        Some(name) => Some(ElementSet::parse(&name).ok_or_else(|| {
            CswError::invalid(
                "elementSetName",
                format!("'{name}' is not one of brief, summary, full"),
            )
        })?),
        None if raw.element_names.is_empty() => Some(ElementSet::default()),
        None => None,
    };
    let element_set_type_names =
        resolve_type_names(&raw.element_set_type_names, "elementSetName")?;
    let element_names = if raw.element_names.is_empty() {
        None
    } else {
        let names = raw
            .element_names
            .iter()
            .map(|name| {
                filter::resolve_property_name(&name.token, &name.scope)
                    .map_err(|err| err.at("elementName"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Some(dedup(names))
    };

    let constraint = raw.constraint.map(build_constraint).transpose()?;

    let sort_by = raw
        .sort_by
        .iter()
        .map(|sort| {
            let property = filter::property_reference(&sort.name.token, &sort.name.scope)
                .map_err(|err| err.at("sortBy"))?;
            let order = match sort.order.as_deref() {
                None => SortOrder::Ascending,
                Some(raw) => SortOrder::parse(raw).ok_or_else(|| {
                    CswError::invalid("sortBy", format!("'{raw}' is not a sort direction"))
                })?,
            };
            Ok(SortProperty { property, order })
        })
        .collect::<Result<Vec<_>, CswError>>()?;

    let result_type = match non_blank(raw.result_type) {
        Some(value) => ResultType::parse(&value).ok_or_else(|| {
            CswError::invalid(
                "resultType",
                format!("'{value}' is not one of hits, results, validate"),
            )
        })?,
        None => ResultType::default(),
    };

    let start_position = parse_count(raw.start_position, "startPosition")?.unwrap_or(1);
    if start_position < 1 {
        return Err(CswError::invalid("startPosition", "must be at least 1"));
    }
    let max_records =
        parse_count(raw.max_records, "maxRecords")?.unwrap_or(config.default_max_records);

    let output_format =
        non_blank(raw.output_format).unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string());
    if !config.supports_output_format(&output_format) {
        return Err(CswError::invalid(
            "outputFormat",
            format!("output format '{output_format}' is not supported"),
        ));
    }

    let output_schema = non_blank(raw.output_schema).unwrap_or_else(|| CSW_NAMESPACE.to_string());
    if !config.supports_output_schema(&output_schema) {
        return Err(CswError::invalid(
            "outputSchema",
            format!("output schema '{output_schema}' is not supported"),
        ));
    }

    let distributed = match non_blank(raw.distributed_search) {
        Some(flag) => parse_flag(&flag, "distributedSearch")?,
        None => false,
    };
    // A malformed hop count is a fault even when distribution is off.
    let hop_count = parse_count(raw.hop_count, "hopCount")?;
    let distributed_search = distributed.then(|| DistributedSearch {
        hop_count: hop_count.unwrap_or(config.default_hop_count),
    });

    let response_handler = match non_blank(raw.response_handler) {
        Some(uri) if !looks_like_uri(&uri) => {
            return Err(CswError::invalid(
                "responseHandler",
                format!("'{uri}' is not an absolute URI"),
            ));
        }
        other => other,
    };

    debug!(
        type_names = type_names.len(),
        ?result_type,
        start_position,
        max_records,
        "normalized GetRecords request"
    );

    Ok(SearchRequest {
        service,
        version,
        request_id: non_blank(raw.request_id),
        query: Query {
            type_names,
            element_names,
            element_set,
            element_set_type_names,
            constraint,
            sort_by,
            result_type,
            start_position,
            max_records,
            output_format,
            output_schema,
            distributed_search,
            response_handler,
        },
    })
}

fn build_constraint(raw: RawConstraint) -> Result<Constraint, CswError> {
    let language = match raw.language.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
        Some(name) => ConstraintLanguage::parse(name).ok_or_else(|| {
            CswError::invalid(
                "constraintLanguage",
                format!("'{name}' is not one of CQL_TEXT, FILTER"),
            )
        })?,
        None => ConstraintLanguage::CqlText,
    };
    let version = non_blank(raw.version).unwrap_or_else(|| language.default_version().to_string());
    let body = raw.body.ok_or_else(|| CswError::missing("constraint"))?;

    let (predicate, text) = match &body {
        RawConstraintBody::Text(text) => (
            filter::parse_constraint(
                ConstraintBody::Text(text.as_str()),
                language,
                &version,
                &raw.scope,
            ),
            Some(text.trim().to_string()),
        ),
        RawConstraintBody::Document(element) => (
            filter::parse_constraint(
                ConstraintBody::Document(element),
                language,
                &version,
                &raw.scope,
            ),
            element.text().map(str::to_string),
        ),
    };
    let predicate = predicate.map_err(|err| err.at("constraint"))?;
    Ok(Constraint {
        language,
        version,
        text: match language {
            ConstraintLanguage::CqlText => text,
            ConstraintLanguage::Filter => None,
        },
        predicate,
    })
}

fn resolve_type_names(names: &[RawName], locator: &str) -> Result<Vec<QualifiedName>, CswError> {
    let resolved = names
        .iter()
        .map(|name| {
            name.scope
                .resolve_or(&name.token, CSW_NAMESPACE)
                .map_err(|err| err.at(locator))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dedup(resolved))
}

// Ordered-set semantics: keep the first occurrence.
fn dedup(names: Vec<QualifiedName>) -> Vec<QualifiedName> {
    let mut unique: Vec<QualifiedName> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_count(value: Option<String>, locator: &str) -> Result<Option<u32>, CswError> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => raw.parse::<u32>().map(Some).map_err(|_| {
            CswError::invalid(locator, format!("'{raw}' is not a non-negative integer"))
        }),
    }
}

fn parse_flag(raw: &str, locator: &str) -> Result<bool, CswError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CswError::invalid(
            locator,
            format!("'{raw}' is not a boolean"),
        )),
    }
}

fn looks_like_uri(value: &str) -> bool {
    match value.split_once(':') {
        Some((scheme, rest)) => {
            !rest.is_empty()
                && scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
