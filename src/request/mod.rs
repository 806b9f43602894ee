//! Canonical request model and the two adapters that produce it.
//!
//! [`kvp`] reads flat key/value parameters and [`document`] walks a decoded
//! request document. Both only reshape their input into the builder's raw
//! form; defaults, coercion and validation live once in [`builder`].

pub mod builder;
pub mod document;
pub mod kvp;

use crate::config::ServiceConfig;
use crate::error::CswError;
use crate::filter::{ConstraintLanguage, Predicate, PropertyReference};
use crate::namespace::QualifiedName;
use crate::record_schema::ElementSet;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    #[default]
    Hits,
    Results,
    Validate,
}

impl ResultType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hits" => Some(ResultType::Hits),
            "results" => Some(ResultType::Results),
            "validate" => Some(ResultType::Validate),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Accepts the KVP (`A`/`D`) and document (`ASC`/`DESC`) spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" | "ASC" => Some(SortOrder::Ascending),
            "D" | "DESC" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SortProperty {
    pub property: PropertyReference,
    pub order: SortOrder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DistributedSearch {
    pub hop_count: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Constraint {
    pub language: ConstraintLanguage,
    pub version: String,
    /// CQL source text, kept for echoing back to the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub predicate: Predicate,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Query {
    pub type_names: Vec<QualifiedName>,
    /// When present, overrides `element_set` for rendering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_names: Option<Vec<QualifiedName>>,
    /// Absent only when element names were given without a set name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_set: Option<ElementSet>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub element_set_type_names: Vec<QualifiedName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort_by: Vec<SortProperty>,
    pub result_type: ResultType,
    pub start_position: u32,
    pub max_records: u32,
    pub output_format: String,
    pub output_schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed_search: Option<DistributedSearch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_handler: Option<String>,
}

impl Query {
    pub fn predicate(&self) -> Option<&Predicate> {
        self.constraint.as_ref().map(|constraint| &constraint.predicate)
    }
}

/// A normalized GetRecords request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchRequest {
    pub service: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub query: Query,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CapabilitiesRequest {
    pub service: String,
    pub accept_versions: Vec<String>,
    pub sections: Vec<String>,
    pub accept_formats: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_sequence: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "request")]
pub enum Request {
    GetRecords(SearchRequest),
    GetCapabilities(CapabilitiesRequest),
}

impl Request {
    pub fn operation(&self) -> &'static str {
        match self {
            Request::GetRecords(_) => "GetRecords",
            Request::GetCapabilities(_) => "GetCapabilities",
        }
    }
}

pub(crate) fn check_service(service: Option<&str>) -> Result<String, CswError> {
    let service = service
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CswError::missing("service"))?;
    if !service.eq_ignore_ascii_case("CSW") {
        return Err(CswError::invalid(
            "service",
            format!("expected 'CSW', found '{service}'"),
        ));
    }
    Ok("CSW".to_string())
}

pub(crate) fn check_version(
    version: Option<&str>,
    config: &ServiceConfig,
) -> Result<String, CswError> {
    let version = version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CswError::missing("version"))?;
    if !config.supports_version(version) {
        return Err(CswError::invalid(
            "version",
            format!(
                "version '{version}' is not supported (supported: {})",
                config.supported_versions.join(", ")
            ),
        ));
    }
    Ok(version.to_string())
}
