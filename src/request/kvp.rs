//! Flat key/value parameter adapter.
//!
//! Parameter names are case-insensitive and blank values count as absent.
//! Multi-valued parameters are comma-separated and keep their order.

use super::builder::{RawConstraint, RawConstraintBody, RawName, RawSearch, RawSort, build_search};
use super::{CapabilitiesRequest, Request, SearchRequest, check_service, check_version};
use crate::config::ServiceConfig;
use crate::error::CswError;
use crate::namespace::NamespaceTable;
use crate::split_list;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KvpMap {
    values: BTreeMap<String, String>,
}

impl KvpMap {
    /// Builds a map from raw pairs; a repeated key keeps its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut values = BTreeMap::new();
        for (key, value) in pairs {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }
            values.insert(key.as_ref().trim().to_ascii_lowercase(), value);
        }
        Self { values }
    }

    /// Decodes an `application/x-www-form-urlencoded` query string.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.trim().trim_start_matches('?');
        Self::from_pairs(
            form_urlencoded::parse(query.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    fn owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(split_list).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Dispatches on the `request` parameter.
pub fn from_parameters(params: &KvpMap, config: &ServiceConfig) -> Result<Request, CswError> {
    let operation = params.get("request").ok_or_else(|| CswError::missing("request"))?;
    if operation.eq_ignore_ascii_case("GetRecords") {
        parse_get_records(params, config).map(Request::GetRecords)
    } else if operation.eq_ignore_ascii_case("GetCapabilities") {
        parse_get_capabilities(params).map(Request::GetCapabilities)
    } else {
        Err(CswError::OperationNotSupported {
            operation: operation.to_string(),
        })
    }
}

pub fn parse_get_records(
    params: &KvpMap,
    config: &ServiceConfig,
) -> Result<SearchRequest, CswError> {
    // Service and version come first so an unusable envelope is reported
    // before a malformed namespace parameter.
    check_service(params.get("service"))?;
    check_version(params.get("version"), config)?;

    let base = config.namespace_table();
    let scope = match params.get("namespace") {
        Some(raw) => Arc::new(base.merged(&NamespaceTable::parse_declarations(raw)?)),
        None => base,
    };
    let names = |key: &str| -> Vec<RawName> {
        params
            .list(key)
            .into_iter()
            .map(|token| RawName::new(token, &scope))
            .collect()
    };

    let constraint_text = params.owned("constraint");
    let constraint_language = params.owned("constraintLanguage");
    let constraint = if constraint_text.is_some() || constraint_language.is_some() {
        Some(RawConstraint {
            language: constraint_language,
            version: params.owned("constraint_language_version"),
            body: constraint_text.map(RawConstraintBody::Text),
            scope: Arc::clone(&scope),
        })
    } else {
        None
    };

    let sort_by = params
        .list("sortBy")
        .into_iter()
        .map(|token| sort_token(&token, &scope))
        .collect();

    let raw = RawSearch {
        service: params.owned("service"),
        version: params.owned("version"),
        request_id: params.owned("requestId"),
        type_names: names("typeNames"),
        element_set_name: params.owned("elementSetName"),
        element_set_type_names: Vec::new(),
        element_names: names("elementName"),
        constraint,
        sort_by,
        result_type: params.owned("resultType"),
        start_position: params.owned("startPosition"),
        max_records: params.owned("maxRecords"),
        output_format: params.owned("outputFormat"),
        output_schema: params.owned("outputSchema"),
        distributed_search: params.owned("distributedSearch"),
        hop_count: params.owned("hopCount"),
        response_handler: params.owned("responseHandler"),
    };
    build_search(raw, config)
}

/// `name:A` / `name:D`; a bare name sorts ascending.
fn sort_token(token: &str, scope: &Arc<NamespaceTable>) -> RawSort {
    match token.rsplit_once(':') {
        Some((name, direction))
            if !name.is_empty()
                && direction.len() == 1
                && direction.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            RawSort {
                name: RawName::new(name, scope),
                order: Some(direction.to_string()),
            }
        }
        _ => RawSort {
            name: RawName::new(token, scope),
            order: None,
        },
    }
}

pub fn parse_get_capabilities(params: &KvpMap) -> Result<CapabilitiesRequest, CswError> {
    let service = check_service(params.get("service"))?;
    Ok(CapabilitiesRequest {
        service,
        accept_versions: params.list("acceptVersions"),
        sections: params.list("sections"),
        accept_formats: params.list("acceptFormats"),
        update_sequence: params.owned("updateSequence"),
    })
}
