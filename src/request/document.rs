//! Request document adapter.
//!
//! Walks a decoded GetRecords or GetCapabilities tree. Structure is matched
//! by local name (schema conformance is checked before this runs); every
//! prefixed token is paired with the namespace scope of the element it was
//! written in.

use super::builder::{RawConstraint, RawConstraintBody, RawName, RawSearch, RawSort, build_search};
use super::{CapabilitiesRequest, Request, SearchRequest, check_service};
use crate::config::ServiceConfig;
use crate::document::Element;
use crate::error::CswError;
use crate::filter::ConstraintLanguage;
use crate::namespace::{CSW_NAMESPACE, NamespaceTable};
use std::sync::Arc;

/// Dispatches on the root element.
pub fn from_document(root: &Element, config: &ServiceConfig) -> Result<Request, CswError> {
    let scope = root.scope(&config.namespace_table());
    let name = root.qualified_name(&scope)?;
    if name.namespace == CSW_NAMESPACE {
        match name.local.as_str() {
            "GetRecords" => return parse_get_records(root, config).map(Request::GetRecords),
            "GetCapabilities" => {
                return parse_get_capabilities(root).map(Request::GetCapabilities);
            }
            _ => {}
        }
    }
    Err(CswError::OperationNotSupported {
        operation: root.name.clone(),
    })
}

pub fn parse_get_records(
    root: &Element,
    config: &ServiceConfig,
) -> Result<SearchRequest, CswError> {
    let root_scope = root.scope(&config.namespace_table());
    let attr = |name: &str| root.attribute(name).map(str::to_string);

    let mut raw = RawSearch {
        service: attr("service"),
        version: attr("version"),
        request_id: attr("requestId"),
        result_type: attr("resultType"),
        start_position: attr("startPosition"),
        max_records: attr("maxRecords"),
        output_format: attr("outputFormat"),
        output_schema: attr("outputSchema"),
        ..RawSearch::default()
    };

    if let Some(distributed) = root.child("DistributedSearch") {
        raw.distributed_search = Some("true".to_string());
        raw.hop_count = distributed.attribute("hopCount").map(str::to_string);
    }
    raw.response_handler = root
        .child("ResponseHandler")
        .and_then(Element::text)
        .map(str::to_string);

    if let Some(query) = root.child("Query") {
        read_query(query, &root_scope, &mut raw);
    }

    build_search(raw, config)
}

fn read_query(query: &Element, parent: &Arc<NamespaceTable>, raw: &mut RawSearch) {
    let scope = query.scope(parent);
    raw.type_names = name_list(query.attribute("typeNames"), &scope);

    if let Some(element_set) = query.child("ElementSetName") {
        let set_scope = element_set.scope(&scope);
        raw.element_set_name = element_set.text().map(str::to_string);
        raw.element_set_type_names = name_list(element_set.attribute("typeNames"), &set_scope);
    }
    raw.element_names = query
        .children_named("ElementName")
        .filter_map(|element| {
            element
                .text()
                .map(|token| RawName::new(token, &element.scope(&scope)))
        })
        .collect();

    if let Some(constraint) = query.child("Constraint") {
        raw.constraint = Some(read_constraint(constraint, &scope));
    }

    if let Some(sort_by) = query.child("SortBy") {
        let sort_scope = sort_by.scope(&scope);
        raw.sort_by = sort_by
            .children_named("SortProperty")
            .map(|property| read_sort(property, &sort_scope))
            .collect();
    }
}

fn read_constraint(constraint: &Element, parent: &Arc<NamespaceTable>) -> RawConstraint {
    let scope = constraint.scope(parent);
    let version = constraint.attribute("version").map(str::to_string);
    if let Some(filter) = constraint.child("Filter") {
        return RawConstraint {
            language: Some(ConstraintLanguage::Filter.as_str().to_string()),
            version,
            body: Some(RawConstraintBody::Document(filter.clone())),
            scope,
        };
    }
    if let Some(cql) = constraint.child("CqlText") {
        return RawConstraint {
            language: Some(ConstraintLanguage::CqlText.as_str().to_string()),
            version,
            body: cql.text().map(|text| RawConstraintBody::Text(text.to_string())),
            scope: cql.scope(&scope),
        };
    }
    RawConstraint {
        language: None,
        version,
        body: None,
        scope,
    }
}

fn read_sort(property: &Element, parent: &Arc<NamespaceTable>) -> RawSort {
    let scope = property.scope(parent);
    let (token, name_scope) = property
        .children
        .iter()
        .find(|child| matches!(child.local_name(), "PropertyName" | "ValueReference"))
        .map(|child| (child.text().unwrap_or("").to_string(), child.scope(&scope)))
        .unwrap_or_else(|| (String::new(), Arc::clone(&scope)));
    RawSort {
        name: RawName::new(token, &name_scope),
        order: property
            .child("SortOrder")
            .and_then(Element::text)
            .map(str::to_string),
    }
}

fn name_list(raw: Option<&str>, scope: &Arc<NamespaceTable>) -> Vec<RawName> {
    raw.map(|value| {
        value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .map(|token| RawName::new(token, scope))
            .collect()
    })
    .unwrap_or_default()
}

pub fn parse_get_capabilities(root: &Element) -> Result<CapabilitiesRequest, CswError> {
    let service = check_service(root.attribute("service"))?;
    let texts = |container: &str, item: &str| -> Vec<String> {
        root.child(container)
            .map(|list| {
                list.children_named(item)
                    .filter_map(Element::text)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    Ok(CapabilitiesRequest {
        service,
        accept_versions: texts("AcceptVersions", "Version"),
        sections: texts("Sections", "Section"),
        accept_formats: texts("AcceptFormats", "OutputFormat"),
        update_sequence: root.attribute("updateSequence").map(str::to_string),
    })
}
