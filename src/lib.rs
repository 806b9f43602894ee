//! Catalogue service request normalization.
//!
//! Turns GetRecords/GetCapabilities requests, written as key/value
//! parameters or as request documents, into one validated model; parses
//! CQL and structured filter constraints into a shared predicate tree;
//! negotiates capabilities; and plans result windows and record
//! projections for a catalog store.

pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod namespace;
pub mod plan;
pub mod reader;
pub mod record_schema;
pub mod request;
pub mod schema;
pub mod search;
pub mod xml;

pub use capabilities::{CapabilitiesPlan, Section, negotiate, plan_capabilities};
pub use catalog::{CatalogStore, MemoryCatalog, StoreQuery, StoreResult};
pub use config::ServiceConfig;
pub use document::Element;
pub use error::{CswError, ExceptionReport, FaultCode};
pub use filter::{ConstraintLanguage, Expression, Literal, Predicate, PropertyReference};
pub use namespace::{NamespaceTable, QualifiedName};
pub use plan::{PaginationResult, Projection, ResultPlan, Window, paginate, plan};
pub use reader::RequestReader;
pub use record_schema::ElementSet;
pub use request::kvp::KvpMap;
pub use request::{CapabilitiesRequest, Query, Request, ResultType, SearchRequest};
pub use schema::{RequestSchema, RequestSchemas};
pub use search::{SearchResponse, SearchResults, execute};

use anyhow::{Context, Result, bail};

/// Splits a comma-separated parameter value, dropping blank entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a request document already decoded into its JSON tree form.
pub fn read_document_json(input: &str) -> Result<Element> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        bail!("no request document provided");
    }
    serde_json::from_str(trimmed).context("parsing request document tree")
}
