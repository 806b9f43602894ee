//! GetRecords execution against a [`CatalogStore`].

use crate::catalog::{CatalogStore, StoreQuery};
use crate::error::CswError;
use crate::plan::{self, PaginationResult, Projection, ResultPlan};
use crate::request::{ResultType, SearchRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchResponse<R> {
    /// `resultType=validate`: the request parsed and validated.
    Acknowledgement {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Results(SearchResults<R>),
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResults<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub pagination: PaginationResult,
    pub projection: Projection,
    pub records: Vec<R>,
}

pub fn execute<S: CatalogStore>(
    request: &SearchRequest,
    store: &S,
) -> Result<SearchResponse<S::Record>, CswError> {
    let query = &request.query;
    let timestamp = Utc::now();

    if query.result_type == ResultType::Validate {
        debug!("validate request acknowledged without searching");
        return Ok(SearchResponse::Acknowledgement {
            request_id: request.request_id.clone(),
            timestamp,
        });
    }

    let store_query = match query.result_type {
        ResultType::Results => StoreQuery::new(query, plan::Window::of(query)),
        _ => StoreQuery::count_only(query),
    };
    let found = store.search(&store_query)?;
    let ResultPlan {
        pagination,
        projection,
    } = plan::plan(query, found.total_matched);

    let records = if projection == Projection::NoRecords {
        Vec::new()
    } else {
        found
            .records
            .into_iter()
            .take(usize::try_from(pagination.returned).unwrap_or(usize::MAX))
            .map(|record| store.project(record, &projection))
            .collect()
    };
    debug!(
        matched = pagination.matched,
        returned = pagination.returned,
        next_record = pagination.next_record,
        "search executed"
    );

    Ok(SearchResponse::Results(SearchResults {
        request_id: request.request_id.clone(),
        timestamp,
        pagination,
        projection,
        records,
    }))
}
