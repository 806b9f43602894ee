use crate::error::CswError;
use crate::filter::Predicate;
use crate::namespace::QualifiedName;
use crate::plan::{Projection, Window};
use crate::request::{Query, SortProperty};
use serde::Serialize;

/// What a store is asked for: the normalized query reduced to the parts a
/// store acts on, plus a zero-based window.
#[derive(Clone, Copy, Debug)]
pub struct StoreQuery<'a> {
    pub type_names: &'a [QualifiedName],
    pub filter: Option<&'a Predicate>,
    pub sort_by: &'a [SortProperty],
    pub offset: u64,
    /// Maximum records to return; 0 asks for a count only.
    pub limit: u64,
}

impl<'a> StoreQuery<'a> {
    pub fn new(query: &'a Query, window: Window) -> Self {
        Self {
            type_names: &query.type_names,
            filter: query.predicate(),
            sort_by: &query.sort_by,
            offset: window.offset(),
            limit: window.limit(),
        }
    }

    pub fn count_only(query: &'a Query) -> Self {
        Self {
            limit: 0,
            ..Self::new(query, Window::of(query))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreResult<R> {
    pub records: Vec<R>,
    pub total_matched: u64,
}

/// The record store a search runs against.
///
/// Implementations own indexing and evaluation; this crate only hands them
/// resolved names and predicates.
pub trait CatalogStore {
    type Record: Serialize;

    fn search(&self, query: &StoreQuery<'_>) -> Result<StoreResult<Self::Record>, CswError>;

    /// Applies a projection directive to a fetched record.
    fn project(&self, record: Self::Record, projection: &Projection) -> Self::Record;
}
