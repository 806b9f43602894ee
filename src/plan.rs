//! Result windows and record projections.
//!
//! Given a query's window and the store's total match count, compute the
//! pagination numbers a response reports and the projection every returned
//! record is rendered with. None of this can fail: a start position past
//! the end of the result set simply returns nothing.

use crate::namespace::QualifiedName;
use crate::record_schema::ElementSet;
use crate::request::{Query, ResultType};
use serde::Serialize;

/// Requested window, 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start_position: u32,
    pub max_records: u32,
}

impl Window {
    pub fn new(start_position: u32, max_records: u32) -> Self {
        Self {
            start_position,
            max_records,
        }
    }

    pub fn of(query: &Query) -> Self {
        Self::new(query.start_position, query.max_records)
    }

    /// Zero-based offset into the result set.
    pub fn offset(&self) -> u64 {
        u64::from(self.start_position.max(1)) - 1
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.max_records)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PaginationResult {
    pub matched: u64,
    pub returned: u64,
    /// Start position of the following page; 0 when this page reaches the end.
    pub next_record: u64,
}

pub fn paginate(window: Window, total_matched: u64) -> PaginationResult {
    let offset = window.offset();
    let returned = window.limit().min(total_matched.saturating_sub(offset));
    let next_record = if offset + returned >= total_matched {
        0
    } else {
        offset + 1 + returned
    };
    PaginationResult {
        matched: total_matched,
        returned,
        next_record,
    }
}

/// How each returned record is rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Projection {
    /// Omit the record payload entirely.
    NoRecords,
    ElementSet(ElementSet),
    /// Exactly these elements, in this order.
    Elements(Vec<QualifiedName>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultPlan {
    pub pagination: PaginationResult,
    pub projection: Projection,
}

impl ResultPlan {
    /// Whether the caller should fetch and render records at all.
    pub fn wants_records(&self) -> bool {
        self.projection != Projection::NoRecords
    }
}

pub fn projection(query: &Query) -> Projection {
    match (&query.result_type, &query.element_names) {
        (ResultType::Hits | ResultType::Validate, _) => Projection::NoRecords,
        (ResultType::Results, Some(names)) => Projection::Elements(names.clone()),
        (ResultType::Results, None) => {
            Projection::ElementSet(query.element_set.unwrap_or_default())
        }
    }
}

pub fn plan(query: &Query, total_matched: u64) -> ResultPlan {
    ResultPlan {
        pagination: paginate(Window::of(query), total_matched),
        projection: projection(query),
    }
}
