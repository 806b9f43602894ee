//! Catalog store collaborator.
//!
//! [`CatalogStore`] is the seam a search executes against. [`MemoryCatalog`]
//! is the reference implementation used by the CLIs and tests: a linear scan
//! over Dublin Core records loaded from a JSON file (for example
//! `catalogs/sample_records.json`).

pub mod memory;
pub mod store;

pub use memory::{MemoryCatalog, Record, RecordField};
pub use store::{CatalogStore, StoreQuery, StoreResult};

/// Relative path to the bundled sample catalog.
pub const SAMPLE_CATALOG_PATH: &str = "catalogs/sample_records.json";
