//! Linear-scan catalog over Dublin Core records.
//!
//! The catalog file is strict: an unexpected schema version, a record
//! without `dc:identifier`, or a duplicate identifier fails the load rather
//! than producing a partial catalog.

use super::store::{CatalogStore, StoreQuery, StoreResult};
use crate::error::CswError;
use crate::filter::{self, ComparisonOp, Expression, Predicate};
use crate::namespace::{DC_NAMESPACE, NamespaceTable, QualifiedName};
use crate::plan::Projection;
use crate::record_schema;
use crate::request::{SortOrder, SortProperty};
use anyhow::{Context, Result, anyhow, bail};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

const CATALOG_SCHEMA_VERSION: &str = "csw_record_catalog_v1";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordField {
    pub name: QualifiedName,
    pub values: Vec<String>,
}

/// A record as an ordered list of fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<RecordField>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends values to `name`, creating the field on first use.
    pub fn with(mut self, name: QualifiedName, values: impl IntoIterator<Item = String>) -> Self {
        self.push(name, values);
        self
    }

    fn push(&mut self, name: QualifiedName, values: impl IntoIterator<Item = String>) {
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(field) => field.values.extend(values),
            None => self.fields.push(RecordField {
                name,
                values: values.into_iter().collect(),
            }),
        }
    }

    pub fn fields(&self) -> &[RecordField] {
        &self.fields
    }

    pub fn identifier(&self) -> Option<&str> {
        self.values(&QualifiedName::new(DC_NAMESPACE, "identifier"))
            .first()
            .map(String::as_str)
    }

    pub fn values(&self, name: &QualifiedName) -> &[String] {
        self.fields
            .iter()
            .find(|field| &field.name == name)
            .map(|field| field.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_values(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .flat_map(|field| field.values.iter().map(String::as_str))
    }

    /// The record reduced to a projection, in the projection's order.
    pub fn project(&self, projection: &Projection) -> Record {
        let names = match projection {
            Projection::NoRecords => return Record::new(),
            Projection::ElementSet(set) => match set.members() {
                Some(members) => members,
                None => return self.clone(),
            },
            Projection::Elements(names) => names.clone(),
        };
        Record {
            fields: names
                .iter()
                .filter_map(|name| self.fields.iter().find(|field| &field.name == name).cloned())
                .collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let table = NamespaceTable::with_defaults();
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            let key = table.render(&field.name);
            match field.values.as_slice() {
                [single] => map.serialize_entry(&key, single)?,
                values => map.serialize_entry(&key, values)?,
            }
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    schema_version: String,
    records: Vec<BTreeMap<String, Value>>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCatalog {
    records: Vec<Record>,
}

impl MemoryCatalog {
    /// Load and validate a catalog file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        if file.schema_version != CATALOG_SCHEMA_VERSION {
            bail!(
                "unsupported catalog schema_version '{}', expected {}",
                file.schema_version,
                CATALOG_SCHEMA_VERSION
            );
        }
        let table = NamespaceTable::with_defaults();
        let records = file
            .records
            .iter()
            .enumerate()
            .map(|(index, raw)| {
                record_from_json(raw, &table).with_context(|| format!("catalog record {index}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let catalog = Self::from_records(records)
            .with_context(|| format!("loading catalog {}", path.display()))?;
        debug!(records = catalog.len(), path = %path.display(), "loaded catalog");
        Ok(catalog)
    }

    /// Builds a catalog, rejecting records without a unique identifier.
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for record in &records {
            let id = record
                .identifier()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| anyhow!("record without dc:identifier"))?;
            if !seen.insert(id.to_string()) {
                bail!("duplicate record identifier '{id}'");
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

fn record_from_json(raw: &BTreeMap<String, Value>, table: &NamespaceTable) -> Result<Record> {
    let mut record = Record::new();
    for (key, value) in raw {
        let name = filter::resolve_property_name(key, table)
            .map_err(|err| anyhow!("{key}: {err}"))?;
        let values = match value {
            Value::String(text) => vec![text.clone()],
            Value::Number(number) => vec![number.to_string()],
            Value::Bool(flag) => vec![flag.to_string()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => Ok(text.clone()),
                    Value::Number(number) => Ok(number.to_string()),
                    other => Err(anyhow!("{key}: unsupported array item {other}")),
                })
                .collect::<Result<Vec<_>>>()?,
            Value::Null => continue,
            Value::Object(_) => bail!("{key}: nested objects are not supported"),
        };
        record.push(name, values);
    }
    Ok(record)
}

impl CatalogStore for MemoryCatalog {
    type Record = Record;

    fn search(&self, query: &StoreQuery<'_>) -> Result<StoreResult<Record>, CswError> {
        let record_type = record_schema::record_type();
        if !query.type_names.contains(&record_type) {
            return Err(CswError::invalid(
                "typeNames",
                "none of the requested types is served by this catalog",
            ));
        }

        let mut matched: Vec<&Record> = self
            .records
            .iter()
            .filter(|record| query.filter.is_none_or(|predicate| evaluate(predicate, record)))
            .collect();
        if !query.sort_by.is_empty() {
            matched.sort_by(|a, b| compare_records(a, b, query.sort_by));
        }

        let total_matched = matched.len() as u64;
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let records = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(StoreResult {
            records,
            total_matched,
        })
    }

    fn project(&self, record: Record, projection: &Projection) -> Record {
        record.project(projection)
    }
}

fn values_of(expression: &Expression, record: &Record) -> Vec<String> {
    match expression {
        Expression::Property(reference) => record.values(&reference.name).to_vec(),
        Expression::AnyText => record.all_values().map(str::to_string).collect(),
        Expression::Literal(literal) => vec![literal.to_string()],
    }
}

fn compare_values(a: &str, b: &str, match_case: bool) -> Ordering {
    if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if match_case {
        a.cmp(b)
    } else {
        a.to_lowercase().cmp(&b.to_lowercase())
    }
}

fn satisfies(op: ComparisonOp, ordering: Ordering) -> bool {
    match op {
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::NotEqual => ordering != Ordering::Equal,
        ComparisonOp::Less => ordering == Ordering::Less,
        ComparisonOp::Greater => ordering == Ordering::Greater,
        ComparisonOp::LessOrEqual => ordering != Ordering::Greater,
        ComparisonOp::GreaterOrEqual => ordering != Ordering::Less,
    }
}

/// Multi-valued operands match when any pair of values does.
fn evaluate(predicate: &Predicate, record: &Record) -> bool {
    match predicate {
        Predicate::Include => true,
        Predicate::Exclude => false,
        Predicate::And(parts) => parts.iter().all(|part| evaluate(part, record)),
        Predicate::Or(parts) => parts.iter().any(|part| evaluate(part, record)),
        Predicate::Not(inner) => !evaluate(inner, record),
        Predicate::Comparison {
            op,
            left,
            right,
            match_case,
        } => {
            let right = values_of(right, record);
            values_of(left, record).iter().any(|l| {
                right
                    .iter()
                    .any(|r| satisfies(*op, compare_values(l, r, *match_case)))
            })
        }
        Predicate::Like {
            expression,
            pattern,
            match_case,
        } => values_of(expression, record)
            .iter()
            .any(|value| pattern.matches(value, *match_case)),
        Predicate::IsNull(expression) => values_of(expression, record).is_empty(),
        Predicate::Between {
            expression,
            lower,
            upper,
        } => {
            let lower = values_of(lower, record);
            let upper = values_of(upper, record);
            values_of(expression, record).iter().any(|value| {
                lower
                    .iter()
                    .any(|l| compare_values(value, l, true) != Ordering::Less)
                    && upper
                        .iter()
                        .any(|u| compare_values(value, u, true) != Ordering::Greater)
            })
        }
        Predicate::Ids(ids) => record
            .identifier()
            .is_some_and(|id| ids.iter().any(|candidate| candidate == id)),
    }
}

// Records without a value for a key sort after those with one.
fn compare_records(a: &Record, b: &Record, sort_by: &[SortProperty]) -> Ordering {
    for key in sort_by {
        let left = a.values(&key.property.name).first();
        let right = b.values(&key.property.name).first();
        let ordering = match (left, right) {
            (Some(l), Some(r)) => {
                let ordering = compare_values(l, r, true);
                match key.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
