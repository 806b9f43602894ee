//! JSON Schema validation of decoded request documents.
//!
//! The built-in contracts are compiled into the library; deployments can
//! replace them with files on disk, either bare schemas or descriptor
//! wrappers holding the schema inline (`schema`) or by path
//! (`schema_path`, relative to the descriptor).

use crate::document::Element;
use crate::error::CswError;
use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

const GET_RECORDS_SCHEMA: &str = include_str!("../schema/get_records.schema.json");
const GET_CAPABILITIES_SCHEMA: &str = include_str!("../schema/get_capabilities.schema.json");

/// A compiled validator for one request document type.
pub struct RequestSchema {
    compiled: JSONSchema,
}

impl std::fmt::Debug for RequestSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSchema").finish_non_exhaustive()
    }
}

impl RequestSchema {
    pub fn from_value(schema: &Value) -> Result<Self> {
        // The compile error borrows the schema, so render it before returning.
        let compiled =
            JSONSchema::compile(schema).map_err(|err| anyhow!("compiling schema: {err}"))?;
        Ok(Self { compiled })
    }

    fn builtin(source: &str, label: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(source)
            .with_context(|| format!("parsing built-in {label} schema"))?;
        Self::from_value(&value).with_context(|| format!("built-in {label} schema"))
    }

    pub fn get_records() -> Result<Self> {
        Self::builtin(GET_RECORDS_SCHEMA, "GetRecords")
    }

    pub fn get_capabilities() -> Result<Self> {
        Self::builtin(GET_CAPABILITIES_SCHEMA, "GetCapabilities")
    }

    /// Loads a schema or schema descriptor from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let descriptor_or_schema: Value = serde_json::from_reader(
            File::open(path).with_context(|| format!("opening schema {}", path.display()))?,
        )
        .with_context(|| format!("parsing schema {}", path.display()))?;

        let schema = if let Some(schema_path) = descriptor_or_schema
            .get("schema_path")
            .and_then(Value::as_str)
        {
            let resolved = if Path::new(schema_path).is_absolute() {
                Path::new(schema_path).to_path_buf()
            } else if let Some(base) = path.parent() {
                base.join(schema_path)
            } else {
                Path::new(schema_path).to_path_buf()
            };
            let schema_file = File::open(&resolved).with_context(|| {
                format!(
                    "opening schema {} referenced by {}",
                    resolved.display(),
                    path.display()
                )
            })?;
            serde_json::from_reader(schema_file).with_context(|| {
                format!(
                    "parsing schema {} referenced by {}",
                    resolved.display(),
                    path.display()
                )
            })?
        } else if let Some(inline) = descriptor_or_schema.get("schema") {
            if !inline.is_object() {
                bail!(
                    "schema descriptor {} has a non-object 'schema' field",
                    path.display()
                );
            }
            inline.clone()
        } else {
            descriptor_or_schema
        };

        Self::from_value(&schema).with_context(|| format!("compiling schema {}", path.display()))
    }

    /// Validates a decoded document; every validator message is kept.
    pub fn validate(&self, document: &Element) -> Result<(), CswError> {
        let instance = serde_json::to_value(document).map_err(|err| CswError::SchemaValidation {
            details: vec![format!("document could not be encoded for validation: {err}")],
        })?;
        self.validate_value(&instance)
    }

    pub fn validate_value(&self, instance: &Value) -> Result<(), CswError> {
        if let Err(errors) = self.compiled.validate(instance) {
            let details = errors
                .map(|err| {
                    let path = err.instance_path.to_string();
                    if path.is_empty() {
                        err.to_string()
                    } else {
                        format!("{path}: {err}")
                    }
                })
                .collect::<Vec<_>>();
            return Err(CswError::SchemaValidation { details });
        }
        Ok(())
    }
}

/// Validators for every supported request document, keyed by root element.
#[derive(Debug)]
pub struct RequestSchemas {
    pub get_records: RequestSchema,
    pub get_capabilities: RequestSchema,
}

impl RequestSchemas {
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            get_records: RequestSchema::get_records()?,
            get_capabilities: RequestSchema::get_capabilities()?,
        })
    }

    /// The validator for a document's root element, by local name.
    pub fn for_root(&self, root: &Element) -> Option<&RequestSchema> {
        match root.local_name() {
            "GetRecords" => Some(&self.get_records),
            "GetCapabilities" => Some(&self.get_capabilities),
            _ => None,
        }
    }
}
