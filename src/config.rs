//! Service-side configuration for request normalization and negotiation.
//!
//! Every field has a default matching a plain CSW 2.0.2 endpoint, so an empty
//! JSON object (or no file at all) is a valid configuration. The supported
//! output schemas can be widened from the environment without editing the
//! file, mirroring how deployments register extra record profiles.

use crate::namespace::{CSW_NAMESPACE, NamespaceTable, is_ncname};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const ENV_ALLOWED_OUTPUT_SCHEMAS: &str = "CSW_ALLOWED_OUTPUT_SCHEMAS";
pub const DEFAULT_OUTPUT_FORMAT: &str = "application/xml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Protocol versions, in the service's order of preference.
    pub supported_versions: Vec<String>,
    pub supported_output_schemas: Vec<String>,
    pub supported_output_formats: Vec<String>,
    pub default_max_records: u32,
    pub default_hop_count: u32,
    /// Extra prefix bindings seeded into every request's namespace table.
    pub namespaces: BTreeMap<String, String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            supported_versions: vec!["2.0.2".to_string()],
            supported_output_schemas: vec![CSW_NAMESPACE.to_string()],
            supported_output_formats: vec![
                DEFAULT_OUTPUT_FORMAT.to_string(),
                "text/xml".to_string(),
            ],
            default_max_records: 10,
            default_hop_count: 2,
            namespaces: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Load and validate a JSON configuration file, then apply
    /// [`ENV_ALLOWED_OUTPUT_SCHEMAS`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: ServiceConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config.with_env_overrides())
    }

    /// Defaults plus [`ENV_ALLOWED_OUTPUT_SCHEMAS`].
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        match std::env::var(ENV_ALLOWED_OUTPUT_SCHEMAS) {
            Ok(raw) => self.with_allowed_output_schemas(&raw),
            Err(_) => self,
        }
    }

    /// Adds comma-separated output schemas to the supported set.
    pub fn with_allowed_output_schemas(mut self, raw: &str) -> Self {
        for schema in crate::split_list(raw) {
            if !self.supported_output_schemas.contains(&schema) {
                self.supported_output_schemas.push(schema);
            }
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.supported_output_formats.is_empty() {
            bail!("supported_output_formats must not be empty");
        }
        if self.supported_output_schemas.is_empty() {
            bail!("supported_output_schemas must not be empty");
        }
        for (prefix, uri) in &self.namespaces {
            if !prefix.is_empty() && !is_ncname(prefix) {
                bail!("namespaces: '{prefix}' is not a valid prefix");
            }
            if uri.trim().is_empty() {
                bail!("namespaces: prefix '{prefix}' is bound to an empty URI");
            }
        }
        // An empty version list is allowed: it surfaces as a negotiation
        // fault on the first capabilities request.
        Ok(())
    }

    /// The table every request starts from.
    pub fn namespace_table(&self) -> Arc<NamespaceTable> {
        let mut extra = NamespaceTable::new();
        for (prefix, uri) in &self.namespaces {
            extra.bind(prefix.clone(), uri.clone());
        }
        Arc::new(NamespaceTable::with_defaults().merged(&extra))
    }

    pub fn supports_version(&self, version: &str) -> bool {
        self.supported_versions.iter().any(|v| v == version)
    }

    pub fn supports_output_schema(&self, schema: &str) -> bool {
        self.supported_output_schemas.iter().any(|s| s == schema)
    }

    pub fn supports_output_format(&self, format: &str) -> bool {
        self.supported_output_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(format))
    }
}
