//! Entry point tying configuration, document validation and normalization
//! together for one service.

use crate::config::ServiceConfig;
use crate::document::Element;
use crate::error::CswError;
use crate::request::{Request, document, kvp};
use crate::request::kvp::KvpMap;
use crate::schema::RequestSchemas;
use crate::xml;
use anyhow::Result;
use tracing::debug;

#[derive(Debug)]
pub struct RequestReader {
    config: ServiceConfig,
    schemas: RequestSchemas,
}

impl RequestReader {
    /// Reader using the built-in request schemas.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        Ok(Self::with_schemas(config, RequestSchemas::builtin()?))
    }

    pub fn with_schemas(config: ServiceConfig, schemas: RequestSchemas) -> Self {
        Self { config, schemas }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn read_parameters(&self, params: &KvpMap) -> Result<Request, CswError> {
        kvp::from_parameters(params, &self.config)
    }

    pub fn read_query_string(&self, query: &str) -> Result<Request, CswError> {
        self.read_parameters(&KvpMap::from_query_string(query))
    }

    /// Validates a decoded document against the schema for its root element,
    /// then normalizes it. Validation failures are returned unchanged.
    pub fn read_document(&self, root: &Element) -> Result<Request, CswError> {
        if let Some(schema) = self.schemas.for_root(root) {
            schema.validate(root)?;
        }
        let request = document::from_document(root, &self.config)?;
        debug!(operation = request.operation(), "read request document");
        Ok(request)
    }

    /// Decodes XML text and reads it as a request document. Text that is not
    /// well-formed fails validation like any other non-conformant document.
    pub fn read_xml(&self, text: &str) -> Result<Request, CswError> {
        let root = xml::parse_document(text).map_err(|err| CswError::SchemaValidation {
            details: vec![err.to_string()],
        })?;
        self.read_document(&root)
    }
}
