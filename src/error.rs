//! Fault taxonomy for request normalization.
//!
//! Every rejection produced by this crate is a [`CswError`]. Each variant
//! carries a machine-readable [`FaultCode`], the OWS exception code a transport
//! should render, and a locator naming the offending parameter so a client can
//! correct exactly one field.

use serde::Serialize;
use thiserror::Error;

/// Machine-readable classification of a [`CswError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FaultCode {
    InvalidParameterValue,
    MissingParameterValue,
    UnresolvedPrefix,
    MalformedNamespaceDeclaration,
    ConstraintSyntax,
    VersionNegotiation,
    SchemaValidation,
    OperationNotSupported,
}

impl FaultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::InvalidParameterValue => "InvalidParameterValueError",
            FaultCode::MissingParameterValue => "MissingParameterValueError",
            FaultCode::UnresolvedPrefix => "UnresolvedPrefixError",
            FaultCode::MalformedNamespaceDeclaration => "MalformedNamespaceDeclarationError",
            FaultCode::ConstraintSyntax => "ConstraintSyntaxError",
            FaultCode::VersionNegotiation => "VersionNegotiationError",
            FaultCode::SchemaValidation => "SchemaValidationError",
            FaultCode::OperationNotSupported => "OperationNotSupportedError",
        }
    }

    /// Exception code used in an OWS 1.0 exception report.
    pub fn ows_code(self) -> &'static str {
        match self {
            FaultCode::InvalidParameterValue
            | FaultCode::UnresolvedPrefix
            | FaultCode::MalformedNamespaceDeclaration
            | FaultCode::ConstraintSyntax => "InvalidParameterValue",
            FaultCode::MissingParameterValue => "MissingParameterValue",
            FaultCode::VersionNegotiation => "VersionNegotiationFailed",
            FaultCode::OperationNotSupported => "OperationNotSupported",
            FaultCode::SchemaValidation => "NoApplicableCode",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CswError {
    #[error("invalid value for parameter '{locator}': {message}")]
    InvalidParameterValue { locator: String, message: String },

    #[error("missing value for parameter '{locator}'")]
    MissingParameterValue { locator: String },

    #[error("namespace prefix '{prefix}' is not bound{}", describe_locator(.locator))]
    UnresolvedPrefix { prefix: String, locator: String },

    #[error("malformed namespace declaration '{declaration}': {message}")]
    MalformedNamespaceDeclaration { declaration: String, message: String },

    #[error("constraint syntax error{}: {message}", describe_position(.offset, .token))]
    ConstraintSyntax {
        offset: Option<usize>,
        token: String,
        message: String,
    },

    #[error("version negotiation failed: {message}")]
    VersionNegotiation { message: String },

    /// Raised by the document validator; details are passed through verbatim.
    #[error("request document failed schema validation:\n{}", .details.join("\n"))]
    SchemaValidation { details: Vec<String> },

    #[error("operation '{operation}' is not supported")]
    OperationNotSupported { operation: String },
}

fn describe_locator(locator: &str) -> String {
    if locator.is_empty() {
        String::new()
    } else {
        format!(" (in '{locator}')")
    }
}

fn describe_position(offset: &Option<usize>, token: &str) -> String {
    match (offset, token.is_empty()) {
        (Some(offset), false) => format!(" at offset {offset} near '{token}'"),
        (Some(offset), true) => format!(" at offset {offset}"),
        (None, false) => format!(" in '{token}'"),
        (None, true) => String::new(),
    }
}

impl CswError {
    pub fn invalid(locator: impl Into<String>, message: impl Into<String>) -> Self {
        CswError::InvalidParameterValue {
            locator: locator.into(),
            message: message.into(),
        }
    }

    pub fn missing(locator: impl Into<String>) -> Self {
        CswError::MissingParameterValue {
            locator: locator.into(),
        }
    }

    pub fn unresolved_prefix(prefix: impl Into<String>) -> Self {
        CswError::UnresolvedPrefix {
            prefix: prefix.into(),
            locator: String::new(),
        }
    }

    pub fn malformed_namespace(declaration: impl Into<String>, message: impl Into<String>) -> Self {
        CswError::MalformedNamespaceDeclaration {
            declaration: declaration.into(),
            message: message.into(),
        }
    }

    /// Syntax error in constraint text, positioned by byte offset.
    pub fn syntax_at(offset: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        CswError::ConstraintSyntax {
            offset: Some(offset),
            token: token.into(),
            message: message.into(),
        }
    }

    /// Syntax error in a structured filter, positioned by element name.
    pub fn syntax_in(element: impl Into<String>, message: impl Into<String>) -> Self {
        CswError::ConstraintSyntax {
            offset: None,
            token: element.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> FaultCode {
        match self {
            CswError::InvalidParameterValue { .. } => FaultCode::InvalidParameterValue,
            CswError::MissingParameterValue { .. } => FaultCode::MissingParameterValue,
            CswError::UnresolvedPrefix { .. } => FaultCode::UnresolvedPrefix,
            CswError::MalformedNamespaceDeclaration { .. } => {
                FaultCode::MalformedNamespaceDeclaration
            }
            CswError::ConstraintSyntax { .. } => FaultCode::ConstraintSyntax,
            CswError::VersionNegotiation { .. } => FaultCode::VersionNegotiation,
            CswError::SchemaValidation { .. } => FaultCode::SchemaValidation,
            CswError::OperationNotSupported { .. } => FaultCode::OperationNotSupported,
        }
    }

    /// Name of the parameter or field the fault is about, when known.
    pub fn locator(&self) -> Option<&str> {
        let locator = match self {
            CswError::InvalidParameterValue { locator, .. }
            | CswError::MissingParameterValue { locator }
            | CswError::UnresolvedPrefix { locator, .. } => locator.as_str(),
            CswError::MalformedNamespaceDeclaration { .. } => "namespace",
            CswError::ConstraintSyntax { .. } => "constraint",
            CswError::VersionNegotiation { .. } => "acceptVersions",
            CswError::OperationNotSupported { .. } => "request",
            CswError::SchemaValidation { .. } => return None,
        };
        if locator.is_empty() {
            None
        } else {
            Some(locator)
        }
    }

    /// Fills in the locator of a fault raised below the parameter level.
    ///
    /// Faults that already name a field keep it.
    pub fn at(self, field: &str) -> Self {
        match self {
            CswError::InvalidParameterValue { locator, message } if locator.is_empty() => {
                CswError::InvalidParameterValue {
                    locator: field.to_string(),
                    message,
                }
            }
            CswError::MissingParameterValue { locator } if locator.is_empty() => {
                CswError::MissingParameterValue {
                    locator: field.to_string(),
                }
            }
            CswError::UnresolvedPrefix { prefix, locator } if locator.is_empty() => {
                CswError::UnresolvedPrefix {
                    prefix,
                    locator: field.to_string(),
                }
            }
            other => other,
        }
    }
}

/// Transport-neutral rendering of a fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExceptionReport {
    pub code: &'static str,
    pub ows_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub message: String,
}

impl From<&CswError> for ExceptionReport {
    fn from(err: &CswError) -> Self {
        let code = err.code();
        ExceptionReport {
            code: code.as_str(),
            ows_code: code.ows_code(),
            locator: err.locator().map(str::to_string),
            message: err.to_string(),
        }
    }
}
