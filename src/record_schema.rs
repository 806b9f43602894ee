//! The core record schema: CSW records over Dublin Core.
//!
//! Unqualified property names in constraints, sort keys and element lists are
//! resolved here, and the fixed brief/summary/full element sets are published
//! for renderers.

use crate::namespace::{CSW_NAMESPACE, DC_NAMESPACE, DCT_NAMESPACE, OWS_NAMESPACE, QualifiedName};
use serde::{Deserialize, Serialize};

/// Pseudo-property denoting a free-text match across the whole record.
pub const ANY_TEXT: &str = "AnyText";
pub const RECORD_TYPE: &str = "Record";

const DC_ELEMENTS: &[&str] = &[
    "contributor",
    "coverage",
    "creator",
    "date",
    "description",
    "format",
    "identifier",
    "language",
    "publisher",
    "relation",
    "rights",
    "source",
    "subject",
    "title",
    "type",
];

const DCT_TERMS: &[&str] = &[
    "abstract",
    "accessRights",
    "alternative",
    "audience",
    "available",
    "bibliographicCitation",
    "conformsTo",
    "created",
    "dateAccepted",
    "dateCopyrighted",
    "dateSubmitted",
    "educationLevel",
    "extent",
    "hasFormat",
    "hasPart",
    "hasVersion",
    "isFormatOf",
    "isPartOf",
    "isReferencedBy",
    "isReplacedBy",
    "isRequiredBy",
    "isVersionOf",
    "issued",
    "license",
    "mediator",
    "medium",
    "modified",
    "provenance",
    "references",
    "replaces",
    "requires",
    "rightsHolder",
    "spatial",
    "tableOfContents",
    "temporal",
    "valid",
];

const BOUNDING_BOX: &str = "BoundingBox";

/// Named record projection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementSet {
    Brief,
    #[default]
    Summary,
    Full,
}

impl ElementSet {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "brief" => Some(ElementSet::Brief),
            "summary" => Some(ElementSet::Summary),
            "full" => Some(ElementSet::Full),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementSet::Brief => "brief",
            ElementSet::Summary => "summary",
            ElementSet::Full => "full",
        }
    }

    /// Elements rendered for this set; `None` means every element.
    pub fn members(self) -> Option<Vec<QualifiedName>> {
        let brief = [
            dc("identifier"),
            dc("title"),
            dc("type"),
            QualifiedName::new(OWS_NAMESPACE, BOUNDING_BOX),
        ];
        match self {
            ElementSet::Brief => Some(brief.to_vec()),
            ElementSet::Summary => {
                let mut members = brief.to_vec();
                members.extend([
                    dc("subject"),
                    dc("format"),
                    dc("relation"),
                    dct("modified"),
                    dct("abstract"),
                    dct("spatial"),
                ]);
                Some(members)
            }
            ElementSet::Full => None,
        }
    }
}

fn dc(local: &str) -> QualifiedName {
    QualifiedName::new(DC_NAMESPACE, local)
}

fn dct(local: &str) -> QualifiedName {
    QualifiedName::new(DCT_NAMESPACE, local)
}

/// `csw:Record`, the type name unprefixed type names default to.
pub fn record_type() -> QualifiedName {
    QualifiedName::new(CSW_NAMESPACE, RECORD_TYPE)
}

/// Resolves an unqualified record property name.
///
/// Dublin Core elements win over DC terms; unknown names fall back to the
/// Dublin Core namespace.
pub fn property_name(local: &str) -> QualifiedName {
    if DC_ELEMENTS.contains(&local) {
        dc(local)
    } else if DCT_TERMS.contains(&local) {
        dct(local)
    } else if local == BOUNDING_BOX {
        QualifiedName::new(OWS_NAMESPACE, BOUNDING_BOX)
    } else {
        dc(local)
    }
}

/// Whether `name` denotes the cross-field text pseudo-property.
pub fn is_any_text(name: &QualifiedName) -> bool {
    name.local == ANY_TEXT && (name.namespace.is_empty() || name.namespace == CSW_NAMESPACE)
}

/// Structural path below a record property.
///
/// Dublin Core values are compound in the record model: `dc:title` holds its
/// literal under `dc:value`.
pub fn structural_path(name: &QualifiedName) -> Vec<QualifiedName> {
    if name.namespace == DC_NAMESPACE || name.namespace == DCT_NAMESPACE {
        vec![dc("value")]
    } else {
        Vec::new()
    }
}
