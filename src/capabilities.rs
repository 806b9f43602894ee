//! GetCapabilities negotiation: protocol version, sections and format.

use crate::config::{DEFAULT_OUTPUT_FORMAT, ServiceConfig};
use crate::error::CswError;
use crate::request::CapabilitiesRequest;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Section {
    ServiceIdentification,
    ServiceProvider,
    OperationsMetadata,
    #[serde(rename = "Filter_Capabilities")]
    FilterCapabilities,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::ServiceIdentification,
        Section::ServiceProvider,
        Section::OperationsMetadata,
        Section::FilterCapabilities,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::ServiceIdentification => "ServiceIdentification",
            Section::ServiceProvider => "ServiceProvider",
            Section::OperationsMetadata => "OperationsMetadata",
            Section::FilterCapabilities => "Filter_Capabilities",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == raw.trim())
    }
}

/// Picks the protocol version for the rest of the exchange.
///
/// The first accepted version the service supports wins. Failing that, the
/// lowest supported version above the lowest accepted one; failing that, the
/// highest supported version. An empty accepted list gets the highest
/// supported version.
pub fn negotiate(accepted: &[String], supported: &[String]) -> Result<String, CswError> {
    if supported.is_empty() {
        return Err(CswError::VersionNegotiation {
            message: "the service declares no supported versions".to_string(),
        });
    }

    if let Some(exact) = accepted
        .iter()
        .map(|version| version.trim())
        .find(|version| supported.iter().any(|s| s == version))
    {
        return Ok(exact.to_string());
    }

    let highest = supported
        .iter()
        .max_by(|a, b| compare_versions(a, b))
        .cloned()
        .unwrap_or_default();

    let lowest_accepted = accepted
        .iter()
        .filter(|version| {
            let parseable = parse_version(version).is_some();
            if !parseable {
                warn!(version = version.as_str(), "ignoring unparseable accepted version");
            }
            parseable
        })
        .min_by(|a, b| compare_versions(a, b));

    let Some(lowest_accepted) = lowest_accepted else {
        return Ok(highest);
    };

    Ok(supported
        .iter()
        .filter(|version| compare_versions(version, lowest_accepted) == Ordering::Greater)
        .min_by(|a, b| compare_versions(a, b))
        .cloned()
        .unwrap_or(highest))
}

fn parse_version(raw: &str) -> Option<Vec<u64>> {
    raw.trim()
        .split('.')
        .map(|part| part.parse::<u64>().ok())
        .collect()
}

/// Numeric, component-wise comparison; missing components count as zero.
/// Unparseable versions sort below every parseable one.
fn compare_versions(a: &str, b: &str) -> Ordering {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => {
            let len = a.len().max(b.len());
            let pad = |v: &[u64], i: usize| v.get(i).copied().unwrap_or(0);
            (0..len)
                .map(|i| pad(&a, i).cmp(&pad(&b, i)))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Sections to include, in document order. An empty request or `All` means
/// every section; unknown names are dropped without error.
pub fn select_sections(requested: &[String]) -> Vec<Section> {
    if requested.is_empty() || requested.iter().any(|name| name.trim() == "All") {
        return Section::ALL.to_vec();
    }
    let mut selected = Vec::new();
    for name in requested {
        match Section::parse(name) {
            Some(section) if !selected.contains(&section) => selected.push(section),
            Some(_) => {}
            None => warn!(section = name.as_str(), "ignoring unknown capabilities section"),
        }
    }
    selected.sort();
    selected
}

/// First accepted format the service can produce, else the default.
pub fn negotiate_format(accepted: &[String], supported: &[String]) -> String {
    accepted
        .iter()
        .map(|format| format.trim())
        .find(|format| supported.iter().any(|s| s.eq_ignore_ascii_case(format)))
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string())
}

/// Outcome of capabilities negotiation handed to the rendering collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapabilitiesPlan {
    pub version: String,
    pub sections: Vec<Section>,
    pub output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_sequence: Option<String>,
}

pub fn plan_capabilities(
    request: &CapabilitiesRequest,
    config: &ServiceConfig,
) -> Result<CapabilitiesPlan, CswError> {
    Ok(CapabilitiesPlan {
        version: negotiate(&request.accept_versions, &config.supported_versions)?,
        sections: select_sections(&request.sections),
        output_format: negotiate_format(&request.accept_formats, &config.supported_output_formats),
        update_sequence: request.update_sequence.clone(),
    })
}
