#![allow(dead_code)]

use anyhow::{Context, Result, bail};
use csw_query::catalog::SAMPLE_CATALOG_PATH;
use csw_query::{
    CswError, KvpMap, MemoryCatalog, Request, RequestReader, SearchRequest, ServiceConfig,
};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const CSW_XMLNS: &str = r#"xmlns:csw="http://www.opengis.net/cat/csw/2.0.2""#;
pub const OGC_XMLNS: &str = r#"xmlns:ogc="http://www.opengis.net/ogc""#;

pub fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn sample_catalog_path() -> PathBuf {
    repo_root().join(SAMPLE_CATALOG_PATH)
}

pub fn sample_catalog() -> Result<MemoryCatalog> {
    MemoryCatalog::load(&sample_catalog_path())
}

pub fn reader() -> Result<RequestReader> {
    RequestReader::new(ServiceConfig::default())
}

/// A GetRecords parameter set with the envelope filled in; `extra` entries
/// are appended after it.
pub fn get_records_params(extra: &[(&str, &str)]) -> KvpMap {
    let mut pairs = vec![
        ("service", "CSW"),
        ("version", "2.0.2"),
        ("request", "GetRecords"),
        ("typeNames", "csw:Record"),
    ];
    pairs.extend_from_slice(extra);
    KvpMap::from_pairs(pairs)
}

pub fn read_params(params: &KvpMap) -> Result<Request, CswError> {
    reader()
        .expect("built-in schemas compile")
        .read_parameters(params)
}

pub fn search_from_params(extra: &[(&str, &str)]) -> Result<SearchRequest> {
    expect_search(read_params(&get_records_params(extra))?)
}

pub fn search_from_xml(xml: &str) -> Result<SearchRequest> {
    expect_search(reader()?.read_xml(xml)?)
}

pub fn expect_search(request: Request) -> Result<SearchRequest> {
    match request {
        Request::GetRecords(search) => Ok(search),
        other => bail!("expected GetRecords, got {}", other.operation()),
    }
}

/// Wraps a Query body in a GetRecords envelope declaring `csw` and `ogc`.
pub fn get_records_xml(root_attributes: &str, query: &str) -> String {
    format!(
        r#"<csw:GetRecords {CSW_XMLNS} {OGC_XMLNS} service="CSW" version="2.0.2" {root_attributes}>{query}</csw:GetRecords>"#
    )
}

pub fn helper_binary(name: &str) -> PathBuf {
    match name {
        "csw-request" => PathBuf::from(env!("CARGO_BIN_EXE_csw-request")),
        "csw-search" => PathBuf::from(env!("CARGO_BIN_EXE_csw-search")),
        "schema-validate" => PathBuf::from(env!("CARGO_BIN_EXE_schema-validate")),
        other => repo_root().join("target/debug").join(other),
    }
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to spawn {:?}", cmd.get_program()))?;
    Ok(output)
}

pub fn write_fixture(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, contents)
        .with_context(|| format!("writing fixture {}", path.display()))?;
    Ok(path)
}
