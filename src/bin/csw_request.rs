//! Normalize a catalogue service request and print it as JSON.
//!
//! Usage:
//!   csw-request --query 'service=CSW&request=GetRecords&version=2.0.2&typeNames=csw:Record'
//!   csw-request --format xml --file get_records.xml
//!   csw-request --format json < request_tree.json
//!
//! Rejected requests print an exception report on stdout and exit 1.

use anyhow::{Context, Result};
use clap::Parser;
use csw_query::{
    CapabilitiesPlan, CswError, ExceptionReport, Request, RequestReader, ServiceConfig,
    plan_capabilities, read_document_json,
};
use serde::Serialize;
use std::fs;
use std::io::{Read, stdin};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "csw-request")]
#[command(about = "Normalize a GetRecords or GetCapabilities request")]
struct Cli {
    /// Input syntax: KVP query string, XML document, or decoded JSON tree.
    #[arg(long, value_parser = ["kvp", "xml", "json"], default_value = "kvp")]
    format: String,
    /// Inline KVP query string (implies --format kvp).
    #[arg(long)]
    query: Option<String>,
    /// Optional input file; reads stdin when neither --query nor --file is given.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Service configuration (JSON); defaults describe a CSW 2.0.2 endpoint.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Normalized {
    request: Request,
    #[serde(skip_serializing_if = "Option::is_none")]
    capabilities: Option<CapabilitiesPlan>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = match cli.config.as_deref() {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::from_env(),
    };
    let reader = RequestReader::new(config)?;

    let outcome = match &cli.query {
        Some(query) => reader.read_query_string(query),
        None => {
            let input = read_input(cli.file.as_deref())?;
            match cli.format.as_str() {
                "xml" => reader.read_xml(&input),
                "json" => reader.read_document(&read_document_json(&input)?),
                _ => reader.read_query_string(&input),
            }
        }
    };

    match outcome.and_then(|request| normalized(request, reader.config())) {
        Ok(output) => println!("{}", serde_json::to_string_pretty(&output)?),
        Err(fault) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ExceptionReport::from(&fault))?
            );
            std::process::exit(1);
        }
    }
    Ok(())
}

fn normalized(request: Request, config: &ServiceConfig) -> Result<Normalized, CswError> {
    let capabilities = match &request {
        Request::GetCapabilities(capabilities) => Some(plan_capabilities(capabilities, config)?),
        Request::GetRecords(_) => None,
    };
    Ok(Normalized {
        request,
        capabilities,
    })
}

fn read_input(file: Option<&Path>) -> Result<String> {
    let mut buf = String::new();
    match file {
        Some(path) => {
            buf = fs::read_to_string(path)
                .with_context(|| format!("reading input file {}", path.display()))?;
        }
        None => {
            stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
        }
    }
    Ok(buf)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
