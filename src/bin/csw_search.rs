//! Run a GetRecords request against a JSON record catalog.
//!
//! Usage:
//!   csw-search --query \
//!     'service=CSW&request=GetRecords&version=2.0.2&typeNames=csw:Record&resultType=results'
//!   csw-search --catalog my_records.json --format xml --file get_records.xml
//!
//! The response (acknowledgement or paginated results) is printed as JSON.
//! Rejected requests print an exception report and exit 1.

use anyhow::{Context, Result};
use clap::Parser;
use csw_query::catalog::SAMPLE_CATALOG_PATH;
use csw_query::{
    CswError, ExceptionReport, MemoryCatalog, Request, RequestReader, ServiceConfig, execute,
    read_document_json,
};
use std::fs;
use std::io::{Read, stdin};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "csw-search")]
#[command(about = "Execute a GetRecords request against a record catalog")]
struct Cli {
    /// Record catalog (csw_record_catalog_v1 JSON); defaults to the bundled sample.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Input syntax: KVP query string, XML document, or decoded JSON tree.
    #[arg(long, value_parser = ["kvp", "xml", "json"], default_value = "kvp")]
    format: String,
    /// Inline KVP query string.
    #[arg(long)]
    query: Option<String>,
    /// Optional input file; reads stdin when neither --query nor --file is given.
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
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
    let catalog_path = cli
        .catalog
        .clone()
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join(SAMPLE_CATALOG_PATH));
    let catalog = MemoryCatalog::load(&catalog_path)?;
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

    let response = outcome.and_then(|request| match request {
        Request::GetRecords(search) => execute(&search, &catalog),
        Request::GetCapabilities(_) => Err(CswError::OperationNotSupported {
            operation: "GetCapabilities".to_string(),
        }),
    });

    match response {
        Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
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

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading input file {}", path.display())),
        None => {
            let mut buf = String::new();
            stdin()
                .read_to_string(&mut buf)
                .context("reading request from stdin")?;
            Ok(buf)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
