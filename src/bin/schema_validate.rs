//! Validate request documents or record catalogs.
//!
//! Usage:
//!   schema-validate --mode request --file get_records.xml
//!   schema-validate --mode request --format json < request_tree.json
//!   schema-validate --mode request --schema my_schema.json --file get_records.xml
//!   schema-validate --mode catalog --file catalogs/sample_records.json

use anyhow::{Context, Result, bail};
use clap::Parser;
use csw_query::xml::parse_document;
use csw_query::{Element, MemoryCatalog, RequestSchema, RequestSchemas, read_document_json};
use std::fs::File;
use std::io::{Read, stdin};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "schema-validate")]
#[command(about = "Validate request documents or record catalogs")]
struct Cli {
    /// Validation mode: request or catalog.
    #[arg(long, value_parser = ["request", "catalog"], default_value = "request")]
    mode: String,
    /// Request document syntax (request mode only).
    #[arg(long, value_parser = ["xml", "json"], default_value = "xml")]
    format: String,
    /// Optional input file; reads stdin when omitted (catalog mode requires a file).
    #[arg(long)]
    file: Option<PathBuf>,
    /// Optional schema descriptor overriding the built-in request schemas.
    #[arg(long)]
    schema: Option<PathBuf>,
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    let mut buf = String::new();
    if let Some(path) = file {
        File::open(path)
            .with_context(|| format!("opening input file {}", path.display()))?
            .read_to_string(&mut buf)
            .with_context(|| format!("reading input file {}", path.display()))?;
    } else {
        stdin()
            .read_to_string(&mut buf)
            .context("reading stdin for request document")?;
    }
    Ok(buf)
}

fn validate_request(cli: &Cli) -> Result<()> {
    let input = read_input(cli.file.as_ref())?;
    let root: Element = match cli.format.as_str() {
        "json" => read_document_json(&input)?,
        _ => parse_document(&input).context("decoding request document")?,
    };

    let result = match &cli.schema {
        Some(path) => RequestSchema::load(path)?.validate(&root),
        None => {
            let schemas = RequestSchemas::builtin()?;
            let Some(schema) = schemas.for_root(&root) else {
                bail!("no request schema for root element '{}'", root.name);
            };
            schema.validate(&root)
        }
    };
    result.map_err(anyhow::Error::from)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.mode.as_str() {
        "request" => validate_request(&cli)?,
        "catalog" => {
            let Some(path) = cli.file.as_ref() else {
                bail!("--file is required in catalog mode");
            };
            MemoryCatalog::load(path)?;
        }
        other => bail!("unknown mode '{}'", other),
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
