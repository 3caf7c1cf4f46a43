//! `symql`: run connector queries against symbol stores from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use symbol_sql_connector::query::script::{ScriptComposer, SelectScriptRequest};
use symbol_sql_connector::result_format::{render, ResultFormat};
use symbol_sql_connector::storage::demo::transport_store;
use symbol_sql_connector::{ConnectorConfig, Row, SymbolConnector};
use tracing::info;

#[derive(Parser)]
#[command(name = "symql")]
#[command(about = "Query symbol stores with SELECT/FROM/WHERE", long_about = None)]
struct Args {
    /// Connector configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Source folder store locators resolve under; overrides the configuration.
    #[arg(long, global = true)]
    source: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a query and print its rows.
    Query {
        query: String,
        #[arg(long, value_enum, default_value_t = ResultFormat::Table)]
        format: ResultFormat,
        /// Stop after this many rows.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List the symbols of a store with their columns.
    Tables { file: String },
    /// Print the select script for one builder request or a JSON array of them.
    Script {
        /// Request JSON, or `@path` to read it from a file.
        request: String,
        #[arg(long, default_value_t = false)]
        preceding_load: bool,
    },
    /// Write the transport demo store.
    Demo { path: PathBuf },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConnectorConfig::load(path)?,
        None => ConnectorConfig::default(),
    };
    if let Some(source) = args.source {
        config = config.with_source_dir(source);
    }

    // Enable ANSI colors only when stderr is a terminal and NO_COLOR is unset.
    let ansi = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .init();

    match args.command {
        Command::Query { query, format, limit } => run_query(config, &query, format, limit),
        Command::Tables { file } => list_tables(config, &file),
        Command::Script {
            request,
            preceding_load,
        } => print_script(&request, preceding_load),
        Command::Demo { path } => {
            transport_store()?.write_to(&path)?;
            info!(path = %path.display(), "Wrote demo store");
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_query(config: ConnectorConfig, query: &str, format: ResultFormat, limit: Option<usize>) -> Result<()> {
    let connector = SymbolConnector::new(config);
    let (schema, handle) = connector.extract_query(query)?;
    let stream = connector.get_data(handle)?;

    // rows read before a failure are still printed
    let mut rows: Vec<Row> = Vec::new();
    let mut failure = None;
    for row in stream.take(limit.unwrap_or(usize::MAX)) {
        match row {
            Ok(row) => rows.push(row),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    print!("{}", render(format, &schema, &rows)?);
    if format == ResultFormat::Json {
        println!();
    }
    match failure {
        Some(err) => Err(err).context(format!("query failed after {} rows", rows.len())),
        None => Ok(()),
    }
}

fn list_tables(config: ConnectorConfig, file: &str) -> Result<()> {
    let connector = SymbolConnector::new(config);
    for table in connector.list_tables(file)? {
        println!(
            "{} ({}, {} dims): {}",
            table.table,
            table.kind,
            table.dimension_count,
            table.names().join(", ")
        );
    }
    Ok(())
}

fn print_script(request: &str, preceding_load: bool) -> Result<()> {
    let json = match request.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script request from {}", path))?,
        None => request.to_string(),
    };

    let tables: Vec<SelectScriptRequest> = if json.trim_start().starts_with('[') {
        serde_json::from_str(&json).context("Failed to parse script requests")?
    } else {
        vec![serde_json::from_str(&json).context("Failed to parse script request")?]
    };

    let mut composer = ScriptComposer::new();
    println!("{}", composer.generate(&tables, preceding_load));
    Ok(())
}
