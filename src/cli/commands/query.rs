//! SQL query CLI command
//!
//! Runs a query in a fresh session with the configured sources attached.

use std::path::PathBuf;
use std::time::Instant;

use crate::cli::error::CliError;
use crate::cli::{load_config, selected_sources};
use crate::engine::{OutputFormat, format_query_result};
use crate::session::with_session;

/// Query command arguments
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// SQL query to execute
    pub sql: String,
    pub config: Option<PathBuf>,
    /// Empty for every configured source
    pub sources: Vec<String>,
    /// Output format
    pub format: String,
}

/// Execute a SQL query against the configured sources
pub fn handle_query(args: &QueryArgs) -> Result<(), CliError> {
    let output_format: OutputFormat = args
        .format
        .parse()
        .map_err(|e: String| CliError::InvalidArgument(e))?;

    let config = load_config(args.config.as_deref())?;
    let sources = selected_sources(&config, &args.sources)?;

    let start = Instant::now();
    let result = with_session(&config.factory(), &sources, |session| {
        session.query(&args.sql)
    })?;

    println!("{}", format_query_result(&result, output_format));

    // Print execution time for non-JSON formats
    if output_format != OutputFormat::Json {
        eprintln!("\nExecution time: {}ms", start.elapsed().as_millis());
    }
    Ok(())
}
