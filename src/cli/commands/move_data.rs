//! Move command implementation

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::cli::load_config;
use crate::etl::{FileFormat, MoveRequest, WriteMode, move_data};

/// Move command arguments
#[derive(Debug, Clone)]
pub struct MoveArgs {
    pub config: Option<PathBuf>,
    pub query: String,
    pub destination: String,
    pub table: String,
    pub mode: String,
    pub format: String,
    /// Empty for every configured source
    pub sources: Vec<String>,
}

pub fn handle_move(args: &MoveArgs) -> Result<(), CliError> {
    let mode: WriteMode = args.mode.parse().map_err(CliError::InvalidArgument)?;
    let format: FileFormat = args.format.parse().map_err(CliError::InvalidArgument)?;

    let config = load_config(args.config.as_deref())?;
    let mut request = MoveRequest::new(&args.query, &args.destination, &args.table)
        .with_mode(mode)
        .with_format(format);
    if !args.sources.is_empty() {
        request = request.with_sources(args.sources.iter().cloned());
    }

    let report = move_data(&config.factory(), &config.sources, &request)?;
    println!(
        "Wrote {} row(s) to {} ({}, {}ms)",
        report.rows_written, report.target, report.mode, report.elapsed_ms
    );
    Ok(())
}
