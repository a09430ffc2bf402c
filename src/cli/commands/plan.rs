//! Plan command implementation
//!
//! Prints the directives a session would execute, with secrets redacted.

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::cli::{load_config, selected_sources};

/// Plan command arguments
#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub config: Option<PathBuf>,
    /// Empty for every configured source
    pub sources: Vec<String>,
    pub json: bool,
}

pub fn handle_plan(args: &PlanArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let sources = selected_sources(&config, &args.sources)?;
    let plan = config.factory().plan(&sources)?;

    if args.json {
        let output = serde_json::to_string_pretty(&plan)
            .map_err(|e| CliError::SerializationError(e.to_string()))?;
        println!("{}", output);
    } else {
        print!("{}", plan);
        eprintln!("\n{} directive(s)", plan.len());
    }
    Ok(())
}
