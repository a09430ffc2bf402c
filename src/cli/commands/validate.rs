//! Validate command implementation

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::cli::load_config;

/// Validate command arguments
#[derive(Debug, Clone)]
pub struct ValidateArgs {
    pub config: Option<PathBuf>,
}

/// Check names, kinds and lake roles without resolving any secret
pub fn handle_validate(args: &ValidateArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    config.factory().validate(&config.sources)?;

    println!(
        "Validation successful: {} source(s) ({})",
        config.sources.len(),
        config.source_names().join(", ")
    );
    Ok(())
}
