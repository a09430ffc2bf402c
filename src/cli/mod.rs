//! Command-line front end

pub mod commands;
pub mod error;

use std::path::Path;

use crate::config::PipeConfig;
use crate::models::SourceConfig;
use crate::session::select_sources;
use error::CliError;

/// Load the configuration at `path`, or the one named by `QUACKPIPE_CONFIG`
pub fn load_config(path: Option<&Path>) -> Result<PipeConfig, CliError> {
    let path = PipeConfig::resolve_path(path, |key| std::env::var(key).ok());
    if !path.exists() {
        return Err(CliError::ConfigNotFound(path));
    }
    Ok(PipeConfig::load(&path)?)
}

/// Configured sources, narrowed to `names` when given
pub fn selected_sources(
    config: &PipeConfig,
    names: &[String],
) -> Result<Vec<SourceConfig>, CliError> {
    if names.is_empty() {
        Ok(config.sources.clone())
    } else {
        Ok(select_sources(&config.sources, names)?)
    }
}
