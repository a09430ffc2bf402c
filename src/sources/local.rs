//! Local filesystem storage handler
//!
//! A directory read and written with DuckDB's native file functions. Emits
//! no extension or secret directives, only views over listed tables.

use crate::error::{QuackError, QuackResult};
use crate::models::{Directive, SourceCategory, SourceConfig, SourceKind, SourceSpec};
use crate::session::ResolvedSource;

use super::{HandlerRegistry, Sink, SourceHandler, kind_mismatch, parquet_views, validate_common};

pub struct LocalHandler;

impl LocalHandler {
    fn root<'a>(&self, source: &'a SourceConfig) -> QuackResult<&'a str> {
        let SourceSpec::Local(spec) = &source.spec else {
            return Err(kind_mismatch(source, &self.kind()));
        };
        spec.path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| QuackError::invalid(&source.name, "a local source needs a 'path'"))
    }
}

impl SourceHandler for LocalHandler {
    fn kind(&self) -> SourceKind {
        SourceKind::LOCAL
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::LocalPath
    }

    fn validate(&self, source: &SourceConfig, _registry: &HandlerRegistry) -> QuackResult<()> {
        validate_common(source)?;
        self.root(source).map(|_| ())
    }

    fn plan(
        &self,
        source: &ResolvedSource,
        _registry: &HandlerRegistry,
    ) -> QuackResult<Vec<Directive>> {
        let root = self.root(source.config())?;
        Ok(parquet_views(source.config(), root))
    }

    fn sink(&self, source: &SourceConfig) -> QuackResult<Sink> {
        Ok(Sink::Files {
            root: self.root(source)?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_directory_has_no_directives() {
        let source = SourceConfig::local("scratch", "/tmp/scratch");
        let directives = LocalHandler
            .plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
            .unwrap();
        assert!(directives.is_empty());
    }

    #[test]
    fn test_sink_root() {
        let source = SourceConfig::local("scratch", "/tmp/scratch/");
        assert_eq!(
            LocalHandler.sink(&source).unwrap(),
            Sink::Files {
                root: "/tmp/scratch/".to_string()
            }
        );
    }
}
