//! Embedded file database handlers
//!
//! SQLite files need the `sqlite` extension; DuckDB files are attached
//! natively and need no extension at all.

use crate::error::{QuackError, QuackResult};
use crate::models::{
    AttachDirective, Directive, FileSpec, SourceCategory, SourceConfig, SourceKind, SourceSpec,
};
use crate::session::ResolvedSource;

use super::{HandlerRegistry, Sink, SourceHandler, kind_mismatch, table_views, validate_common};

/// DuckDB extension providing the sqlite scanner
pub const EXTENSION: &str = "sqlite";

fn file_spec<'a>(source: &'a SourceConfig, kind: &SourceKind) -> QuackResult<&'a FileSpec> {
    match (&source.spec, kind.as_str()) {
        (SourceSpec::Sqlite(spec), "sqlite") | (SourceSpec::DuckDb(spec), "duckdb") => Ok(spec),
        _ => Err(kind_mismatch(source, kind)),
    }
}

fn required_path<'a>(source: &'a SourceConfig, kind: &SourceKind) -> QuackResult<&'a str> {
    file_spec(source, kind)?
        .path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| QuackError::invalid(&source.name, "a 'path' to the database file is required"))
}

fn attach(source: &ResolvedSource, path: &str, db_type: Option<&str>) -> Directive {
    let mut attach = AttachDirective::new(source.name(), path).read_only(source.config().read_only);
    if let Some(db_type) = db_type {
        attach = attach.with_type(db_type);
    }
    Directive::Attach(attach)
}

/// SQLite database files
pub struct SqliteHandler;

impl SourceHandler for SqliteHandler {
    fn kind(&self) -> SourceKind {
        SourceKind::SQLITE
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::EmbeddedFileDatabase
    }

    fn validate(&self, source: &SourceConfig, _registry: &HandlerRegistry) -> QuackResult<()> {
        validate_common(source)?;
        required_path(source, &self.kind()).map(|_| ())
    }

    fn plan(
        &self,
        source: &ResolvedSource,
        _registry: &HandlerRegistry,
    ) -> QuackResult<Vec<Directive>> {
        let path = required_path(source.config(), &self.kind())?;
        let mut directives = Directive::extension(EXTENSION).to_vec();
        directives.push(attach(source, path, Some("SQLITE")));
        directives.extend(table_views(source.config()));
        Ok(directives)
    }

    fn sink(&self, source: &SourceConfig) -> QuackResult<Sink> {
        Ok(Sink::Database {
            alias: source.name.clone(),
        })
    }
}

/// Native DuckDB database files
pub struct DuckDbHandler;

impl SourceHandler for DuckDbHandler {
    fn kind(&self) -> SourceKind {
        SourceKind::DUCKDB
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::EmbeddedFileDatabase
    }

    fn validate(&self, source: &SourceConfig, _registry: &HandlerRegistry) -> QuackResult<()> {
        validate_common(source)?;
        required_path(source, &self.kind()).map(|_| ())
    }

    fn plan(
        &self,
        source: &ResolvedSource,
        _registry: &HandlerRegistry,
    ) -> QuackResult<Vec<Directive>> {
        let path = required_path(source.config(), &self.kind())?;
        let mut directives = vec![attach(source, path, None)];
        directives.extend(table_views(source.config()));
        Ok(directives)
    }

    fn sink(&self, source: &SourceConfig) -> QuackResult<Sink> {
        Ok(Sink::Database {
            alias: source.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_plan() {
        let source = SourceConfig::sqlite("app", "/data/app.db").with_tables(["users"]);
        let directives = SqliteHandler
            .plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
            .unwrap();
        let sql: Vec<String> = directives.iter().map(Directive::to_sql).collect();
        assert_eq!(
            sql,
            vec![
                "INSTALL sqlite;",
                "LOAD sqlite;",
                "ATTACH '/data/app.db' AS app (TYPE SQLITE, READ_ONLY);",
                "CREATE OR REPLACE VIEW app_users AS SELECT * FROM app.users;",
            ]
        );
    }

    #[test]
    fn test_duckdb_needs_no_extension() {
        let source = SourceConfig::duckdb("warehouse", "/data/w.duckdb").read_write();
        let directives = DuckDbHandler
            .plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
            .unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(
            directives[0].to_sql(),
            "ATTACH '/data/w.duckdb' AS warehouse;"
        );
    }

    #[test]
    fn test_missing_path() {
        let source = SourceConfig::new("app", SourceSpec::Sqlite(FileSpec::default()));
        let err = SqliteHandler
            .validate(&source, &HandlerRegistry::default())
            .unwrap_err();
        assert!(err.to_string().contains("'path'"));
    }

    #[test]
    fn test_kind_mismatch() {
        let source = SourceConfig::duckdb("w", "/w.duckdb");
        assert!(SqliteHandler
            .plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
            .is_err());
    }
}
