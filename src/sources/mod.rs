//! Source handlers and the handler registry
//!
//! Each source kind has one [`SourceHandler`] that turns a resolved
//! descriptor into the ordered directives DuckDB needs to reach it.
//! Handlers are pure: they never touch the engine.
//!
//! # Built-in kinds
//!
//! | Kind       | Handler          | Category               |
//! |------------|------------------|------------------------|
//! | `postgres` | `PostgresHandler`| relational-database    |
//! | `s3`       | `S3Handler`      | object-store           |
//! | `sqlite`   | `SqliteHandler`  | embedded-file-database |
//! | `duckdb`   | `DuckDbHandler`  | embedded-file-database |
//! | `local`    | `LocalHandler`   | local-path             |
//! | `ducklake` | `DuckLakeHandler`| composite-lake         |
//!
//! # Adding a new kind
//!
//! 1. Implement `SourceHandler` for a new struct.
//! 2. Register it with `HandlerRegistry::register` (or `with_handler`).
//! 3. Describe sources of that kind with `SourceSpec::Custom`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QuackError, QuackResult};
use crate::models::{Directive, SourceCategory, SourceConfig, SourceKind, ViewDirective};
use crate::session::ResolvedSource;

pub mod ducklake;
pub mod local;
pub mod postgres;
pub mod s3;
pub mod sqlite;

pub use ducklake::DuckLakeHandler;
pub use local::LocalHandler;
pub use postgres::PostgresHandler;
pub use s3::S3Handler;
pub use sqlite::{DuckDbHandler, SqliteHandler};

/// Where the ETL mover writes data for a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// Tables inside an attached database, addressed as `{alias}.{table}`
    Database { alias: String },
    /// Objects under a storage root, addressed as `{root}/{table}.{ext}`
    Files { root: String },
}

/// Turns one kind of source descriptor into engine directives
pub trait SourceHandler: Send + Sync {
    /// Kind tag this handler serves
    fn kind(&self) -> SourceKind;

    fn category(&self) -> SourceCategory;

    /// Structural checks that need no secrets
    ///
    /// Runs for every source before any secret is resolved.
    fn validate(&self, _source: &SourceConfig, _registry: &HandlerRegistry) -> QuackResult<()> {
        Ok(())
    }

    /// Ordered directives for a resolved source
    ///
    /// Extension directives come before anything that needs them; views come
    /// last, one per listed table.
    fn plan(
        &self,
        source: &ResolvedSource,
        registry: &HandlerRegistry,
    ) -> QuackResult<Vec<Directive>>;

    /// Write target used when this source is an ETL destination
    fn sink(&self, source: &SourceConfig) -> QuackResult<Sink> {
        Err(QuackError::invalid(
            &source.name,
            format!("'{}' sources cannot be used as a destination", self.kind()),
        ))
    }
}

/// Maps kind tags to handlers
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<SourceKind, Arc<dyn SourceHandler>>,
}

impl HandlerRegistry {
    /// Registry with the built-in handlers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(SourceKind::POSTGRES, Arc::new(PostgresHandler));
        registry.register(SourceKind::S3, Arc::new(S3Handler));
        registry.register(SourceKind::SQLITE, Arc::new(SqliteHandler));
        registry.register(SourceKind::DUCKDB, Arc::new(DuckDbHandler));
        registry.register(SourceKind::LOCAL, Arc::new(LocalHandler));
        registry.register(SourceKind::DUCKLAKE, Arc::new(DuckLakeHandler));
        registry
    }

    /// Registry without any handler
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, returning the one it replaces
    pub fn register(
        &mut self,
        kind: SourceKind,
        handler: Arc<dyn SourceHandler>,
    ) -> Option<Arc<dyn SourceHandler>> {
        self.handlers.insert(kind, handler)
    }

    /// Builder-style registration under the handler's own kind
    pub fn with_handler(mut self, handler: impl SourceHandler + 'static) -> Self {
        let kind = handler.kind();
        self.register(kind, Arc::new(handler));
        self
    }

    pub fn resolve(&self, kind: &SourceKind) -> Option<&dyn SourceHandler> {
        self.handlers.get(kind).map(|h| h.as_ref())
    }

    /// Handler for a named source, or `UnknownSourceType`
    pub fn handler_for(
        &self,
        source_name: &str,
        kind: &SourceKind,
    ) -> QuackResult<&dyn SourceHandler> {
        self.resolve(kind)
            .ok_or_else(|| QuackError::UnknownSourceType {
                source_name: source_name.to_string(),
                kind: kind.to_string(),
            })
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<SourceKind> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One `{source}_{table}` view per listed table, over `{alias}.{table}`
pub fn table_views(source: &SourceConfig) -> Vec<Directive> {
    source
        .tables
        .iter()
        .map(|table| Directive::CreateView(ViewDirective::table(&source.name, &source.name, table)))
        .collect()
}

/// One `{source}_{table}` view per listed table, over `{root}/{table}.parquet`
pub fn parquet_views(source: &SourceConfig, root: &str) -> Vec<Directive> {
    source
        .tables
        .iter()
        .map(|table| {
            let path = crate::sql::join_path(root, &format!("{}.parquet", table));
            Directive::CreateView(ViewDirective::parquet(&source.name, table, path))
        })
        .collect()
}

/// Common checks on the shared descriptor fields
pub(crate) fn validate_common(source: &SourceConfig) -> QuackResult<()> {
    if source.name.trim().is_empty() {
        return Err(QuackError::invalid(&source.name, "source name must not be empty"));
    }
    let mut seen = std::collections::HashSet::new();
    for table in &source.tables {
        if table.trim().is_empty() {
            return Err(QuackError::invalid(&source.name, "table names must not be empty"));
        }
        if !seen.insert(table.as_str()) {
            return Err(QuackError::invalid(
                &source.name,
                format!("table '{}' is listed more than once", table),
            ));
        }
    }
    Ok(())
}

/// Error for a handler receiving a descriptor of another kind
pub(crate) fn kind_mismatch(source: &SourceConfig, expected: &SourceKind) -> QuackError {
    QuackError::invalid(
        &source.name,
        format!(
            "'{}' handler cannot plan a '{}' source",
            expected,
            source.kind()
        ),
    )
}
