//! Data movement between configured sources
//!
//! [`move_data`] runs a query in a fresh session and materializes the result
//! into a destination source: a table in an attached database, or an object
//! under a storage root. The session is closed whether or not the write
//! succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::engine::QueryResult;
use crate::error::{QuackError, QuackResult};
use crate::models::SourceConfig;
use crate::session::{Session, SessionFactory, select_sources, with_session};
use crate::sources::Sink;
use crate::sql::{join_path, quote_ident, quote_literal};

/// How the destination table or object is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Drop and recreate the table, or overwrite the object
    #[default]
    Replace,
    /// Insert into the existing table
    Append,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(WriteMode::Replace),
            "append" => Ok(WriteMode::Append),
            _ => Err(format!("Unknown write mode: {}", s)),
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Replace => write!(f, "replace"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

/// File format for object-store and local destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Parquet,
    Csv,
    Json,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Parquet => "parquet",
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }

    fn copy_option(&self) -> &'static str {
        match self {
            FileFormat::Parquet => "FORMAT PARQUET",
            FileFormat::Csv => "FORMAT CSV, HEADER",
            FileFormat::Json => "FORMAT JSON",
        }
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parquet" => Ok(FileFormat::Parquet),
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            _ => Err(format!("Unknown file format: {}", s)),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What to move, and where
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    pub source_query: String,
    pub destination: String,
    pub table: String,
    pub mode: WriteMode,
    /// Only used by file destinations
    pub format: FileFormat,
    /// Sources to attach besides the destination; all configured sources
    /// when `None`
    pub sources: Option<Vec<String>>,
}

impl MoveRequest {
    pub fn new(
        source_query: impl Into<String>,
        destination: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            source_query: source_query.into(),
            destination: destination.into(),
            table: table.into(),
            mode: WriteMode::default(),
            format: FileFormat::default(),
            sources: None,
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }
}

/// Outcome of a completed move
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveReport {
    pub destination: String,
    pub table: String,
    pub mode: WriteMode,
    /// Qualified table name or object path written
    pub target: String,
    /// As reported by the engine
    pub rows_written: u64,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// Query configured sources and write the result into `request.destination`
///
/// Read-only destinations and write modes the destination cannot honour
/// are rejected before any session is opened.
pub fn move_data(
    factory: &SessionFactory,
    sources: &[SourceConfig],
    request: &MoveRequest,
) -> QuackResult<MoveReport> {
    let start = Instant::now();

    let destination = sources
        .iter()
        .find(|s| s.name == request.destination)
        .ok_or_else(|| QuackError::SourceNotFound {
            name: request.destination.clone(),
        })?;
    if destination.read_only {
        return Err(QuackError::ReadOnlyDestination {
            destination: destination.name.clone(),
        });
    }
    if request.table.trim().is_empty() {
        return Err(QuackError::invalid(
            &destination.name,
            "destination table name must not be empty",
        ));
    }
    if request.table.contains(['/', '\\']) || request.table.contains("..") {
        return Err(QuackError::invalid(
            &destination.name,
            format!(
                "destination table name '{}' must not contain path separators or '..'",
                request.table
            ),
        ));
    }

    let sink = factory
        .registry()
        .handler_for(&destination.name, &destination.kind())?
        .sink(destination)?;
    if matches!(sink, Sink::Files { .. }) && request.mode == WriteMode::Append {
        return Err(QuackError::UnsupportedMode {
            destination: destination.name.clone(),
            mode: request.mode.to_string(),
        });
    }

    let session_sources = match &request.sources {
        Some(names) => {
            let mut wanted: Vec<&str> = names.iter().map(String::as_str).collect();
            if !wanted.contains(&destination.name.as_str()) {
                wanted.push(&destination.name);
            }
            select_sources(sources, &wanted)?
        }
        None => sources.to_vec(),
    };

    let (target, rows_written) = with_session(factory, &session_sources, |session| {
        match &sink {
            Sink::Database { alias } => write_table(session, alias, request),
            Sink::Files { root } => write_file(session, root, request),
        }
    })?;

    let report = MoveReport {
        destination: destination.name.clone(),
        table: request.table.clone(),
        mode: request.mode,
        target,
        rows_written,
        elapsed_ms: start.elapsed().as_millis() as u64,
        completed_at: Utc::now(),
    };
    info!(
        destination = %report.destination,
        target = %report.target,
        mode = %report.mode,
        rows = report.rows_written,
        elapsed_ms = report.elapsed_ms,
        "Move complete"
    );
    Ok(report)
}

fn write_table(session: &Session, alias: &str, request: &MoveRequest) -> QuackResult<(String, u64)> {
    let (schema, table) = split_table(&request.table);
    let target = match schema {
        Some(schema) => format!(
            "{}.{}.{}",
            quote_ident(alias),
            quote_ident(schema),
            quote_ident(table)
        ),
        None => format!("{}.{}", quote_ident(alias), quote_ident(table)),
    };
    let query = trim_query(&request.source_query);

    let rows = match request.mode {
        WriteMode::Replace => in_transaction(session, || {
            session.execute_batch(&format!("DROP TABLE IF EXISTS {};", target))?;
            session.execute(&format!(
                "CREATE TABLE {} AS SELECT * FROM ({}) AS src",
                target, query
            ))
        })?,
        WriteMode::Append => {
            check_append_schema(session, &target, request)?;
            in_transaction(session, || {
                session.execute(&format!(
                    "INSERT INTO {} BY NAME SELECT * FROM ({}) AS src",
                    target, query
                ))
            })?
        }
    };
    Ok((target, rows))
}

fn write_file(session: &Session, root: &str, request: &MoveRequest) -> QuackResult<(String, u64)> {
    if !root.contains("://") {
        std::fs::create_dir_all(root)
            .map_err(|e| QuackError::Io(format!("Failed to create {}: {}", root, e)))?;
    }
    let path = join_path(
        root,
        &format!("{}.{}", request.table, request.format.extension()),
    );
    let rows = session.execute(&format!(
        "COPY ({}) TO {} ({})",
        trim_query(&request.source_query),
        quote_literal(&path),
        request.format.copy_option()
    ))?;
    Ok((path, rows))
}

/// Query columns must equal those of `target`, ignoring case and order
///
/// A destination table that cannot be read counts as having no columns.
fn check_append_schema(session: &Session, target: &str, request: &MoveRequest) -> QuackResult<()> {
    let incoming = column_set(&session.query(&format!(
        "SELECT * FROM ({}) AS src LIMIT 0",
        trim_query(&request.source_query)
    ))?);
    let existing = match session.query(&format!("SELECT * FROM {} LIMIT 0", target)) {
        Ok(result) => column_set(&result),
        Err(e) => {
            debug!(table = %target, error = %e, "Destination table not readable");
            BTreeSet::new()
        }
    };

    let missing: Vec<String> = existing.difference(&incoming).cloned().collect();
    let unexpected: Vec<String> = incoming.difference(&existing).cloned().collect();
    if missing.is_empty() && unexpected.is_empty() {
        Ok(())
    } else {
        Err(QuackError::SchemaMismatch {
            destination: request.destination.clone(),
            table: request.table.clone(),
            missing,
            unexpected,
        })
    }
}

/// Run `f` between `BEGIN` and `COMMIT`, rolling back on failure
fn in_transaction<T>(session: &Session, f: impl FnOnce() -> QuackResult<T>) -> QuackResult<T> {
    session.execute_batch("BEGIN TRANSACTION;")?;
    match f() {
        Ok(value) => {
            session.execute_batch("COMMIT;")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = session.execute_batch("ROLLBACK;") {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}

fn column_set(result: &QueryResult) -> BTreeSet<String> {
    result.columns.iter().map(|c| c.to_lowercase()).collect()
}

/// Strip surrounding whitespace and trailing `;` so the query can be nested
fn trim_query(query: &str) -> &str {
    query.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

fn split_table(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}
