//! Engine seam
//!
//! The orchestrator drives the embedded engine only through the [`Engine`]
//! and [`Connector`] traits:
//! - DuckDB: the production engine (feature `duckdb-backend`)
//! - Recording: an in-process fake that records every directive and
//!   statement, used by tests and dry runs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;

pub mod recording;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::{DuckDbConnector, DuckDbEngine};

pub use recording::{RecordingConnector, RecordingLog};

use crate::models::Directive;

/// Error type for engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Failed to open the engine
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A statement without a result set failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// The engine was used after it was closed
    #[error("Engine is closed")]
    Closed,
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine settings applied when a connection is opened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Database file; in-memory when absent
    #[serde(default)]
    pub database: Option<String>,
    /// Directory DuckDB installs extensions into
    #[serde(default)]
    pub extension_directory: Option<String>,
    /// Extra `SET` options, applied in key order
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl EngineSettings {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, path: impl Into<String>) -> Self {
        self.database = Some(path.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// One open engine instance
///
/// Owned exclusively by a single session.
pub trait Engine: Send {
    /// Execute one directive
    fn apply(&self, directive: &Directive) -> EngineResult<()> {
        self.execute_batch(&directive.to_sql())
    }

    /// Execute one or more statements that return no rows
    fn execute_batch(&self, sql: &str) -> EngineResult<()>;

    /// Execute a single statement and report affected rows
    fn execute(&self, sql: &str) -> EngineResult<u64>;

    /// Run a query and collect its rows
    fn query(&self, sql: &str) -> EngineResult<QueryResult>;

    /// Release the engine; further calls fail with [`EngineError::Closed`]
    fn close(&mut self) -> EngineResult<()>;

    fn is_open(&self) -> bool;

    /// Engine name for logs
    fn engine_type(&self) -> &'static str;
}

/// Opens fresh engine instances, one per session
pub trait Connector: Send + Sync {
    fn connect(&self) -> EngineResult<Box<dyn Engine>>;
}

/// Query result row as a JSON value
pub type QueryRow = serde_json::Value;

/// Query result set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<QueryRow>,
    /// Number of rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new query result
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
            execution_time_ms: 0,
        }
    }

    /// Create an empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Result with columns but no rows
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(columns.into_iter().map(Into::into).collect(), Vec::new())
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, in row order
    pub fn column_values(&self, column: &str) -> Vec<&serde_json::Value> {
        self.rows.iter().filter_map(|row| row.get(column)).collect()
    }
}

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Format query results for display
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&result.rows).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => format_as_csv(result),
        OutputFormat::Table => format_as_table(result),
    }
}

/// Display text of a cell; `None` for SQL NULL or a missing column
fn cell_text(row: &QueryRow, column: &str) -> Option<String> {
    match row.get(column)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn format_as_csv(result: &QueryResult) -> String {
    let mut output = String::new();

    let header: Vec<String> = result.columns.iter().map(|c| csv_field(c)).collect();
    output.push_str(&header.join(","));
    output.push('\n');

    for row in &result.rows {
        let values: Vec<String> = result
            .columns
            .iter()
            .map(|col| cell_text(row, col).map(|t| csv_field(&t)).unwrap_or_default())
            .collect();
        output.push_str(&values.join(","));
        output.push('\n');
    }

    output
}

fn format_as_table(result: &QueryResult) -> String {
    if result.is_empty() {
        return "(0 rows)".to_string();
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|c| cell_text(row, c).unwrap_or_else(|| "null".to_string()))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let pad = |values: &[String]| -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{:width$}", v, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut output = String::new();
    output.push_str(&pad(&result.columns));
    output.push('\n');

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&separator.join("-+-"));
    output.push('\n');

    for row in &cells {
        output.push_str(&pad(row));
        output.push('\n');
    }

    output.push_str(&format!("({} rows)", result.row_count()));

    output
}
