//! DuckDB engine implementation
//!
//! Wraps one embedded DuckDB connection per session. Supports both
//! file-based databases and in-memory mode.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{
    Connector, Engine, EngineError, EngineResult, EngineSettings, QueryResult,
};
use crate::sql::quote_literal;

/// One DuckDB connection owned by a session
pub struct DuckDbEngine {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// `None` once closed
    connection: Mutex<Option<duckdb::Connection>>,
}

impl DuckDbEngine {
    /// Open a file-based database
    pub fn open(db_path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            EngineError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Open an in-memory database
    pub fn in_memory() -> EngineResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            EngineError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&duckdb::Connection) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let guard = self
            .connection
            .lock()
            .map_err(|e| EngineError::ConnectionFailed(format!("Lock error: {}", e)))?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(EngineError::Closed),
        }
    }

    /// Convert a DuckDB row to a JSON value
    fn row_to_json(row: &duckdb::Row, columns: &[String]) -> serde_json::Value {
        let mut map = serde_json::Map::new();

        for (i, col_name) in columns.iter().enumerate() {
            let value = match row.get_ref(i) {
                Ok(value_ref) => Self::value_ref_to_json(value_ref),
                Err(_) => serde_json::Value::Null,
            };
            map.insert(col_name.clone(), value);
        }

        serde_json::Value::Object(map)
    }

    /// Convert a DuckDB ValueRef to a JSON value
    fn value_ref_to_json(value: duckdb::types::ValueRef) -> serde_json::Value {
        use duckdb::types::ValueRef;

        match value {
            ValueRef::Null => serde_json::Value::Null,
            ValueRef::Boolean(b) => serde_json::Value::Bool(b),
            ValueRef::TinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::SmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Int(i) => serde_json::Value::Number(i.into()),
            ValueRef::BigInt(i) => serde_json::Value::Number(i.into()),
            // i128 may not fit in a JSON number
            ValueRef::HugeInt(i) => serde_json::Value::String(i.to_string()),
            ValueRef::UTinyInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::USmallInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::UBigInt(i) => serde_json::Value::Number(i.into()),
            ValueRef::Float(f) => serde_json::Number::from_f64(f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Double(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
            ValueRef::Blob(bytes) => {
                use base64::Engine;
                serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            ValueRef::Decimal(d) => serde_json::Value::String(d.to_string()),
            ValueRef::Timestamp(_, _)
            | ValueRef::Date32(_)
            | ValueRef::Time64(_, _)
            | ValueRef::Interval { .. }
            | ValueRef::List(_, _)
            | ValueRef::Enum(_, _)
            | ValueRef::Struct(_, _)
            | ValueRef::Map(_, _)
            | ValueRef::Union(_, _)
            | ValueRef::Array(_, _)
            | _ => serde_json::Value::String(format!("{:?}", value)),
        }
    }
}

impl Engine for DuckDbEngine {
    fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        self.with_connection(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| EngineError::ExecutionFailed(e.to_string()))
        })
    }

    fn execute(&self, sql: &str) -> EngineResult<u64> {
        self.with_connection(|conn| {
            conn.execute(sql, [])
                .map(|n| n as u64)
                .map_err(|e| EngineError::ExecutionFailed(e.to_string()))
        })
    }

    fn query(&self, sql: &str) -> EngineResult<QueryResult> {
        let start = std::time::Instant::now();

        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| EngineError::QueryFailed(format!("Prepare failed: {}", e)))?;

            // Columns are only known once the statement has run
            let mut result_rows = stmt
                .query([])
                .map_err(|e| EngineError::QueryFailed(format!("Query failed: {}", e)))?;

            let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
            let columns: Vec<String> = (0..column_count)
                .map(|i| {
                    result_rows
                        .as_ref()
                        .and_then(|r| r.column_name(i).ok())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("col{}", i))
                })
                .collect();

            let mut rows = Vec::new();
            while let Some(row) = result_rows
                .next()
                .map_err(|e| EngineError::QueryFailed(format!("Row fetch error: {}", e)))?
            {
                rows.push(Self::row_to_json(row, &columns));
            }

            Ok(QueryResult {
                columns,
                rows,
                rows_affected: None,
                execution_time_ms: start.elapsed().as_millis() as u64,
            })
        })
    }

    fn close(&mut self) -> EngineResult<()> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|e| EngineError::ConnectionFailed(format!("Lock error: {}", e)))?;
        match guard.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| EngineError::ExecutionFailed(format!("Close failed: {}", e))),
            None => Ok(()),
        }
    }

    fn is_open(&self) -> bool {
        self.connection
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn engine_type(&self) -> &'static str {
        "duckdb"
    }
}

/// Opens a DuckDB engine per session and applies [`EngineSettings`]
#[derive(Debug, Clone, Default)]
pub struct DuckDbConnector {
    settings: EngineSettings,
}

impl DuckDbConnector {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn setup_sql(&self) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(dir) = &self.settings.extension_directory {
            statements.push(format!("SET extension_directory = {};", quote_literal(dir)));
        }
        for (key, value) in &self.settings.settings {
            statements.push(format!("SET {} = {};", key, quote_literal(value)));
        }
        statements
    }
}

impl Connector for DuckDbConnector {
    fn connect(&self) -> EngineResult<Box<dyn Engine>> {
        let mut engine = match &self.settings.database {
            Some(path) => DuckDbEngine::open(path)?,
            None => DuckDbEngine::in_memory()?,
        };

        for statement in self.setup_sql() {
            if let Err(e) = engine.execute_batch(&statement) {
                if let Err(close_err) = engine.close() {
                    tracing::warn!(error = %close_err, "Failed to close engine after setup failure");
                }
                return Err(EngineError::ConnectionFailed(format!(
                    "Failed to apply engine setting: {}",
                    e
                )));
            }
        }

        tracing::debug!(
            database = self.settings.database.as_deref().unwrap_or(":memory:"),
            "Opened DuckDB engine"
        );
        Ok(Box::new(engine))
    }
}
