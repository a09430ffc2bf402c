//! Directive-recording engine
//!
//! Executes nothing. Every directive, statement and query is appended to a
//! shared [`RecordingLog`] so tests can assert exactly what a session would
//! have sent to DuckDB. Queries matching a scripted substring return a canned
//! result; everything else returns an empty result.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Connector, Engine, EngineError, EngineResult, QueryResult};
use crate::models::Directive;

type DirectivePredicate = Arc<dyn Fn(&Directive) -> bool + Send + Sync>;

/// Everything a recording engine has seen, across all sessions it served
#[derive(Debug, Default, Clone)]
pub struct RecordingLog {
    /// Directives applied, in order
    pub directives: Vec<Directive>,
    /// Statements passed to `execute`/`execute_batch`, in order
    pub statements: Vec<String>,
    /// Statements passed to `query`, in order
    pub queries: Vec<String>,
    pub connects: usize,
    pub closes: usize,
}

impl RecordingLog {
    /// Executed statements containing `needle`
    pub fn statements_containing(&self, needle: &str) -> Vec<&str> {
        self.statements
            .iter()
            .filter(|s| s.contains(needle))
            .map(String::as_str)
            .collect()
    }
}

#[derive(Default)]
struct Script {
    responses: Vec<(String, QueryResult)>,
    failing_directive: Option<DirectivePredicate>,
    failing_statement: Option<String>,
    fail_connect: bool,
}

/// Hands out recording engines that share one log
#[derive(Clone, Default)]
pub struct RecordingConnector {
    log: Arc<Mutex<RecordingLog>>,
    script: Arc<Mutex<Script>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `result` for any query whose text contains `needle`
    ///
    /// The first matching rule wins.
    pub fn respond_to(self, needle: impl Into<String>, result: QueryResult) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.responses.push((needle.into(), result));
        }
        self
    }

    /// Fail the first directive for which `predicate` returns true
    pub fn fail_on_directive(
        self,
        predicate: impl Fn(&Directive) -> bool + Send + Sync + 'static,
    ) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.failing_directive = Some(Arc::new(predicate));
        }
        self
    }

    /// Fail any statement (execute or query) containing `needle`
    pub fn fail_on_statement(self, needle: impl Into<String>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.failing_statement = Some(needle.into());
        }
        self
    }

    /// Refuse to open engines
    pub fn fail_connect(self) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.fail_connect = true;
        }
        self
    }

    /// Snapshot of everything recorded so far
    pub fn log(&self) -> RecordingLog {
        self.log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Applied directives rendered through their redacted `Display`
    pub fn rendered_directives(&self) -> Vec<String> {
        self.log()
            .directives
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl Connector for RecordingConnector {
    fn connect(&self) -> EngineResult<Box<dyn Engine>> {
        let refuse = self
            .script
            .lock()
            .map(|script| script.fail_connect)
            .unwrap_or(false);
        if refuse {
            return Err(EngineError::ConnectionFailed(
                "recording connector refused to connect".to_string(),
            ));
        }

        lock(&self.log)?.connects += 1;
        Ok(Box::new(RecordingEngine {
            log: Arc::clone(&self.log),
            script: Arc::clone(&self.script),
            open: true,
        }))
    }
}

/// Engine produced by [`RecordingConnector`]
pub struct RecordingEngine {
    log: Arc<Mutex<RecordingLog>>,
    script: Arc<Mutex<Script>>,
    open: bool,
}

impl RecordingEngine {
    fn ensure_open(&self) -> EngineResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(EngineError::Closed)
        }
    }

    fn statement_fails(&self, sql: &str) -> EngineResult<bool> {
        let script = lock(&self.script)?;
        Ok(script
            .failing_statement
            .as_deref()
            .is_some_and(|needle| sql.contains(needle)))
    }
}

impl Engine for RecordingEngine {
    fn apply(&self, directive: &Directive) -> EngineResult<()> {
        self.ensure_open()?;
        let fails = {
            let script = lock(&self.script)?;
            script
                .failing_directive
                .as_ref()
                .is_some_and(|predicate| predicate(directive))
        };
        if fails {
            // Mimic an engine echoing the statement back in its error
            return Err(EngineError::ExecutionFailed(format!(
                "rejected statement: {}",
                directive.to_sql()
            )));
        }
        lock(&self.log)?.directives.push(directive.clone());
        Ok(())
    }

    fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        self.execute(sql).map(|_| ())
    }

    fn execute(&self, sql: &str) -> EngineResult<u64> {
        self.ensure_open()?;
        let fails = self.statement_fails(sql)?;
        lock(&self.log)?.statements.push(sql.to_string());
        if fails {
            return Err(EngineError::ExecutionFailed(format!(
                "scripted failure for: {}",
                sql
            )));
        }
        Ok(0)
    }

    fn query(&self, sql: &str) -> EngineResult<QueryResult> {
        self.ensure_open()?;
        let fails = self.statement_fails(sql)?;
        lock(&self.log)?.queries.push(sql.to_string());
        if fails {
            return Err(EngineError::QueryFailed(format!(
                "scripted failure for: {}",
                sql
            )));
        }
        let script = lock(&self.script)?;
        Ok(script
            .responses
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    fn close(&mut self) -> EngineResult<()> {
        if self.open {
            self.open = false;
            lock(&self.log)?.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn engine_type(&self) -> &'static str {
        "recording"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> EngineResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| EngineError::ExecutionFailed(format!("Lock error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DirectiveKind;

    #[test]
    fn test_records_directives_and_closes() {
        let connector = RecordingConnector::new();
        let mut engine = connector.connect().unwrap();
        engine.apply(&Directive::install("httpfs")).unwrap();
        engine.execute("SELECT 1").unwrap();
        engine.close().unwrap();
        engine.close().unwrap();

        let log = connector.log();
        assert_eq!(log.directives, vec![Directive::install("httpfs")]);
        assert_eq!(log.statements, vec!["SELECT 1"]);
        assert_eq!(log.connects, 1);
        assert_eq!(log.closes, 1);
        assert_eq!(engine.query("SELECT 1"), Err(EngineError::Closed));
    }

    #[test]
    fn test_scripted_failures() {
        let connector = RecordingConnector::new()
            .fail_on_directive(|d| d.kind() == DirectiveKind::LoadExtension)
            .fail_on_statement("DROP");
        let engine = connector.connect().unwrap();

        assert!(engine.apply(&Directive::install("x")).is_ok());
        assert!(engine.apply(&Directive::load("x")).is_err());
        assert!(engine.execute("DROP TABLE t").is_err());
        assert_eq!(connector.log().directives.len(), 1);
    }

    #[test]
    fn test_scripted_responses() {
        let connector = RecordingConnector::new().respond_to(
            "LIMIT 0",
            QueryResult::with_columns(["id", "name"]),
        );
        let engine = connector.connect().unwrap();

        assert_eq!(
            engine.query("SELECT * FROM t LIMIT 0").unwrap().columns,
            vec!["id", "name"]
        );
        assert!(engine.query("SELECT 1").unwrap().columns.is_empty());
    }
}
