//! Session assembly
//!
//! [`SessionFactory`] turns a list of source descriptors into one open
//! engine session:
//! 1. reject duplicate names (all of them, each listed once)
//! 2. validate every descriptor structurally
//! 3. per source, in order: resolve its secret bundle, merge inline values
//!    over bundle values, and let its handler plan directives
//! 4. drop repeated install/load directives for the same extension
//! 5. open an engine and apply the plan; any failure closes the engine
//!
//! Steps 1-4 never touch an engine, so a configuration error leaves no
//! state behind.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{Connector, Engine, QueryResult};
use crate::error::{QuackError, QuackResult};
use crate::models::{Directive, DirectiveKind, SourceConfig};
use crate::secrets::{EnvSecretProvider, SecretProvider};
use crate::sources::HandlerRegistry;

mod resolve;

pub use resolve::ResolvedSource;

/// One directive and the source that asked for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedDirective {
    pub source: String,
    pub directive: Directive,
}

/// Ordered, deduplicated directives for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    steps: Vec<PlannedDirective>,
}

impl Plan {
    pub fn steps(&self) -> &[PlannedDirective] {
        &self.steps
    }

    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.steps.iter().map(|s| &s.directive)
    }

    /// Directives contributed by one source
    pub fn for_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Directive> {
        self.steps
            .iter()
            .filter(move |s| s.source == source)
            .map(|s| &s.directive)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Keep the first install/load per extension name
    fn push_deduplicated(
        &mut self,
        source: &str,
        directives: Vec<Directive>,
        seen: &mut HashSet<(DirectiveKind, String)>,
    ) {
        for directive in directives {
            if let Some(extension) = directive.extension_name()
                && !seen.insert((directive.kind(), extension.to_ascii_lowercase()))
            {
                debug!(source, extension, "Dropping repeated extension directive");
                continue;
            }
            self.steps.push(PlannedDirective {
                source: source.to_string(),
                directive,
            });
        }
    }
}

impl fmt::Display for Plan {
    /// One redacted statement per line, prefixed with its source
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "[{}] {}", step.source, step.directive)?;
        }
        Ok(())
    }
}

/// Builds sessions from source descriptors
#[derive(Clone)]
pub struct SessionFactory {
    registry: Arc<HandlerRegistry>,
    provider: Arc<dyn SecretProvider>,
    connector: Arc<dyn Connector>,
}

impl SessionFactory {
    /// Factory with the built-in handlers and the environment secret provider
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_connector(Arc::new(connector))
    }

    /// Same as [`SessionFactory::new`] for an already shared connector
    pub fn from_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::default()),
            provider: Arc::new(EnvSecretProvider::new()),
            connector,
        }
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_secret_provider(mut self, provider: impl SecretProvider + 'static) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    pub fn with_shared_secret_provider(mut self, provider: Arc<dyn SecretProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Structural checks only: names, kinds, composite roles
    ///
    /// Resolves no secrets and touches no engine.
    pub fn validate(&self, sources: &[SourceConfig]) -> QuackResult<()> {
        check_unique_names(sources)?;
        for source in sources {
            self.registry
                .handler_for(&source.name, &source.kind())?
                .validate(source, &self.registry)?;
        }
        Ok(())
    }

    /// Resolve secrets and plan, without opening an engine
    pub fn plan(&self, sources: &[SourceConfig]) -> QuackResult<Plan> {
        self.validate(sources)?;

        let mut plan = Plan::default();
        let mut seen = HashSet::new();
        for source in sources {
            let handler = self.registry.handler_for(&source.name, &source.kind())?;
            let resolved = ResolvedSource::resolve(source, self.provider.as_ref())?;
            let directives = handler.plan(&resolved, &self.registry)?;
            debug!(
                source = %source.name,
                kind = %source.kind(),
                directives = directives.len(),
                "Planned source"
            );
            plan.push_deduplicated(&source.name, directives, &mut seen);
        }
        Ok(plan)
    }

    /// Plan, open an engine and apply every directive
    ///
    /// On failure the engine is closed before the error is returned.
    pub fn open(&self, sources: &[SourceConfig]) -> QuackResult<Session> {
        if sources.is_empty() {
            return Err(QuackError::NoSources);
        }
        let plan = self.plan(sources)?;
        let id = Uuid::new_v4();
        let mut engine = self.connector.connect()?;

        for step in plan.steps() {
            debug!(session = %id, source = %step.source, directive = %step.directive, "Applying directive");
            if let Err(e) = engine.apply(&step.directive) {
                let message = step.directive.scrub(&e.to_string());
                warn!(
                    session = %id,
                    source = %step.source,
                    directive = %step.directive.kind(),
                    "Directive failed, closing session"
                );
                if let Err(close_err) = engine.close() {
                    warn!(session = %id, error = %close_err, "Failed to close engine");
                }
                return Err(QuackError::DirectiveExecution {
                    source_name: step.source.clone(),
                    directive: step.directive.kind(),
                    message,
                });
            }
        }

        info!(
            session = %id,
            engine = engine.engine_type(),
            sources = sources.len(),
            directives = plan.len(),
            "Session ready"
        );
        Ok(Session {
            id,
            engine: Some(engine),
            sources: sources.iter().map(|s| s.name.clone()).collect(),
            plan,
        })
    }
}

#[cfg(feature = "duckdb-backend")]
impl Default for SessionFactory {
    /// In-memory DuckDB, built-in handlers, environment secrets
    fn default() -> Self {
        Self::new(crate::engine::DuckDbConnector::in_memory())
    }
}

/// An open engine with its sources attached
///
/// Dropping the session closes the engine, so it is released on every exit
/// path including panics in caller code.
pub struct Session {
    id: Uuid,
    engine: Option<Box<dyn Engine>>,
    sources: Vec<String>,
    plan: Plan,
}

impl Session {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Names of the sources this session was built from
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// The directives that were applied
    pub fn directives(&self) -> &Plan {
        &self.plan
    }

    pub fn is_open(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_open())
    }

    fn engine(&self) -> QuackResult<&dyn Engine> {
        self.engine
            .as_deref()
            .ok_or(QuackError::Engine(crate::engine::EngineError::Closed))
    }

    /// Run a query and collect its rows
    pub fn query(&self, sql: &str) -> QuackResult<QueryResult> {
        debug!(session = %self.id, "Running query");
        Ok(self.engine()?.query(sql)?)
    }

    /// Execute a statement and report affected rows
    pub fn execute(&self, sql: &str) -> QuackResult<u64> {
        debug!(session = %self.id, "Executing statement");
        Ok(self.engine()?.execute(sql)?)
    }

    /// Execute several statements that return no rows
    pub fn execute_batch(&self, sql: &str) -> QuackResult<()> {
        Ok(self.engine()?.execute_batch(sql)?)
    }

    /// Close the engine and report any failure doing so
    pub fn close(mut self) -> QuackResult<()> {
        self.release()
    }

    fn release(&mut self) -> QuackResult<()> {
        match self.engine.take() {
            Some(mut engine) => {
                debug!(session = %self.id, "Closing session");
                engine.close()?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("sources", &self.sources)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(session = %self.id, error = %e, "Failed to close session");
        }
    }
}

/// Open a session, run `f`, and close the session whatever `f` returns
pub fn with_session<T, F>(
    factory: &SessionFactory,
    sources: &[SourceConfig],
    f: F,
) -> QuackResult<T>
where
    F: FnOnce(&Session) -> QuackResult<T>,
{
    let session = factory.open(sources)?;
    let outcome = f(&session);
    let closed = session.close();
    let value = outcome?;
    closed?;
    Ok(value)
}

/// Pick sources by name, keeping configuration order
pub fn select_sources<S: AsRef<str>>(
    sources: &[SourceConfig],
    names: &[S],
) -> QuackResult<Vec<SourceConfig>> {
    for name in names {
        if !sources.iter().any(|s| s.name == name.as_ref()) {
            return Err(QuackError::SourceNotFound {
                name: name.as_ref().to_string(),
            });
        }
    }
    Ok(sources
        .iter()
        .filter(|s| names.iter().any(|n| n.as_ref() == s.name))
        .cloned()
        .collect())
}

fn check_unique_names(sources: &[SourceConfig]) -> QuackResult<()> {
    let mut seen = HashSet::new();
    let duplicates: BTreeSet<&str> = sources
        .iter()
        .filter(|s| !seen.insert(s.name.as_str()))
        .map(|s| s.name.as_str())
        .collect();

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(QuackError::DuplicateSourceName {
            names: duplicates.into_iter().map(str::to_string).collect(),
        })
    }
}
