//! Fluent builder for sessions without a configuration file

use std::sync::Arc;

use crate::engine::Connector;
use crate::error::{QuackError, QuackResult};
use crate::etl::{MoveReport, MoveRequest, move_data};
use crate::models::{SourceConfig, SourceSpec};
use crate::secrets::{EnvSecretProvider, SecretProvider};
use crate::session::{Plan, Session, SessionFactory};
use crate::sources::{HandlerRegistry, SourceHandler};

/// Accumulates source descriptors and opens sessions over them
///
/// Produces exactly the same sessions as a loaded configuration with the
/// same sources.
#[derive(Clone)]
pub struct PipelineBuilder {
    sources: Vec<SourceConfig>,
    registry: HandlerRegistry,
    provider: Arc<dyn SecretProvider>,
    connector: Option<Arc<dyn Connector>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            registry: HandlerRegistry::default(),
            provider: Arc::new(EnvSecretProvider::new()),
            connector: None,
        }
    }

    pub fn add_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    pub fn add_sources(mut self, sources: impl IntoIterator<Item = SourceConfig>) -> Self {
        self.sources.extend(sources);
        self
    }

    /// Add a source with default flags and an optional secret bundle
    pub fn source(
        self,
        name: impl Into<String>,
        spec: impl Into<SourceSpec>,
        secret_name: Option<&str>,
    ) -> Self {
        let mut source = SourceConfig::new(name, spec);
        source.secret_name = secret_name.map(str::to_string);
        self.add_source(source)
    }

    pub fn with_secret_provider(mut self, provider: impl SecretProvider + 'static) -> Self {
        self.provider = Arc::new(provider);
        self
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a handler for a custom source kind
    pub fn with_handler(mut self, handler: impl SourceHandler + 'static) -> Self {
        self.registry = self.registry.with_handler(handler);
        self
    }

    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Factory over this builder's handlers, provider and connector
    pub fn factory(&self) -> QuackResult<SessionFactory> {
        let connector = match &self.connector {
            Some(connector) => Arc::clone(connector),
            None => default_connector()?,
        };
        Ok(SessionFactory::from_connector(connector)
            .with_registry(self.registry.clone())
            .with_shared_secret_provider(Arc::clone(&self.provider)))
    }

    pub fn validate(&self) -> QuackResult<()> {
        self.factory()?.validate(&self.sources)
    }

    pub fn plan(&self) -> QuackResult<Plan> {
        self.factory()?.plan(&self.sources)
    }

    /// Open a session over every added source
    pub fn session(&self) -> QuackResult<Session> {
        if self.sources.is_empty() {
            return Err(QuackError::NoSources);
        }
        self.factory()?.open(&self.sources)
    }

    pub fn move_data(&self, request: &MoveRequest) -> QuackResult<MoveReport> {
        if self.sources.is_empty() {
            return Err(QuackError::NoSources);
        }
        move_data(&self.factory()?, &self.sources, request)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "duckdb-backend")]
fn default_connector() -> QuackResult<Arc<dyn Connector>> {
    Ok(Arc::new(crate::engine::DuckDbConnector::in_memory()))
}

#[cfg(not(feature = "duckdb-backend"))]
fn default_connector() -> QuackResult<Arc<dyn Connector>> {
    Err(QuackError::Config(
        "no engine connector configured and the duckdb-backend feature is disabled".to_string(),
    ))
}
