//! quackpipe - assemble DuckDB sessions from declarative source descriptors
//!
//! Provides:
//! - Source descriptors for relational, object-store, embedded and lake sources
//! - Pluggable source handlers that turn descriptors into engine directives
//! - Secret providers that fill descriptor gaps from named bundles
//! - Sessions with every source attached in one engine
//! - Moving query results into writable sources

pub mod builder;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod etl;
pub mod models;
pub mod secrets;
pub mod session;
pub mod sources;
pub mod sql;

pub use builder::PipelineBuilder;
pub use config::{PipeConfig, sample_config};
pub use error::{QuackError, QuackResult};
pub use etl::{FileFormat, MoveReport, MoveRequest, WriteMode, move_data};
pub use session::{Plan, PlannedDirective, Session, SessionFactory, select_sources, with_session};

// Re-export engine types
#[cfg(feature = "duckdb-backend")]
pub use engine::{DuckDbConnector, DuckDbEngine};
pub use engine::{
    Connector, Engine, EngineError, EngineResult, EngineSettings, OutputFormat, QueryResult,
    RecordingConnector, format_query_result,
};

// Re-export models
pub use models::{
    ComponentConfig, CustomSpec, Directive, DirectiveKind, DuckLakeSpec, FileSpec, LakeRole,
    PostgresSpec, S3Spec, SourceCategory, SourceConfig, SourceKind, SourceSpec,
};

// Re-export secret providers
pub use secrets::{
    ChainSecretProvider, EnvSecretProvider, InMemorySecretProvider, JsonFileSecretProvider,
    SecretBundle, SecretError, SecretProvider, SecretValue,
};

// Re-export handlers
pub use sources::{HandlerRegistry, Sink, SourceHandler};
