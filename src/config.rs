//! Declarative pipeline configuration
//!
//! A document with an `engine` block and an ordered `sources` mapping,
//! written as YAML or (for `.toml` files) TOML:
//!
//! ```yaml
//! engine:
//!   database: warehouse.duckdb
//! sources:
//!   app:
//!     type: postgres
//!     secret_name: app_db
//!     tables: [users]
//! ```
//!
//! Every source block takes `type`, `secret_name`, `read_only` (default
//! true) and `tables`; the remaining keys belong to the source kind.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::EngineSettings;
use crate::error::{QuackError, QuackResult};
use crate::models::{
    ComponentConfig, CustomSpec, DuckLakeSpec, LakeRole, SourceConfig, SourceKind, SourceSpec,
};

/// Configuration file used when none is given
pub const DEFAULT_CONFIG_FILENAME: &str = "quackpipe.yml";

/// Environment variable naming the configuration file
pub const ENV_CONFIG: &str = "QUACKPIPE_CONFIG";
/// Environment variable overriding `engine.database`
pub const ENV_DATABASE: &str = "QUACKPIPE_DATABASE";
/// Environment variable overriding `engine.extension_directory`
pub const ENV_EXTENSION_DIR: &str = "QUACKPIPE_EXTENSION_DIR";

/// A loaded configuration document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipeConfig {
    pub engine: EngineSettings,
    /// In document order
    pub sources: Vec<SourceConfig>,
}

impl PipeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file and apply environment overrides
    pub fn load(path: &Path) -> QuackResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load a configuration file, reading overrides through `lookup`
    pub fn load_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> QuackResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuackError::Io(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let mut config = if is_toml {
            Self::parse_toml(&content)?
        } else {
            Self::parse_yaml(&content)?
        };
        config.apply_overrides(lookup);

        debug!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse a YAML document
    pub fn parse_yaml(content: &str) -> QuackResult<Self> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| QuackError::Config(format!("Failed to parse YAML config: {}", e)))?;
        Self::from_value(value)
    }

    /// Parse a TOML document
    pub fn parse_toml(content: &str) -> QuackResult<Self> {
        let value: Value = toml::from_str(content)
            .map_err(|e| QuackError::Config(format!("Failed to parse TOML config: {}", e)))?;
        Self::from_value(value)
    }

    /// Build from an already parsed document
    pub fn from_value(value: Value) -> QuackResult<Self> {
        let mut document = match value {
            Value::Object(document) => document,
            Value::Null => Map::new(),
            _ => {
                return Err(QuackError::Config(
                    "config document must be a mapping".to_string(),
                ));
            }
        };

        let engine = match document.remove("engine") {
            None | Some(Value::Null) => EngineSettings::default(),
            Some(block) => parse_engine(block)?,
        };

        let sources = match document.remove("sources") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(blocks)) => blocks
                .into_iter()
                .map(|(name, block)| parse_source(&name, block))
                .collect::<QuackResult<Vec<_>>>()?,
            Some(_) => {
                return Err(QuackError::Config(
                    "'sources' must be a mapping of source name to settings".to_string(),
                ));
            }
        };

        if let Some(key) = document.keys().next() {
            return Err(QuackError::Config(format!(
                "unknown top-level key '{}'",
                key
            )));
        }

        Ok(Self { engine, sources })
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(database) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.engine.database = Some(database);
        }
        if let Some(dir) = lookup(ENV_EXTENSION_DIR).filter(|v| !v.is_empty()) {
            self.engine.extension_directory = Some(dir);
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Configuration path: `explicit`, else `QUACKPIPE_CONFIG`, else the default
    pub fn resolve_path(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => lookup(ENV_CONFIG)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME)),
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Session factory over a DuckDB engine configured by the `engine` block
    #[cfg(feature = "duckdb-backend")]
    pub fn factory(&self) -> crate::session::SessionFactory {
        crate::session::SessionFactory::new(crate::engine::DuckDbConnector::new(self.engine.clone()))
    }
}

fn parse_engine(block: Value) -> QuackResult<EngineSettings> {
    let Value::Object(mut block) = block else {
        return Err(QuackError::Config("'engine' must be a mapping".to_string()));
    };

    // SET values may be written as numbers or booleans
    if let Some(settings) = block.remove("settings") {
        let Value::Object(settings) = settings else {
            return Err(QuackError::Config(
                "'engine.settings' must be a mapping".to_string(),
            ));
        };
        let mut normalized = Map::new();
        for (key, value) in settings {
            let value = scalar_to_string(&value).ok_or_else(|| {
                QuackError::Config(format!("engine setting '{}' must be a scalar", key))
            })?;
            normalized.insert(key, Value::String(value));
        }
        block.insert("settings".to_string(), Value::Object(normalized));
    }

    serde_json::from_value(Value::Object(block))
        .map_err(|e| QuackError::Config(format!("Invalid 'engine' block: {}", e)))
}

fn parse_source(name: &str, block: Value) -> QuackResult<SourceConfig> {
    let Value::Object(mut block) = block else {
        return Err(QuackError::invalid(name, "source settings must be a mapping"));
    };

    let kind = take_string(name, &mut block, "type")?
        .ok_or_else(|| QuackError::invalid(name, "missing 'type'"))?;
    let secret_name = take_string(name, &mut block, "secret_name")?;
    let read_only = match block.remove("read_only") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(read_only)) => read_only,
        Some(_) => return Err(QuackError::invalid(name, "'read_only' must be true or false")),
    };
    let tables = match block.remove("tables") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value::<Vec<String>>(value)
            .map_err(|_| QuackError::invalid(name, "'tables' must be a list of table names"))?,
    };

    Ok(SourceConfig {
        name: name.to_string(),
        spec: parse_spec(name, &kind, block)?,
        secret_name,
        read_only,
        tables,
    })
}

/// Kind-specific fields; `name` is the owning source for error reporting
fn parse_spec(name: &str, kind: &str, fields: Map<String, Value>) -> QuackResult<SourceSpec> {
    let kind = SourceKind::new(kind);
    let spec = match kind.as_str() {
        "postgres" => SourceSpec::Postgres(from_fields(name, fields)?),
        "s3" => SourceSpec::S3(from_fields(name, fields)?),
        "sqlite" => SourceSpec::Sqlite(from_fields(name, fields)?),
        "duckdb" => SourceSpec::DuckDb(from_fields(name, fields)?),
        "local" => SourceSpec::Local(from_fields(name, fields)?),
        "ducklake" => SourceSpec::DuckLake(parse_lake(name, fields)?),
        _ => SourceSpec::Custom(parse_custom(name, kind, fields)?),
    };
    Ok(spec)
}

fn parse_lake(name: &str, mut fields: Map<String, Value>) -> QuackResult<DuckLakeSpec> {
    let mut component = |role: LakeRole| -> QuackResult<ComponentConfig> {
        match fields.remove(role.as_str()) {
            Some(block) => parse_component(name, role, block),
            None => Err(QuackError::invalid(
                name,
                format!("missing '{}' block", role),
            )),
        }
    };
    let catalog = component(LakeRole::Catalog)?;
    let storage = component(LakeRole::Storage)?;

    if let Some(key) = fields.keys().next() {
        return Err(QuackError::invalid(
            name,
            format!("unknown field '{}' for a ducklake source", key),
        ));
    }
    Ok(DuckLakeSpec::new(catalog, storage))
}

fn parse_component(name: &str, role: LakeRole, block: Value) -> QuackResult<ComponentConfig> {
    let Value::Object(mut block) = block else {
        return Err(QuackError::invalid(
            name,
            format!("'{}' must be a mapping", role),
        ));
    };
    for key in ["name", "read_only", "tables"] {
        if block.contains_key(key) {
            return Err(QuackError::invalid(
                name,
                format!("'{}' is not allowed in the {} block", key, role),
            ));
        }
    }

    let kind = take_string(name, &mut block, "type")?
        .ok_or_else(|| QuackError::invalid(name, format!("{} block is missing 'type'", role)))?;
    let secret_name = take_string(name, &mut block, "secret_name")?;
    Ok(ComponentConfig {
        secret_name,
        spec: parse_spec(name, &kind, block)?,
    })
}

/// Unregistered kinds keep their scalar fields as string options
fn parse_custom(
    name: &str,
    kind: SourceKind,
    fields: Map<String, Value>,
) -> QuackResult<CustomSpec> {
    let mut options = BTreeMap::new();
    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        let value = scalar_to_string(&value).ok_or_else(|| {
            QuackError::invalid(name, format!("option '{}' must be a scalar", key))
        })?;
        options.insert(key, value);
    }
    Ok(CustomSpec { kind, options })
}

fn from_fields<T: DeserializeOwned>(name: &str, fields: Map<String, Value>) -> QuackResult<T> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| QuackError::invalid(name, e.to_string()))
}

fn take_string(
    name: &str,
    block: &mut Map<String, Value>,
    key: &str,
) -> QuackResult<Option<String>> {
    match block.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(QuackError::invalid(name, format!("'{}' must be a string", key))),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# quackpipe configuration
# Each source becomes an attached database or a set of views in a DuckDB session.

engine:
  # DuckDB database file; omit for an in-memory engine
  # database: warehouse.duckdb
  # extension_directory: .duckdb/extensions
  settings:
    threads: 4

sources:
  # Relational database; credentials come from the APP_DB_* environment variables
  app:
    type: postgres
    secret_name: app_db
    tables: [users, orders]

  # Object store; tables are read from {path}/{table}.parquet
  raw:
    type: s3
    secret_name: raw_bucket
    region: us-east-1
    path: s3://raw-bucket/exports
    tables: [events]

  # Embedded database file written by `quackpipe move`
  warehouse:
    type: duckdb
    path: warehouse.duckdb
    read_only: false

  # Lake combining a metadata catalog with a storage root
  lake:
    type: ducklake
    catalog:
      type: sqlite
      path: lake_catalog.db
    storage:
      type: local
      path: lake_data/
"#
}
