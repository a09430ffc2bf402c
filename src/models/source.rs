//! Source descriptors
//!
//! A [`SourceConfig`] describes one named source: its kind-specific fields
//! ([`SourceSpec`]), an optional secret bundle reference and the flags shared
//! by every kind. Descriptors are plain values; resolving secrets produces a
//! merged copy and never mutates the caller's descriptor.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{QuackError, QuackResult};
use crate::secrets::{SecretBundle, SecretValue};

/// Kind tag used to dispatch a descriptor to its handler
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKind(Cow<'static, str>);

impl SourceKind {
    pub const POSTGRES: SourceKind = SourceKind(Cow::Borrowed("postgres"));
    pub const S3: SourceKind = SourceKind(Cow::Borrowed("s3"));
    pub const SQLITE: SourceKind = SourceKind(Cow::Borrowed("sqlite"));
    pub const DUCKDB: SourceKind = SourceKind(Cow::Borrowed("duckdb"));
    pub const LOCAL: SourceKind = SourceKind(Cow::Borrowed("local"));
    pub const DUCKLAKE: SourceKind = SourceKind(Cow::Borrowed("ducklake"));

    /// Kind tag from free text, normalised to lower case
    pub fn new(kind: impl Into<String>) -> Self {
        SourceKind(Cow::Owned(kind.into().to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broad category of a source kind, declared by its handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    RelationalDatabase,
    ObjectStore,
    EmbeddedFileDatabase,
    LocalPath,
    CompositeLake,
    Other,
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceCategory::RelationalDatabase => write!(f, "relational-database"),
            SourceCategory::ObjectStore => write!(f, "object-store"),
            SourceCategory::EmbeddedFileDatabase => write!(f, "embedded-file-database"),
            SourceCategory::LocalPath => write!(f, "local-path"),
            SourceCategory::CompositeLake => write!(f, "composite-lake"),
            SourceCategory::Other => write!(f, "other"),
        }
    }
}

/// Role of a sub-descriptor inside a composite lake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LakeRole {
    Catalog,
    Storage,
}

impl LakeRole {
    pub const ALL: [LakeRole; 2] = [LakeRole::Catalog, LakeRole::Storage];

    pub fn as_str(&self) -> &'static str {
        match self {
            LakeRole::Catalog => "catalog",
            LakeRole::Storage => "storage",
        }
    }

    /// Categories a sub-descriptor may have in this role
    pub fn allowed_categories(&self) -> &'static [SourceCategory] {
        match self {
            LakeRole::Catalog => &[
                SourceCategory::RelationalDatabase,
                SourceCategory::EmbeddedFileDatabase,
            ],
            LakeRole::Storage => &[SourceCategory::ObjectStore, SourceCategory::LocalPath],
        }
    }
}

impl fmt::Display for LakeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection fields of a PostgreSQL source
///
/// Every field may be left out and supplied by the secret bundle instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostgresSpec {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<SecretValue>,
}

impl PostgresSpec {
    fn fill_gaps(&mut self, source_name: &str, bundle: &SecretBundle) -> QuackResult<()> {
        fill_text(&mut self.host, bundle, "host");
        fill_parsed(&mut self.port, bundle, "port", source_name)?;
        fill_text(&mut self.database, bundle, "database");
        fill_text(&mut self.user, bundle, "user");
        fill_secret(&mut self.password, bundle, "password");
        Ok(())
    }
}

/// S3 addressing style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStyle {
    Path,
    Vhost,
}

impl UrlStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlStyle::Path => "path",
            UrlStyle::Vhost => "vhost",
        }
    }
}

impl FromStr for UrlStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "path" => Ok(UrlStyle::Path),
            "vhost" => Ok(UrlStyle::Vhost),
            _ => Err(format!("Unknown url style: {}", s)),
        }
    }
}

/// How object-store credentials are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialProvider {
    /// Keys supplied inline or through the secret bundle
    #[default]
    Config,
    /// Engine-side AWS credential chain (environment, profile, instance role)
    CredentialChain,
}

impl CredentialProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialProvider::Config => "config",
            CredentialProvider::CredentialChain => "credential_chain",
        }
    }
}

impl FromStr for CredentialProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "config" => Ok(CredentialProvider::Config),
            "credential_chain" => Ok(CredentialProvider::CredentialChain),
            _ => Err(format!("Unknown credential provider: {}", s)),
        }
    }
}

/// Fields of an S3-compatible object store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Spec {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub url_style: Option<UrlStyle>,
    #[serde(default)]
    pub use_ssl: Option<bool>,
    #[serde(default)]
    pub access_key_id: Option<SecretValue>,
    #[serde(default)]
    pub secret_access_key: Option<SecretValue>,
    #[serde(default)]
    pub session_token: Option<SecretValue>,
    /// Root URI, e.g. `s3://bucket/prefix/`
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub provider: Option<CredentialProvider>,
}

impl S3Spec {
    fn fill_gaps(&mut self, source_name: &str, bundle: &SecretBundle) -> QuackResult<()> {
        fill_text(&mut self.region, bundle, "region");
        fill_text(&mut self.endpoint, bundle, "endpoint");
        fill_parsed(&mut self.url_style, bundle, "url_style", source_name)?;
        fill_parsed(&mut self.use_ssl, bundle, "use_ssl", source_name)?;
        fill_secret(&mut self.access_key_id, bundle, "access_key_id");
        fill_secret(&mut self.secret_access_key, bundle, "secret_access_key");
        fill_secret(&mut self.session_token, bundle, "session_token");
        fill_parsed(&mut self.provider, bundle, "provider", source_name)?;
        Ok(())
    }
}

/// A single-file database (`sqlite`, `duckdb`) or a local directory (`local`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    #[serde(default)]
    pub path: Option<String>,
}

impl FileSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

/// One role of a composite lake
///
/// Carries no name, `read_only` or `tables` of its own; those belong to
/// the lake.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentConfig {
    pub secret_name: Option<String>,
    pub spec: SourceSpec,
}

impl ComponentConfig {
    pub fn new(spec: impl Into<SourceSpec>) -> Self {
        Self {
            secret_name: None,
            spec: spec.into(),
        }
    }

    pub fn with_secret(mut self, bundle: impl Into<String>) -> Self {
        self.secret_name = Some(bundle.into());
        self
    }
}

/// Catalog + storage pair attached as one DuckLake
#[derive(Debug, Clone, PartialEq)]
pub struct DuckLakeSpec {
    pub catalog: Box<ComponentConfig>,
    pub storage: Box<ComponentConfig>,
}

impl DuckLakeSpec {
    pub fn new(catalog: ComponentConfig, storage: ComponentConfig) -> Self {
        Self {
            catalog: Box::new(catalog),
            storage: Box::new(storage),
        }
    }

    pub fn component(&self, role: LakeRole) -> &ComponentConfig {
        match role {
            LakeRole::Catalog => &self.catalog,
            LakeRole::Storage => &self.storage,
        }
    }

    /// Internal descriptor for one role, named `<lake>_<role>`
    ///
    /// Inherits the lake's `read_only` and never carries tables.
    pub fn role_config(&self, lake: &SourceConfig, role: LakeRole) -> SourceConfig {
        let component = self.component(role);
        SourceConfig {
            name: format!("{}_{}", lake.name, role),
            spec: component.spec.clone(),
            secret_name: component.secret_name.clone(),
            read_only: lake.read_only,
            tables: Vec::new(),
        }
    }
}

/// Descriptor for a kind handled by a registered third-party handler
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSpec {
    pub kind: SourceKind,
    pub options: BTreeMap<String, String>,
}

impl CustomSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::new(kind),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Kind-specific part of a descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    Postgres(PostgresSpec),
    S3(S3Spec),
    Sqlite(FileSpec),
    DuckDb(FileSpec),
    Local(FileSpec),
    DuckLake(DuckLakeSpec),
    Custom(CustomSpec),
}

impl SourceSpec {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::Postgres(_) => SourceKind::POSTGRES,
            SourceSpec::S3(_) => SourceKind::S3,
            SourceSpec::Sqlite(_) => SourceKind::SQLITE,
            SourceSpec::DuckDb(_) => SourceKind::DUCKDB,
            SourceSpec::Local(_) => SourceKind::LOCAL,
            SourceSpec::DuckLake(_) => SourceKind::DUCKLAKE,
            SourceSpec::Custom(custom) => custom.kind.clone(),
        }
    }

    /// Copy bundle values into every field not already set inline
    ///
    /// File paths and composite roles are never taken from a bundle; roles
    /// are resolved with their own bundles.
    pub fn fill_gaps(&mut self, source_name: &str, bundle: &SecretBundle) -> QuackResult<()> {
        match self {
            SourceSpec::Postgres(spec) => spec.fill_gaps(source_name, bundle),
            SourceSpec::S3(spec) => spec.fill_gaps(source_name, bundle),
            SourceSpec::Sqlite(_)
            | SourceSpec::DuckDb(_)
            | SourceSpec::Local(_)
            | SourceSpec::DuckLake(_)
            | SourceSpec::Custom(_) => Ok(()),
        }
    }
}

impl From<PostgresSpec> for SourceSpec {
    fn from(spec: PostgresSpec) -> Self {
        SourceSpec::Postgres(spec)
    }
}

impl From<S3Spec> for SourceSpec {
    fn from(spec: S3Spec) -> Self {
        SourceSpec::S3(spec)
    }
}

impl From<DuckLakeSpec> for SourceSpec {
    fn from(spec: DuckLakeSpec) -> Self {
        SourceSpec::DuckLake(spec)
    }
}

impl From<CustomSpec> for SourceSpec {
    fn from(spec: CustomSpec) -> Self {
        SourceSpec::Custom(spec)
    }
}

/// One named source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Unique within a session; used as attach alias and view prefix
    pub name: String,
    pub spec: SourceSpec,
    /// Secret bundle consulted for fields left out inline
    pub secret_name: Option<String>,
    /// Defaults to true
    pub read_only: bool,
    /// Tables that get a `{name}_{table}` view after attachment
    pub tables: Vec<String>,
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, spec: impl Into<SourceSpec>) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
            secret_name: None,
            read_only: true,
            tables: Vec::new(),
        }
    }

    pub fn postgres(name: impl Into<String>, spec: PostgresSpec) -> Self {
        Self::new(name, spec)
    }

    pub fn s3(name: impl Into<String>, spec: S3Spec) -> Self {
        Self::new(name, spec)
    }

    pub fn sqlite(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, SourceSpec::Sqlite(FileSpec::new(path)))
    }

    pub fn duckdb(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, SourceSpec::DuckDb(FileSpec::new(path)))
    }

    pub fn local(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, SourceSpec::Local(FileSpec::new(path)))
    }

    pub fn ducklake(name: impl Into<String>, catalog: ComponentConfig, storage: ComponentConfig) -> Self {
        Self::new(name, DuckLakeSpec::new(catalog, storage))
    }

    pub fn with_secret(mut self, bundle: impl Into<String>) -> Self {
        self.secret_name = Some(bundle.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Shorthand for `with_read_only(false)`
    pub fn read_write(self) -> Self {
        self.with_read_only(false)
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.spec.kind()
    }
}

fn fill_text(field: &mut Option<String>, bundle: &SecretBundle, key: &str) {
    if field.is_none() {
        *field = bundle.get_str(key).map(str::to_string);
    }
}

fn fill_secret(field: &mut Option<SecretValue>, bundle: &SecretBundle, key: &str) {
    if field.is_none() {
        *field = bundle.get(key).cloned();
    }
}

fn fill_parsed<T: FromStr>(
    field: &mut Option<T>,
    bundle: &SecretBundle,
    key: &str,
    source_name: &str,
) -> QuackResult<()> {
    if field.is_some() {
        return Ok(());
    }
    if let Some(raw) = bundle.get_str(key) {
        let parsed = raw.trim().parse().map_err(|_| {
            QuackError::invalid(
                source_name,
                format!("secret field '{}' holds an invalid value", key),
            )
        })?;
        *field = Some(parsed);
    }
    Ok(())
}
