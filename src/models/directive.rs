//! Engine directives
//!
//! Handlers describe the setup a source needs as a list of [`Directive`]
//! values; the session orchestrator orders, deduplicates and executes them.
//! A directive renders to DuckDB SQL through [`Directive::to_sql`], which is
//! the only place secret values are exposed. `Display` renders the same
//! statement with every secret replaced by `****` and is what gets logged.

use serde::Serialize;
use std::fmt;

use crate::secrets::{REDACTED, SecretValue};
use crate::sql::{quote_ident, quote_literal, quote_qualified};

/// Discriminant of a [`Directive`], used in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveKind {
    InstallExtension,
    LoadExtension,
    CreateSecret,
    Attach,
    CreateView,
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::InstallExtension => write!(f, "install-extension"),
            DirectiveKind::LoadExtension => write!(f, "load-extension"),
            DirectiveKind::CreateSecret => write!(f, "create-secret"),
            DirectiveKind::Attach => write!(f, "attach"),
            DirectiveKind::CreateView => write!(f, "create-view"),
        }
    }
}

/// One engine setup step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Directive {
    InstallExtension { extension: String },
    LoadExtension { extension: String },
    CreateSecret(SecretDirective),
    Attach(AttachDirective),
    CreateView(ViewDirective),
}

impl Directive {
    pub fn install(extension: impl Into<String>) -> Self {
        Directive::InstallExtension {
            extension: extension.into(),
        }
    }

    pub fn load(extension: impl Into<String>) -> Self {
        Directive::LoadExtension {
            extension: extension.into(),
        }
    }

    /// Install and load, in that order
    pub fn extension(extension: &str) -> [Directive; 2] {
        [Directive::install(extension), Directive::load(extension)]
    }

    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::InstallExtension { .. } => DirectiveKind::InstallExtension,
            Directive::LoadExtension { .. } => DirectiveKind::LoadExtension,
            Directive::CreateSecret(_) => DirectiveKind::CreateSecret,
            Directive::Attach(_) => DirectiveKind::Attach,
            Directive::CreateView(_) => DirectiveKind::CreateView,
        }
    }

    /// Extension name for install/load directives
    pub fn extension_name(&self) -> Option<&str> {
        match self {
            Directive::InstallExtension { extension } | Directive::LoadExtension { extension } => {
                Some(extension)
            }
            _ => None,
        }
    }

    /// Render the statement for the engine, secrets included
    pub fn to_sql(&self) -> String {
        self.render(true)
    }

    /// Replace every secret value this directive carries with `****`
    ///
    /// Used on engine error messages, which may echo the failing statement.
    pub fn scrub(&self, message: &str) -> String {
        match self {
            Directive::CreateSecret(secret) => secret.scrub(message),
            _ => message.to_string(),
        }
    }

    fn render(&self, reveal: bool) -> String {
        match self {
            Directive::InstallExtension { extension } => {
                format!("INSTALL {};", quote_ident(extension))
            }
            Directive::LoadExtension { extension } => format!("LOAD {};", quote_ident(extension)),
            Directive::CreateSecret(secret) => secret.render(reveal),
            Directive::Attach(attach) => attach.to_sql(),
            Directive::CreateView(view) => view.to_sql(),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// A value inside a `CREATE SECRET` parameter list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(i64),
    Bool(bool),
    /// Bare word such as `credential_chain`
    Keyword(String),
    Secret(SecretValue),
}

impl ParamValue {
    fn render(&self, reveal: bool) -> String {
        match self {
            ParamValue::Text(s) => quote_literal(s),
            ParamValue::Number(n) => n.to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Keyword(k) => k.clone(),
            ParamValue::Secret(s) if reveal => quote_literal(s.expose()),
            ParamValue::Secret(_) => quote_literal(REDACTED),
        }
    }
}

/// Registers a named credential scope with the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecretDirective {
    /// Source alias the secret belongs to
    pub scope: String,
    /// Engine secret type, e.g. `POSTGRES` or `S3`
    pub secret_type: String,
    pub params: Vec<(String, ParamValue)>,
}

impl SecretDirective {
    pub fn new(scope: impl Into<String>, secret_type: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            secret_type: secret_type.into(),
            params: Vec::new(),
        }
    }

    /// Engine-side name of the secret
    pub fn secret_name(&self) -> String {
        secret_name_for(&self.scope)
    }

    pub fn param(mut self, key: &str, value: ParamValue) -> Self {
        self.params.push((key.to_ascii_uppercase(), value));
        self
    }

    /// Add a parameter only when a value is present
    pub fn param_opt(self, key: &str, value: Option<ParamValue>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    fn scrub(&self, message: &str) -> String {
        self.params
            .iter()
            .filter_map(|(_, v)| match v {
                ParamValue::Secret(s) if !s.expose().is_empty() => Some(s.expose()),
                _ => None,
            })
            .fold(message.to_string(), |acc, secret| acc.replace(secret, REDACTED))
    }

    fn render(&self, reveal: bool) -> String {
        let mut parts = vec![format!("TYPE {}", self.secret_type)];
        parts.extend(
            self.params
                .iter()
                .map(|(k, v)| format!("{} {}", k, v.render(reveal))),
        );
        format!(
            "CREATE OR REPLACE SECRET {} ({});",
            quote_ident(&self.secret_name()),
            parts.join(", ")
        )
    }
}

/// Name of the engine secret created for a source alias
pub fn secret_name_for(scope: &str) -> String {
    format!("{}_secret", scope)
}

/// Value of an `ATTACH` option
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Text(String),
    Map(Vec<(String, String)>),
}

impl OptionValue {
    fn render(&self) -> String {
        match self {
            OptionValue::Text(s) => quote_literal(s),
            OptionValue::Map(entries) => {
                let body: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote_literal(k), quote_literal(v)))
                    .collect();
                format!("MAP {{{}}}", body.join(", "))
            }
        }
    }
}

/// Attaches a database under an alias
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttachDirective {
    pub alias: String,
    /// Connection string or path handed to `ATTACH`
    pub target: String,
    /// Database type, e.g. `POSTGRES`; `None` for native DuckDB files
    pub db_type: Option<String>,
    /// Scope of a secret created by the same handler
    pub secret: Option<String>,
    pub read_only: bool,
    pub options: Vec<(String, OptionValue)>,
}

impl AttachDirective {
    pub fn new(alias: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            target: target.into(),
            db_type: None,
            secret: None,
            read_only: true,
            options: Vec::new(),
        }
    }

    pub fn with_type(mut self, db_type: impl Into<String>) -> Self {
        self.db_type = Some(db_type.into());
        self
    }

    pub fn with_secret(mut self, scope: impl Into<String>) -> Self {
        self.secret = Some(scope.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_option(mut self, key: &str, value: OptionValue) -> Self {
        self.options.push((key.to_ascii_uppercase(), value));
        self
    }

    pub fn to_sql(&self) -> String {
        let mut opts = Vec::new();
        if let Some(db_type) = &self.db_type {
            opts.push(format!("TYPE {}", db_type));
        }
        if let Some(scope) = &self.secret {
            opts.push(format!("SECRET {}", quote_ident(&secret_name_for(scope))));
        }
        opts.extend(
            self.options
                .iter()
                .map(|(k, v)| format!("{} {}", k, v.render())),
        );
        if self.read_only {
            opts.push("READ_ONLY".to_string());
        }

        let head = format!(
            "ATTACH {} AS {}",
            quote_literal(&self.target),
            quote_ident(&self.alias)
        );
        if opts.is_empty() {
            format!("{};", head)
        } else {
            format!("{} ({});", head, opts.join(", "))
        }
    }
}

/// What a convenience view selects from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "from", rename_all = "kebab-case")]
pub enum ViewSource {
    /// A table inside an attached database
    Table { alias: String, table: String },
    /// Parquet objects under a storage root
    ParquetFiles { path: String },
}

/// Materializes a convenience view after attachment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewDirective {
    pub view_name: String,
    pub source: ViewSource,
}

impl ViewDirective {
    /// View `{source_name}_{table}` over `{alias}.{table}`
    pub fn table(source_name: &str, alias: &str, table: &str) -> Self {
        Self {
            view_name: format!("{}_{}", source_name, table),
            source: ViewSource::Table {
                alias: alias.to_string(),
                table: table.to_string(),
            },
        }
    }

    /// View `{source_name}_{table}` over a parquet object
    pub fn parquet(source_name: &str, table: &str, path: impl Into<String>) -> Self {
        Self {
            view_name: format!("{}_{}", source_name, table),
            source: ViewSource::ParquetFiles { path: path.into() },
        }
    }

    pub fn to_sql(&self) -> String {
        let from = match &self.source {
            ViewSource::Table { alias, table } => {
                format!("{}.{}", quote_ident(alias), quote_qualified(table))
            }
            ViewSource::ParquetFiles { path } => format!("read_parquet({})", quote_literal(path)),
        };
        format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM {};",
            quote_ident(&self.view_name),
            from
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg_secret() -> SecretDirective {
        SecretDirective::new("pg", "POSTGRES")
            .param("host", ParamValue::Text("h".into()))
            .param("port", ParamValue::Number(5432))
            .param("password", ParamValue::Secret(SecretValue::new("p@ss")))
    }

    #[test]
    fn test_extension_rendering() {
        assert_eq!(Directive::install("postgres").to_sql(), "INSTALL postgres;");
        assert_eq!(Directive::load("httpfs").to_sql(), "LOAD httpfs;");
        assert_eq!(Directive::load("httpfs").extension_name(), Some("httpfs"));
    }

    #[test]
    fn test_secret_rendering_reveals_only_in_sql() {
        let directive = Directive::CreateSecret(pg_secret());
        assert_eq!(
            directive.to_sql(),
            "CREATE OR REPLACE SECRET pg_secret (TYPE POSTGRES, HOST 'h', PORT 5432, PASSWORD 'p@ss');"
        );
        let shown = directive.to_string();
        assert!(shown.contains("PASSWORD '****'"));
        assert!(!shown.contains("p@ss"));
        assert!(!serde_json::to_string(&directive).unwrap().contains("p@ss"));
    }

    #[test]
    fn test_scrub_removes_secret_values() {
        let directive = Directive::CreateSecret(pg_secret());
        let scrubbed = directive.scrub("Parser Error near 'p@ss'");
        assert_eq!(scrubbed, "Parser Error near '****'");
    }

    #[test]
    fn test_attach_rendering() {
        let attach = AttachDirective::new("pg", "dbname=d")
            .with_type("POSTGRES")
            .with_secret("pg");
        assert_eq!(
            attach.to_sql(),
            "ATTACH 'dbname=d' AS pg (TYPE POSTGRES, SECRET pg_secret, READ_ONLY);"
        );

        let writable = AttachDirective::new("local_db", "/tmp/x.duckdb").read_only(false);
        assert_eq!(writable.to_sql(), "ATTACH '/tmp/x.duckdb' AS local_db;");
    }

    #[test]
    fn test_attach_map_option() {
        let attach = AttachDirective::new("lake", "ducklake:postgres:dbname=meta")
            .with_option("data_path", OptionValue::Text("s3://bucket/lake/".into()))
            .with_option(
                "metadata_parameters",
                OptionValue::Map(vec![("TYPE".into(), "postgres".into())]),
            )
            .read_only(false);
        assert_eq!(
            attach.to_sql(),
            "ATTACH 'ducklake:postgres:dbname=meta' AS lake (DATA_PATH 's3://bucket/lake/', METADATA_PARAMETERS MAP {'TYPE': 'postgres'});"
        );
    }

    #[test]
    fn test_view_rendering() {
        let view = ViewDirective::table("pg", "pg", "users");
        assert_eq!(
            view.to_sql(),
            "CREATE OR REPLACE VIEW pg_users AS SELECT * FROM pg.users;"
        );

        let files = ViewDirective::parquet("raw", "events", "s3://b/events.parquet");
        assert_eq!(
            files.to_sql(),
            "CREATE OR REPLACE VIEW raw_events AS SELECT * FROM read_parquet('s3://b/events.parquet');"
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DirectiveKind::InstallExtension.to_string(), "install-extension");
        assert_eq!(
            Directive::CreateView(ViewDirective::table("a", "a", "t")).kind(),
            DirectiveKind::CreateView
        );
    }
}
