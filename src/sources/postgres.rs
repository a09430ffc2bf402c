//! PostgreSQL source handler
//!
//! Registers a `POSTGRES` secret named after the source and attaches the
//! database through it, so the password never appears in the attach text.

use crate::error::QuackResult;
use crate::models::{
    AttachDirective, Directive, ParamValue, PostgresSpec, SecretDirective, SourceCategory,
    SourceConfig, SourceKind, SourceSpec,
};
use crate::session::ResolvedSource;

use super::{HandlerRegistry, Sink, SourceHandler, kind_mismatch, table_views, validate_common};

/// DuckDB extension providing the postgres scanner
pub const EXTENSION: &str = "postgres";

pub struct PostgresHandler;

impl PostgresHandler {
    fn secret(scope: &str, spec: &PostgresSpec) -> SecretDirective {
        SecretDirective::new(scope, "POSTGRES")
            .param_opt("host", spec.host.clone().map(ParamValue::Text))
            .param_opt("port", spec.port.map(|p| ParamValue::Number(p.into())))
            .param_opt("database", spec.database.clone().map(ParamValue::Text))
            .param_opt("user", spec.user.clone().map(ParamValue::Text))
            .param_opt("password", spec.password.clone().map(ParamValue::Secret))
    }

    /// libpq connection string for the attach; credentials live in the secret
    fn target(spec: &PostgresSpec) -> String {
        spec.database
            .as_deref()
            .map(|db| format!("dbname={}", db))
            .unwrap_or_default()
    }
}

impl SourceHandler for PostgresHandler {
    fn kind(&self) -> SourceKind {
        SourceKind::POSTGRES
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::RelationalDatabase
    }

    fn validate(&self, source: &SourceConfig, _registry: &HandlerRegistry) -> QuackResult<()> {
        validate_common(source)
    }

    fn plan(
        &self,
        source: &ResolvedSource,
        _registry: &HandlerRegistry,
    ) -> QuackResult<Vec<Directive>> {
        let SourceSpec::Postgres(spec) = source.spec() else {
            return Err(kind_mismatch(source.config(), &self.kind()));
        };
        let name = source.name();

        let mut directives = Directive::extension(EXTENSION).to_vec();
        directives.push(Directive::CreateSecret(Self::secret(name, spec)));
        directives.push(Directive::Attach(
            AttachDirective::new(name, Self::target(spec))
                .with_type("POSTGRES")
                .with_secret(name)
                .read_only(source.config().read_only),
        ));
        directives.extend(table_views(source.config()));
        Ok(directives)
    }

    fn sink(&self, source: &SourceConfig) -> QuackResult<Sink> {
        Ok(Sink::Database {
            alias: source.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretValue;

    #[test]
    fn test_plan_order_and_views() {
        let source = SourceConfig::postgres(
            "pg",
            PostgresSpec {
                host: Some("h".into()),
                port: Some(5432),
                database: Some("d".into()),
                user: Some("u".into()),
                password: Some(SecretValue::new("p")),
            },
        )
        .with_tables(["users", "orders"]);

        let directives = PostgresHandler
            .plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
            .unwrap();
        let sql: Vec<String> = directives.iter().map(Directive::to_sql).collect();
        assert_eq!(
            sql,
            vec![
                "INSTALL postgres;",
                "LOAD postgres;",
                "CREATE OR REPLACE SECRET pg_secret (TYPE POSTGRES, HOST 'h', PORT 5432, DATABASE 'd', USER 'u', PASSWORD 'p');",
                "ATTACH 'dbname=d' AS pg (TYPE POSTGRES, SECRET pg_secret, READ_ONLY);",
                "CREATE OR REPLACE VIEW pg_users AS SELECT * FROM pg.users;",
                "CREATE OR REPLACE VIEW pg_orders AS SELECT * FROM pg.orders;",
            ]
        );
        assert!(!directives[3].to_sql().contains("'p'"));
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let source = SourceConfig::postgres(
            "pg",
            PostgresSpec {
                host: Some("h".into()),
                ..Default::default()
            },
        )
        .read_write();

        let directives = PostgresHandler
            .plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
            .unwrap();
        let Directive::CreateSecret(secret) = &directives[2] else {
            panic!("expected create-secret");
        };
        assert_eq!(secret.params, vec![("HOST".to_string(), ParamValue::Text("h".into()))]);
        assert_eq!(
            directives[3].to_sql(),
            "ATTACH '' AS pg (TYPE POSTGRES, SECRET pg_secret);"
        );
    }

    #[test]
    fn test_sink_is_attached_database() {
        let source = SourceConfig::postgres("dwh", PostgresSpec::default());
        assert_eq!(
            PostgresHandler.sink(&source).unwrap(),
            Sink::Database {
                alias: "dwh".to_string()
            }
        );
    }
}
