//! DuckLake composite handler
//!
//! A lake pairs a metadata catalog (a relational or embedded database) with
//! a data storage root (an object store or a local directory). The role
//! handlers contribute their extensions and secrets; their attach and view
//! directives are dropped and replaced by one `ATTACH 'ducklake:...'`.

use crate::error::{QuackError, QuackResult};
use crate::models::directive::secret_name_for;
use crate::models::{
    AttachDirective, Directive, DuckLakeSpec, LakeRole, OptionValue, SourceCategory, SourceConfig,
    SourceKind, SourceSpec,
};
use crate::session::ResolvedSource;

use super::{
    HandlerRegistry, Sink, SourceHandler, kind_mismatch, table_views, validate_common,
};

/// DuckDB extension providing the lake format
pub const EXTENSION: &str = "ducklake";

pub struct DuckLakeHandler;

impl DuckLakeHandler {
    fn lake<'a>(&self, source: &'a SourceConfig) -> QuackResult<&'a DuckLakeSpec> {
        match &source.spec {
            SourceSpec::DuckLake(lake) => Ok(lake),
            _ => Err(kind_mismatch(source, &self.kind())),
        }
    }

    /// Role kinds must be registered and belong to the role's categories
    fn check_roles(&self, source: &SourceConfig, registry: &HandlerRegistry) -> QuackResult<()> {
        let lake = self.lake(source)?;
        if source.secret_name.is_some() {
            return Err(QuackError::invalid(
                &source.name,
                "a ducklake takes no 'secret_name'; set it on the catalog or storage role",
            ));
        }

        for role in LakeRole::ALL {
            let kind = lake.component(role).spec.kind();
            let handler = registry.resolve(&kind).ok_or_else(|| QuackError::UnknownSourceType {
                source_name: source.name.clone(),
                kind: kind.to_string(),
            })?;
            let category = handler.category();
            if category == SourceCategory::CompositeLake {
                return Err(QuackError::invalid(
                    &source.name,
                    format!("{} role cannot itself be a '{}' source", role, kind),
                ));
            }
            if !role.allowed_categories().contains(&category) {
                let allowed: Vec<String> = role
                    .allowed_categories()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                return Err(QuackError::invalid(
                    &source.name,
                    format!(
                        "{} role must be {}, got '{}' ({})",
                        role,
                        allowed.join(" or "),
                        kind,
                        category
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl SourceHandler for DuckLakeHandler {
    fn kind(&self) -> SourceKind {
        SourceKind::DUCKLAKE
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::CompositeLake
    }

    fn validate(&self, source: &SourceConfig, registry: &HandlerRegistry) -> QuackResult<()> {
        validate_common(source)?;
        self.check_roles(source, registry)?;

        let lake = self.lake(source)?;
        for role in LakeRole::ALL {
            let part = lake.role_config(source, role);
            registry
                .handler_for(&source.name, &part.kind())?
                .validate(&part, registry)?;
        }
        Ok(())
    }

    fn plan(
        &self,
        source: &ResolvedSource,
        registry: &HandlerRegistry,
    ) -> QuackResult<Vec<Directive>> {
        self.check_roles(source.config(), registry)?;

        let mut directives = Vec::new();
        let mut catalog_attach = None;
        let mut data_path = None;
        let mut storage_secret = None;

        for role in LakeRole::ALL {
            let part = source.role(role).ok_or_else(|| {
                QuackError::invalid(source.name(), format!("{} role was not resolved", role))
            })?;
            let handler = registry.handler_for(source.name(), &part.config().kind())?;

            for directive in handler.plan(part, registry)? {
                match directive {
                    Directive::Attach(attach) if role == LakeRole::Catalog => {
                        catalog_attach = Some(attach)
                    }
                    Directive::Attach(_) | Directive::CreateView(_) => {}
                    Directive::CreateSecret(secret) if role == LakeRole::Storage => {
                        storage_secret = Some(secret.secret_name());
                        directives.push(Directive::CreateSecret(secret));
                    }
                    other => directives.push(other),
                }
            }

            if role == LakeRole::Storage
                && let Ok(Sink::Files { root }) = handler.sink(part.config())
            {
                data_path = Some(root);
            }
        }

        if data_path.is_none() && storage_secret.is_none() {
            return Err(QuackError::invalid(
                source.name(),
                "storage role provides neither a data path nor credentials",
            ));
        }

        let catalog = catalog_attach.ok_or_else(|| {
            QuackError::invalid(source.name(), "catalog role produced no attachable database")
        })?;
        let catalog_type = catalog.db_type.as_deref().map(str::to_ascii_lowercase);
        let target = match &catalog_type {
            Some(db_type) => format!("ducklake:{}:{}", db_type, catalog.target),
            None => format!("ducklake:{}", catalog.target),
        };

        let mut attach =
            AttachDirective::new(source.name(), target).read_only(source.config().read_only);
        if let Some(root) = data_path {
            attach = attach.with_option("data_path", OptionValue::Text(root));
        }
        if let Some(name) = storage_secret {
            attach = attach.with_option("storage_secret", OptionValue::Text(name));
        }
        if let (Some(scope), Some(db_type)) = (&catalog.secret, &catalog_type) {
            attach = attach.with_option(
                "metadata_parameters",
                OptionValue::Map(vec![
                    ("TYPE".to_string(), db_type.clone()),
                    ("SECRET".to_string(), secret_name_for(scope)),
                ]),
            );
        }

        directives.extend(Directive::extension(EXTENSION));
        directives.push(Directive::Attach(attach));
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
    use crate::models::{
        ComponentConfig, CustomSpec, DirectiveKind, FileSpec, PostgresSpec, S3Spec,
    };

    /// Object store that contributes only its extension
    struct BareStoreHandler;

    impl SourceHandler for BareStoreHandler {
        fn kind(&self) -> SourceKind {
            SourceKind::new("gcs")
        }

        fn category(&self) -> SourceCategory {
            SourceCategory::ObjectStore
        }

        fn plan(
            &self,
            _source: &ResolvedSource,
            _registry: &HandlerRegistry,
        ) -> QuackResult<Vec<Directive>> {
            Ok(Directive::extension("httpfs").to_vec())
        }
    }

    fn sqlite_s3_lake() -> SourceConfig {
        SourceConfig::ducklake(
            "lake",
            ComponentConfig::new(SourceSpec::Sqlite(FileSpec::new("/c.db"))),
            ComponentConfig::new(S3Spec {
                region: Some("us-east-1".into()),
                ..Default::default()
            }),
        )
    }

    fn plan(source: SourceConfig) -> QuackResult<Vec<Directive>> {
        DuckLakeHandler.plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
    }

    #[test]
    fn test_single_attach_for_the_lake() {
        let directives = plan(sqlite_s3_lake()).unwrap();

        let attaches: Vec<&Directive> = directives
            .iter()
            .filter(|d| d.kind() == DirectiveKind::Attach)
            .collect();
        assert_eq!(attaches.len(), 1);
        assert_eq!(
            attaches[0].to_sql(),
            "ATTACH 'ducklake:sqlite:/c.db' AS lake (STORAGE_SECRET 'lake_storage_secret', READ_ONLY);"
        );

        let extensions: Vec<&str> = directives
            .iter()
            .filter(|d| d.kind() == DirectiveKind::InstallExtension)
            .filter_map(Directive::extension_name)
            .collect();
        assert_eq!(extensions, vec!["sqlite", "httpfs", "ducklake"]);
        assert_eq!(directives.last().unwrap().kind(), DirectiveKind::Attach);
    }

    #[test]
    fn test_role_secret_names() {
        let directives = plan(sqlite_s3_lake()).unwrap();
        let secret = directives
            .iter()
            .find_map(|d| match d {
                Directive::CreateSecret(s) => Some(s.secret_name()),
                _ => None,
            })
            .unwrap();
        assert_eq!(secret, "lake_storage_secret");
    }

    #[test]
    fn test_postgres_catalog_with_data_path() {
        let lake = SourceConfig::ducklake(
            "lake",
            ComponentConfig::new(PostgresSpec {
                host: Some("meta-host".into()),
                database: Some("meta".into()),
                ..Default::default()
            }),
            ComponentConfig::new(SourceSpec::Local(FileSpec::new("/data/lake/"))),
        )
        .read_write()
        .with_tables(["events"]);

        let directives = plan(lake).unwrap();
        let sql: Vec<String> = directives.iter().map(Directive::to_sql).collect();
        assert!(sql.contains(
            &"ATTACH 'ducklake:postgres:dbname=meta' AS lake (DATA_PATH '/data/lake/', METADATA_PARAMETERS MAP {'TYPE': 'postgres', 'SECRET': 'lake_catalog_secret'});".to_string()
        ));
        assert_eq!(
            sql.last().unwrap(),
            "CREATE OR REPLACE VIEW lake_events AS SELECT * FROM lake.events;"
        );
    }

    #[test]
    fn test_object_store_with_path_sets_both_storage_options() {
        let lake = SourceConfig::ducklake(
            "lake",
            ComponentConfig::new(SourceSpec::Sqlite(FileSpec::new("/c.db"))),
            ComponentConfig::new(S3Spec {
                path: Some("s3://bucket/lake/".into()),
                ..Default::default()
            }),
        );
        let directives = plan(lake).unwrap();
        let attach = directives
            .iter()
            .find(|d| d.kind() == DirectiveKind::Attach)
            .unwrap();
        assert_eq!(
            attach.to_sql(),
            "ATTACH 'ducklake:sqlite:/c.db' AS lake (DATA_PATH 's3://bucket/lake/', STORAGE_SECRET 'lake_storage_secret', READ_ONLY);"
        );
    }

    #[test]
    fn test_storage_without_location_or_credentials_rejected() {
        let registry = HandlerRegistry::default().with_handler(BareStoreHandler);
        let lake = SourceConfig::ducklake(
            "lake",
            ComponentConfig::new(SourceSpec::Sqlite(FileSpec::new("/c.db"))),
            ComponentConfig::new(CustomSpec::new("gcs")),
        );
        let err = DuckLakeHandler
            .plan(&ResolvedSource::inline(lake), &registry)
            .unwrap_err();
        assert!(matches!(err, QuackError::InvalidSourceConfig { .. }));
        assert_eq!(err.source_name(), Some("lake"));
        assert!(err.to_string().contains("storage role"));
    }

    #[test]
    fn test_wrong_role_kind_fails_before_any_directive() {
        let lake = SourceConfig::ducklake(
            "lake",
            ComponentConfig::new(S3Spec::default()),
            ComponentConfig::new(S3Spec::default()),
        );
        let err = plan(lake.clone()).unwrap_err();
        assert!(matches!(err, QuackError::InvalidSourceConfig { .. }));
        assert_eq!(err.source_name(), Some("lake"));
        assert!(err.to_string().contains("catalog role"));

        let err = DuckLakeHandler
            .validate(&lake, &HandlerRegistry::default())
            .unwrap_err();
        assert!(err.to_string().contains("catalog role"));
    }

    #[test]
    fn test_nested_lake_rejected() {
        let inner = DuckLakeSpec::new(
            ComponentConfig::new(SourceSpec::Sqlite(FileSpec::new("/c.db"))),
            ComponentConfig::new(SourceSpec::Local(FileSpec::new("/d"))),
        );
        let outer = SourceConfig::ducklake(
            "outer",
            ComponentConfig::new(inner),
            ComponentConfig::new(SourceSpec::Local(FileSpec::new("/d"))),
        );
        let err = DuckLakeHandler
            .validate(&outer, &HandlerRegistry::default())
            .unwrap_err();
        assert!(err.to_string().contains("cannot itself be"));
    }

    #[test]
    fn test_top_level_secret_rejected() {
        let lake = sqlite_s3_lake().with_secret("whatever");
        let err = DuckLakeHandler
            .validate(&lake, &HandlerRegistry::default())
            .unwrap_err();
        assert_eq!(err.source_name(), Some("lake"));
    }
}
