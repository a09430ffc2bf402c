//! Configuration documents driving session assembly

use quackpipe::engine::RecordingConnector;
use quackpipe::models::DirectiveKind;
use quackpipe::secrets::{ChainSecretProvider, EnvSecretProvider, InMemorySecretProvider};
use quackpipe::{PipeConfig, PipelineBuilder, QuackError, SessionFactory, sample_config};

fn secrets() -> ChainSecretProvider {
    ChainSecretProvider::new()
        .with_provider(EnvSecretProvider::from_vars([
            ("APP_DB_HOST", "db.internal"),
            ("APP_DB_USER", "reader"),
            ("APP_DB_PASSWORD", "s3cret"),
        ]))
        .with_provider(InMemorySecretProvider::new().with_bundle(
            "raw_bucket",
            [("access_key_id", "AKIA"), ("secret_access_key", "shh")],
        ))
}

#[test]
fn test_sample_config_plans() {
    let config = PipeConfig::parse_yaml(sample_config()).unwrap();
    let factory =
        SessionFactory::new(RecordingConnector::new()).with_secret_provider(secrets());

    factory.validate(&config.sources).unwrap();
    let plan = factory.plan(&config.sources).unwrap();

    let sources: Vec<&str> = plan.steps().iter().map(|s| s.source.as_str()).collect();
    assert_eq!(sources.first(), Some(&"app"));
    assert_eq!(sources.last(), Some(&"lake"));

    let shown = plan.to_string();
    assert!(shown.contains("HOST 'db.internal'"));
    assert!(!shown.contains("s3cret"));
    assert!(!shown.contains("shh"));
    assert_eq!(
        plan.directives()
            .filter(|d| d.kind() == DirectiveKind::Attach)
            .count(),
        3
    );
}

#[test]
fn test_config_and_builder_agree() {
    let yaml = r#"
sources:
  app:
    type: sqlite
    path: /srv/app.db
    tables: [users]
  dwh:
    type: duckdb
    path: /srv/dwh.duckdb
    read_only: false
"#;
    let config = PipeConfig::parse_yaml(yaml).unwrap();
    let connector = RecordingConnector::new();

    let from_config = SessionFactory::new(connector.clone())
        .with_secret_provider(InMemorySecretProvider::new())
        .plan(&config.sources)
        .unwrap();
    let from_builder = PipelineBuilder::new()
        .with_connector(connector)
        .with_secret_provider(InMemorySecretProvider::new())
        .add_sources(config.sources.clone())
        .plan()
        .unwrap();
    assert_eq!(from_config, from_builder);
}

#[test]
fn test_unknown_kind_fails_at_dispatch() {
    let yaml = "sources:\n  shop:\n    type: mysql\n    host: db\n";
    let config = PipeConfig::parse_yaml(yaml).unwrap();

    let err = SessionFactory::new(RecordingConnector::new())
        .validate(&config.sources)
        .unwrap_err();
    assert!(matches!(err, QuackError::UnknownSourceType { .. }));
    assert_eq!(err.source_name(), Some("shop"));
}

#[test]
fn test_lake_role_secret_lookup_names_role() {
    let yaml = r#"
sources:
  lake:
    type: ducklake
    catalog: {type: sqlite, path: /c.db}
    storage: {type: s3, secret_name: missing_bucket, path: s3://lake}
"#;
    let config = PipeConfig::parse_yaml(yaml).unwrap();
    let err = SessionFactory::new(RecordingConnector::new())
        .with_secret_provider(InMemorySecretProvider::new())
        .plan(&config.sources)
        .unwrap_err();
    assert!(matches!(
        err,
        QuackError::SecretNotFound { ref bundle, .. } if bundle == "missing_bucket"
    ));
    assert_eq!(err.source_name(), Some("lake_storage"));
}
