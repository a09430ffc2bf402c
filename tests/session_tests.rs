//! Session assembly tests against the recording engine

use quackpipe::engine::RecordingConnector;
use quackpipe::models::{
    ComponentConfig, CustomSpec, Directive, DirectiveKind, FileSpec, PostgresSpec, S3Spec,
    SourceConfig, SourceKind, SourceSpec,
};
use quackpipe::secrets::{EnvSecretProvider, InMemorySecretProvider};
use quackpipe::{PipelineBuilder, QuackError, SessionFactory};

fn pg_env() -> EnvSecretProvider {
    EnvSecretProvider::from_vars([
        ("PG_X_HOST", "h"),
        ("PG_X_USER", "u"),
        ("PG_X_PASSWORD", "p"),
        ("PG_X_DATABASE", "d"),
        ("UNRELATED", "x"),
    ])
}

fn pg_source() -> SourceConfig {
    SourceConfig::postgres("pg", PostgresSpec::default())
        .with_secret("pg_x")
        .with_tables(["users"])
}

fn lake_source() -> SourceConfig {
    SourceConfig::ducklake(
        "lake",
        ComponentConfig::new(SourceSpec::Sqlite(FileSpec::new("/c.db"))),
        ComponentConfig::new(S3Spec {
            region: Some("us-east-1".into()),
            ..Default::default()
        }),
    )
}

#[test]
fn test_relational_source_from_environment_bundle() {
    let connector = RecordingConnector::new();
    let factory = SessionFactory::new(connector.clone()).with_secret_provider(pg_env());

    let session = factory.open(&[pg_source()]).unwrap();
    assert_eq!(session.sources(), ["pg".to_string()]);
    session.close().unwrap();

    let sql: Vec<String> = connector
        .log()
        .directives
        .iter()
        .map(Directive::to_sql)
        .collect();
    assert_eq!(
        sql,
        vec![
            "INSTALL postgres;",
            "LOAD postgres;",
            "CREATE OR REPLACE SECRET pg_secret (TYPE POSTGRES, HOST 'h', DATABASE 'd', USER 'u', PASSWORD 'p');",
            "ATTACH 'dbname=d' AS pg (TYPE POSTGRES, SECRET pg_secret, READ_ONLY);",
            "CREATE OR REPLACE VIEW pg_users AS SELECT * FROM pg.users;",
        ]
    );
}

#[test]
fn test_recorded_directives_never_show_secrets() {
    let connector = RecordingConnector::new();
    let factory = SessionFactory::new(connector.clone()).with_secret_provider(pg_env());
    drop(factory.open(&[pg_source()]).unwrap());

    let rendered = connector.rendered_directives();
    let secret = rendered
        .iter()
        .find(|line| line.contains("SECRET pg_secret ("))
        .unwrap();
    assert!(secret.contains("PASSWORD ****"));
    assert!(!secret.contains("'p'"));
}

#[test]
fn test_inline_fields_override_bundle() {
    let connector = RecordingConnector::new();
    let factory = SessionFactory::new(connector.clone()).with_secret_provider(pg_env());
    let source = SourceConfig::postgres(
        "pg",
        PostgresSpec {
            host: Some("inline-host".into()),
            ..Default::default()
        },
    )
    .with_secret("pg_x");

    let plan = factory.plan(&[source]).unwrap();
    let secret = plan
        .directives()
        .find(|d| d.kind() == DirectiveKind::CreateSecret)
        .unwrap()
        .to_sql();
    assert!(secret.contains("HOST 'inline-host'"));
    assert!(secret.contains("USER 'u'"));
    assert!(!secret.contains("HOST 'h'"));
}

#[test]
fn test_composite_lake_attaches_once() {
    let connector = RecordingConnector::new();
    let factory =
        SessionFactory::new(connector.clone()).with_secret_provider(InMemorySecretProvider::new());
    drop(factory.open(&[lake_source()]).unwrap());

    let directives = connector.log().directives;
    let extensions: Vec<(DirectiveKind, &str)> = directives
        .iter()
        .filter_map(|d| d.extension_name().map(|ext| (d.kind(), ext)))
        .collect();
    assert_eq!(
        extensions,
        vec![
            (DirectiveKind::InstallExtension, "sqlite"),
            (DirectiveKind::LoadExtension, "sqlite"),
            (DirectiveKind::InstallExtension, "httpfs"),
            (DirectiveKind::LoadExtension, "httpfs"),
            (DirectiveKind::InstallExtension, "ducklake"),
            (DirectiveKind::LoadExtension, "ducklake"),
        ]
    );

    let attaches: Vec<String> = directives
        .iter()
        .filter(|d| d.kind() == DirectiveKind::Attach)
        .map(Directive::to_sql)
        .collect();
    assert_eq!(
        attaches,
        vec![
            "ATTACH 'ducklake:sqlite:/c.db' AS lake (STORAGE_SECRET 'lake_storage_secret', READ_ONLY);"
                .to_string()
        ]
    );
    assert_eq!(directives.last().map(Directive::kind), Some(DirectiveKind::Attach));
}

#[test]
fn test_shared_extensions_installed_once() {
    let connector = RecordingConnector::new();
    let factory =
        SessionFactory::new(connector.clone()).with_secret_provider(InMemorySecretProvider::new());
    let sources = vec![
        SourceConfig::sqlite("app", "/app.db"),
        lake_source(),
        SourceConfig::s3(
            "raw",
            S3Spec {
                path: Some("s3://raw".into()),
                ..Default::default()
            },
        ),
    ];
    drop(factory.open(&sources).unwrap());

    let log = connector.log();
    let installs: Vec<&str> = log
        .directives
        .iter()
        .filter(|d| d.kind() == DirectiveKind::InstallExtension)
        .filter_map(Directive::extension_name)
        .collect();
    assert_eq!(installs, vec!["sqlite", "httpfs", "ducklake"]);

    let secrets = log
        .directives
        .iter()
        .filter(|d| d.kind() == DirectiveKind::CreateSecret)
        .count();
    assert_eq!(secrets, 2);
}

#[test]
fn test_duplicate_names_rejected_before_planning() {
    let connector = RecordingConnector::new();
    let factory = SessionFactory::new(connector.clone()).with_secret_provider(pg_env());
    let sources = vec![
        SourceConfig::duckdb("a", "/one.duckdb"),
        SourceConfig::duckdb("a", "/two.duckdb"),
    ];

    let err = factory.open(&sources).unwrap_err();
    assert!(matches!(
        err,
        QuackError::DuplicateSourceName { ref names } if names == &vec!["a".to_string()]
    ));
    let log = connector.log();
    assert_eq!(log.connects, 0);
    assert!(log.directives.is_empty());
}

#[test]
fn test_invalid_lake_role_executes_nothing() {
    let connector = RecordingConnector::new();
    let factory =
        SessionFactory::new(connector.clone()).with_secret_provider(InMemorySecretProvider::new());
    let bad_lake = SourceConfig::ducklake(
        "lake",
        ComponentConfig::new(SourceSpec::Local(FileSpec::new("/meta"))),
        ComponentConfig::new(SourceSpec::Local(FileSpec::new("/data"))),
    );

    let err = factory
        .open(&[SourceConfig::duckdb("ok", "/ok.duckdb"), bad_lake])
        .unwrap_err();
    assert!(matches!(err, QuackError::InvalidSourceConfig { .. }));
    assert_eq!(err.source_name(), Some("lake"));
    assert_eq!(connector.log().connects, 0);
}

#[test]
fn test_missing_bundle_names_source() {
    let connector = RecordingConnector::new();
    let factory =
        SessionFactory::new(connector.clone()).with_secret_provider(InMemorySecretProvider::new());

    let err = factory.open(&[pg_source()]).unwrap_err();
    assert!(matches!(
        err,
        QuackError::SecretNotFound { ref source_name, ref bundle } if source_name == "pg" && bundle == "pg_x"
    ));
    assert_eq!(connector.log().connects, 0);
}

#[test]
fn test_unknown_kind_without_handler() {
    let connector = RecordingConnector::new();
    let factory = SessionFactory::new(connector.clone());
    let source = SourceConfig::new("shop", CustomSpec::new("mysql").with_option("host", "db"));

    let err = factory.validate(&[source]).unwrap_err();
    assert!(matches!(
        err,
        QuackError::UnknownSourceType { ref source_name, ref kind } if source_name == "shop" && kind == "mysql"
    ));
    assert_eq!(SourceKind::new("MySQL").as_str(), "mysql");
}

#[test]
fn test_rebuilding_gives_same_directives() {
    let connector = RecordingConnector::new();
    let builder = PipelineBuilder::new()
        .with_connector(connector.clone())
        .with_secret_provider(pg_env())
        .add_source(pg_source())
        .add_source(lake_source());

    builder.session().unwrap().close().unwrap();
    let first = connector.rendered_directives();
    builder.session().unwrap().close().unwrap();
    let all = connector.rendered_directives();

    assert_eq!(all.len(), first.len() * 2);
    assert_eq!(&all[first.len()..], first.as_slice());
    let log = connector.log();
    assert_eq!(log.connects, 2);
    assert_eq!(log.closes, 2);
}

#[test]
fn test_directive_failure_reports_source_and_kind() {
    let connector = RecordingConnector::new()
        .fail_on_directive(|d| d.kind() == DirectiveKind::Attach);
    let factory =
        SessionFactory::new(connector.clone()).with_secret_provider(InMemorySecretProvider::new());

    let err = factory
        .open(&[SourceConfig::duckdb("w", "/missing/w.duckdb")])
        .unwrap_err();
    match err {
        QuackError::DirectiveExecution {
            source_name,
            directive,
            ..
        } => {
            assert_eq!(source_name, "w");
            assert_eq!(directive, DirectiveKind::Attach);
        }
        other => panic!("unexpected error: {other}"),
    }
    let log = connector.log();
    assert_eq!(log.connects, 1);
    assert_eq!(log.closes, 1);
}

#[test]
fn test_with_session_closes_after_query_error() {
    let connector = RecordingConnector::new().fail_on_statement("boom");
    let factory =
        SessionFactory::new(connector.clone()).with_secret_provider(InMemorySecretProvider::new());

    let result = quackpipe::with_session(
        &factory,
        &[SourceConfig::duckdb("w", "/w.duckdb")],
        |session| session.query("SELECT boom"),
    );
    assert!(result.is_err());
    assert_eq!(connector.log().closes, 1);
}
