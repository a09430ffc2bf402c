//! S3 object-store source handler
//!
//! Object stores are not attached. The handler registers an `S3` secret,
//! scoped to the configured root when there is one, so path-qualified
//! queries and ETL writes under that root pick it up.

use crate::error::{QuackError, QuackResult};
use crate::models::{
    CredentialProvider, Directive, ParamValue, S3Spec, SecretDirective, SourceCategory,
    SourceConfig, SourceKind, SourceSpec,
};
use crate::session::ResolvedSource;

use super::{HandlerRegistry, Sink, SourceHandler, kind_mismatch, parquet_views, validate_common};

/// DuckDB extension providing `s3://` access
pub const EXTENSION: &str = "httpfs";

/// Extension needed by the `credential_chain` provider
pub const AWS_EXTENSION: &str = "aws";

pub struct S3Handler;

impl S3Handler {
    fn secret(scope: &str, spec: &S3Spec) -> SecretDirective {
        let chain = spec.provider == Some(CredentialProvider::CredentialChain);
        SecretDirective::new(scope, "S3")
            .param_opt(
                "provider",
                chain.then(|| ParamValue::Keyword(CredentialProvider::CredentialChain.as_str().into())),
            )
            .param_opt("key_id", spec.access_key_id.clone().map(ParamValue::Secret))
            .param_opt("secret", spec.secret_access_key.clone().map(ParamValue::Secret))
            .param_opt("session_token", spec.session_token.clone().map(ParamValue::Secret))
            .param_opt("region", spec.region.clone().map(ParamValue::Text))
            .param_opt("endpoint", spec.endpoint.clone().map(ParamValue::Text))
            .param_opt(
                "url_style",
                spec.url_style.map(|s| ParamValue::Text(s.as_str().into())),
            )
            .param_opt("use_ssl", spec.use_ssl.map(ParamValue::Bool))
            .param_opt("scope", spec.path.clone().map(ParamValue::Text))
    }

    fn spec(source: &SourceConfig) -> Option<&S3Spec> {
        match &source.spec {
            SourceSpec::S3(spec) => Some(spec),
            _ => None,
        }
    }
}

impl SourceHandler for S3Handler {
    fn kind(&self) -> SourceKind {
        SourceKind::S3
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::ObjectStore
    }

    fn validate(&self, source: &SourceConfig, _registry: &HandlerRegistry) -> QuackResult<()> {
        validate_common(source)?;
        let spec = Self::spec(source).ok_or_else(|| kind_mismatch(source, &self.kind()))?;
        if !source.tables.is_empty() && spec.path.is_none() {
            return Err(QuackError::invalid(
                &source.name,
                "'tables' requires a 'path' to read objects from",
            ));
        }
        Ok(())
    }

    fn plan(
        &self,
        source: &ResolvedSource,
        _registry: &HandlerRegistry,
    ) -> QuackResult<Vec<Directive>> {
        let spec = Self::spec(source.config())
            .ok_or_else(|| kind_mismatch(source.config(), &self.kind()))?;

        let mut directives = Directive::extension(EXTENSION).to_vec();
        if spec.provider == Some(CredentialProvider::CredentialChain) {
            directives.extend(Directive::extension(AWS_EXTENSION));
        }
        directives.push(Directive::CreateSecret(Self::secret(source.name(), spec)));
        if let Some(root) = &spec.path {
            directives.extend(parquet_views(source.config(), root));
        }
        Ok(directives)
    }

    fn sink(&self, source: &SourceConfig) -> QuackResult<Sink> {
        let spec = Self::spec(source).ok_or_else(|| kind_mismatch(source, &self.kind()))?;
        match &spec.path {
            Some(root) => Ok(Sink::Files { root: root.clone() }),
            None => Err(QuackError::invalid(
                &source.name,
                "an object-store destination needs a 'path'",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DirectiveKind, UrlStyle};
    use crate::secrets::SecretValue;

    fn plan(source: SourceConfig) -> Vec<Directive> {
        S3Handler
            .plan(&ResolvedSource::inline(source), &HandlerRegistry::default())
            .unwrap()
    }

    #[test]
    fn test_secret_with_keys_and_scope() {
        let directives = plan(SourceConfig::s3(
            "raw",
            S3Spec {
                region: Some("us-east-1".into()),
                endpoint: Some("minio:9000".into()),
                url_style: Some(UrlStyle::Path),
                use_ssl: Some(false),
                access_key_id: Some(SecretValue::new("AKIA")),
                secret_access_key: Some(SecretValue::new("shh")),
                path: Some("s3://bucket/raw/".into()),
                ..Default::default()
            },
        ));

        let kinds: Vec<DirectiveKind> = directives.iter().map(Directive::kind).collect();
        assert_eq!(
            kinds,
            vec![
                DirectiveKind::InstallExtension,
                DirectiveKind::LoadExtension,
                DirectiveKind::CreateSecret,
            ]
        );
        assert_eq!(
            directives[2].to_sql(),
            "CREATE OR REPLACE SECRET raw_secret (TYPE S3, KEY_ID 'AKIA', SECRET 'shh', REGION 'us-east-1', ENDPOINT 'minio:9000', URL_STYLE 'path', USE_SSL false, SCOPE 's3://bucket/raw/');"
        );
        assert!(!directives[2].to_string().contains("shh"));
    }

    #[test]
    fn test_credential_chain_loads_aws() {
        let directives = plan(SourceConfig::s3(
            "raw",
            S3Spec {
                provider: Some(CredentialProvider::CredentialChain),
                ..Default::default()
            },
        ));
        let extensions: Vec<&str> = directives
            .iter()
            .filter_map(Directive::extension_name)
            .collect();
        assert_eq!(extensions, vec!["httpfs", "httpfs", "aws", "aws"]);
        assert_eq!(
            directives[4].to_sql(),
            "CREATE OR REPLACE SECRET raw_secret (TYPE S3, PROVIDER credential_chain);"
        );
    }

    #[test]
    fn test_tables_become_parquet_views() {
        let directives = plan(
            SourceConfig::s3(
                "raw",
                S3Spec {
                    path: Some("s3://bucket/raw".into()),
                    ..Default::default()
                },
            )
            .with_tables(["events"]),
        );
        assert_eq!(
            directives.last().unwrap().to_sql(),
            "CREATE OR REPLACE VIEW raw_events AS SELECT * FROM read_parquet('s3://bucket/raw/events.parquet');"
        );
    }

    #[test]
    fn test_tables_without_path_rejected() {
        let source = SourceConfig::s3("raw", S3Spec::default()).with_tables(["events"]);
        let err = S3Handler
            .validate(&source, &HandlerRegistry::default())
            .unwrap_err();
        assert_eq!(err.source_name(), Some("raw"));
    }

    #[test]
    fn test_sink_needs_path() {
        let with_path = SourceConfig::s3(
            "out",
            S3Spec {
                path: Some("s3://bucket/out/".into()),
                ..Default::default()
            },
        );
        assert_eq!(
            S3Handler.sink(&with_path).unwrap(),
            Sink::Files {
                root: "s3://bucket/out/".into()
            }
        );
        assert!(S3Handler.sink(&SourceConfig::s3("out", S3Spec::default())).is_err());
    }
}
