//! Secret resolution and inline-override merging

use crate::error::{QuackError, QuackResult};
use crate::models::{LakeRole, SourceConfig, SourceSpec};
use crate::secrets::{SecretBundle, SecretError, SecretProvider};

/// A descriptor after secret resolution
///
/// Holds the merged descriptor (inline values first, bundle values filling
/// the gaps) and, for composite lakes, the resolved role descriptors named
/// `<lake>_catalog` and `<lake>_storage`. Only the orchestrator builds these.
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    config: SourceConfig,
    bundle: Option<SecretBundle>,
    roles: Vec<(LakeRole, ResolvedSource)>,
}

impl ResolvedSource {
    /// Resolve `config` against `provider`
    pub(crate) fn resolve(config: &SourceConfig, provider: &dyn SecretProvider) -> QuackResult<Self> {
        let mut merged = config.clone();
        let bundle = match &config.secret_name {
            Some(bundle_name) => {
                let bundle = fetch(provider, &config.name, bundle_name)?;
                merged.spec.fill_gaps(&config.name, &bundle)?;
                Some(bundle)
            }
            None => None,
        };

        let mut roles = Vec::new();
        if let SourceSpec::DuckLake(lake) = &config.spec {
            for role in LakeRole::ALL {
                let part = lake.role_config(config, role);
                roles.push((role, Self::resolve(&part, provider)?));
            }
        }

        Ok(Self {
            config: merged,
            bundle,
            roles,
        })
    }

    /// Treat `config` as already resolved; no bundle is consulted
    #[cfg(test)]
    pub(crate) fn inline(config: SourceConfig) -> Self {
        let roles = match &config.spec {
            SourceSpec::DuckLake(lake) => LakeRole::ALL
                .into_iter()
                .map(|role| (role, Self::inline(lake.role_config(&config, role))))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            config,
            bundle: None,
            roles,
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn spec(&self) -> &SourceSpec {
        &self.config.spec
    }

    /// The bundle the descriptor referenced, for handlers of custom kinds
    pub fn bundle(&self) -> Option<&SecretBundle> {
        self.bundle.as_ref()
    }

    /// Resolved sub-descriptor of a composite lake
    pub fn role(&self, role: LakeRole) -> Option<&ResolvedSource> {
        self.roles.iter().find(|(r, _)| *r == role).map(|(_, s)| s)
    }
}

fn fetch(provider: &dyn SecretProvider, source_name: &str, bundle: &str) -> QuackResult<SecretBundle> {
    provider.resolve(bundle).map_err(|e| match e {
        SecretError::NotFound(_) => QuackError::SecretNotFound {
            source_name: source_name.to_string(),
            bundle: bundle.to_string(),
        },
        SecretError::Provider { message, .. } => QuackError::SecretProvider {
            source_name: source_name.to_string(),
            bundle: bundle.to_string(),
            message,
        },
    })
}
