//! Ordered chain of secret providers

use std::sync::Arc;

use super::{SecretBundle, SecretError, SecretProvider, SecretResult};

/// Tries each provider in order and returns the first bundle found
///
/// A provider answering `NotFound` passes the lookup on to the next one; any
/// other provider error stops the chain.
#[derive(Clone, Default)]
pub struct ChainSecretProvider {
    providers: Vec<Arc<dyn SecretProvider>>,
}

impl ChainSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: impl SecretProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn push(&mut self, provider: Arc<dyn SecretProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl SecretProvider for ChainSecretProvider {
    fn resolve(&self, name: &str) -> SecretResult<SecretBundle> {
        for provider in &self.providers {
            match provider.resolve(name) {
                Ok(bundle) => {
                    tracing::debug!(
                        bundle = name,
                        provider = provider.provider_name(),
                        "Resolved secret bundle"
                    );
                    return Ok(bundle);
                }
                Err(SecretError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SecretError::NotFound(name.to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{EnvSecretProvider, InMemorySecretProvider};

    struct Failing;

    impl SecretProvider for Failing {
        fn resolve(&self, name: &str) -> SecretResult<SecretBundle> {
            Err(SecretError::Provider {
                bundle: name.to_string(),
                message: "vault sealed".to_string(),
            })
        }

        fn provider_name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_first_match_wins() {
        let chain = ChainSecretProvider::new()
            .with_provider(EnvSecretProvider::from_vars([("PG_HOST", "from-env")]))
            .with_provider(InMemorySecretProvider::new().with_bundle("pg", [("host", "from-memory")]));

        let bundle = chain.resolve("pg").unwrap();
        assert_eq!(bundle.get_str("host"), Some("from-env"));
    }

    #[test]
    fn test_falls_through_not_found() {
        let chain = ChainSecretProvider::new()
            .with_provider(EnvSecretProvider::from_vars(Vec::<(String, String)>::new()))
            .with_provider(InMemorySecretProvider::new().with_bundle("pg", [("host", "from-memory")]));

        assert_eq!(
            chain.resolve("pg").unwrap().get_str("host"),
            Some("from-memory")
        );
        assert_eq!(
            chain.resolve("nope"),
            Err(SecretError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_provider_fault_stops_chain() {
        let chain = ChainSecretProvider::new()
            .with_provider(Failing)
            .with_provider(InMemorySecretProvider::new().with_bundle("pg", [("host", "h")]));

        assert!(matches!(
            chain.resolve("pg"),
            Err(SecretError::Provider { .. })
        ));
    }
}
