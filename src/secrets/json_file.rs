//! JSON file secret provider

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{SecretBundle, SecretError, SecretProvider, SecretResult};

/// Default directory searched for `{bundle}.json` files
pub const DEFAULT_SECRETS_DIR: &str = "./secrets";

/// Reads bundles from `{dir}/{bundle}.json`
///
/// Each file holds one flat JSON object. Numbers and booleans are accepted
/// and converted to their string form; nested values are rejected.
#[derive(Debug, Clone)]
pub struct JsonFileSecretProvider {
    dir: PathBuf,
}

impl JsonFileSecretProvider {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bundle_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl Default for JsonFileSecretProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SECRETS_DIR)
    }
}

impl SecretProvider for JsonFileSecretProvider {
    fn resolve(&self, name: &str) -> SecretResult<SecretBundle> {
        // Bundle names map straight onto file names
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(SecretError::NotFound(name.to_string()));
        }

        let path = self.bundle_path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SecretError::NotFound(name.to_string()));
            }
            Err(e) => {
                return Err(SecretError::Provider {
                    bundle: name.to_string(),
                    message: format!("Failed to read {}: {}", path.display(), e),
                });
            }
        };

        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&content).map_err(|e| SecretError::Provider {
                bundle: name.to_string(),
                message: format!("Invalid JSON in {}: {}", path.display(), e),
            })?;

        let mut bundle = SecretBundle::new();
        for (key, value) in raw {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Null => continue,
                _ => {
                    return Err(SecretError::Provider {
                        bundle: name.to_string(),
                        message: format!("Key '{}' must hold a scalar value", key),
                    });
                }
            };
            bundle.insert(key, value);
        }
        Ok(bundle)
    }

    fn provider_name(&self) -> &'static str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reads_bundle_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("pg_prod.json"),
            r#"{"host": "json-localhost", "port": 5433, "password": "json-pass"}"#,
        )
        .unwrap();

        let provider = JsonFileSecretProvider::new(dir.path());
        let bundle = provider.resolve("pg_prod").unwrap();
        assert_eq!(bundle.get_str("host"), Some("json-localhost"));
        assert_eq!(bundle.get_str("port"), Some("5433"));
        assert_eq!(bundle.get_str("password"), Some("json-pass"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let provider = JsonFileSecretProvider::new(dir.path());
        assert_eq!(
            provider.resolve("absent"),
            Err(SecretError::NotFound("absent".to_string()))
        );
    }

    #[test]
    fn test_malformed_file_is_provider_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let provider = JsonFileSecretProvider::new(dir.path());
        assert!(matches!(
            provider.resolve("broken"),
            Err(SecretError::Provider { .. })
        ));
    }

    #[test]
    fn test_path_like_names_are_rejected() {
        let provider = JsonFileSecretProvider::default();
        assert!(matches!(
            provider.resolve("../etc/passwd"),
            Err(SecretError::NotFound(_))
        ));
    }
}
