//! Secret resolution
//!
//! A secret provider turns a logical bundle name (for example `pg_prod`)
//! into a mapping of lower-case keys to values. Providers are pure lookups:
//! they never touch the engine and keep no state between calls.
//!
//! The default [`EnvSecretProvider`] reads environment variables named
//! `{BUNDLE}_{KEY}`; [`JsonFileSecretProvider`] reads `{dir}/{bundle}.json`;
//! [`ChainSecretProvider`] tries several providers in order.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

mod chain;
mod json_file;

pub use chain::ChainSecretProvider;
pub use json_file::JsonFileSecretProvider;

/// Placeholder printed wherever a secret value would otherwise appear
pub const REDACTED: &str = "****";

/// A credential value that never prints itself
///
/// `Debug`, `Display` and `Serialize` all emit [`REDACTED`]; the raw value is
/// only reachable through [`SecretValue::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for rendering engine statements only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue({})", REDACTED)
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Resolved key/value pairs of one secret bundle
///
/// Keys are normalised to lower case. Held only while a session is being
/// assembled.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretBundle {
    values: BTreeMap<String, SecretValue>,
}

impl SecretBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<SecretValue>) {
        self.values
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SecretValue> {
        self.values.get(&key.to_ascii_lowercase())
    }

    /// Raw string value for a non-sensitive field such as `host`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).map(SecretValue::expose)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for SecretBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, REDACTED)))
            .finish()
    }
}

impl<K: AsRef<str>, V: Into<SecretValue>> FromIterator<(K, V)> for SecretBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bundle = SecretBundle::new();
        for (k, v) in iter {
            bundle.insert(k, v);
        }
        bundle
    }
}

/// Error type for secret providers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    /// The provider knows nothing about this bundle
    #[error("Secret bundle '{0}' not found")]
    NotFound(String),

    /// Lower-level resolution fault
    #[error("Secret provider error for bundle '{bundle}': {message}")]
    Provider { bundle: String, message: String },
}

/// Result type for secret resolution
pub type SecretResult<T> = Result<T, SecretError>;

/// Resolves secret bundles by name
pub trait SecretProvider: Send + Sync {
    /// Fetch the bundle called `name`
    ///
    /// Returns [`SecretError::NotFound`] when the provider has no knowledge of
    /// the bundle. A known bundle that lacks some key is not an error; the
    /// key is simply absent from the result.
    fn resolve(&self, name: &str) -> SecretResult<SecretBundle>;

    /// Short provider name for logs
    fn provider_name(&self) -> &'static str;
}

/// Reads secret bundles from environment variables
///
/// For bundle `pg_prod`, every variable starting with `PG_PROD_` contributes
/// one key: `PG_PROD_HOST=db` resolves to `host = db`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    snapshot: Option<HashMap<String, String>>,
}

impl EnvSecretProvider {
    /// Provider over the live process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider over a fixed set of variables instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            snapshot: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn collect(&self, prefix: &str) -> SecretBundle {
        let matching = |(key, value): (&str, &str)| {
            key.strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest.to_ascii_lowercase(), value.to_string()))
        };

        match &self.snapshot {
            Some(vars) => vars
                .iter()
                .filter_map(|(k, v)| matching((k, v)))
                .collect(),
            None => std::env::vars()
                .filter_map(|(k, v)| matching((&k, &v)))
                .collect(),
        }
    }
}

impl SecretProvider for EnvSecretProvider {
    fn resolve(&self, name: &str) -> SecretResult<SecretBundle> {
        if name.is_empty() {
            return Err(SecretError::NotFound(String::new()));
        }
        let prefix = format!("{}_", name.to_ascii_uppercase());
        let bundle = self.collect(&prefix);
        if bundle.is_empty() {
            Err(SecretError::NotFound(name.to_string()))
        } else {
            Ok(bundle)
        }
    }

    fn provider_name(&self) -> &'static str {
        "env"
    }
}

/// Holds bundles in memory, for programmatic setups and tests
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretProvider {
    bundles: HashMap<String, SecretBundle>,
}

impl InMemorySecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bundle, replacing any bundle with the same name
    pub fn with_bundle<I, K, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SecretValue>,
    {
        self.bundles
            .insert(name.into(), values.into_iter().collect());
        self
    }
}

impl SecretProvider for InMemorySecretProvider {
    fn resolve(&self, name: &str) -> SecretResult<SecretBundle> {
        self.bundles
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
