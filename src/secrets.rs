//! Static API credential lookup.
//!
//! The key is resolved once at startup and handed to the inference client
//! explicitly. Lookup order:
//!
//! 1. the environment variable (default `GROQ_API_KEY`);
//! 2. the same key in a TOML secrets file (default `.underwrite/secrets.toml`,
//!    overridable with `UNDERWRITE_SECRETS`).
//!
//! ```toml
//! GROQ_API_KEY = "gsk_..."
//! ```
//!
//! Empty values count as absent.

use crate::error::UnderwriteError;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Variable holding the bearer token for the default endpoint.
pub const DEFAULT_KEY_VAR: &str = "GROQ_API_KEY";

/// Environment variable overriding the secrets file location.
pub const SECRETS_PATH_VAR: &str = "UNDERWRITE_SECRETS";

const DEFAULT_SECRETS_PATH: &str = ".underwrite/secrets.toml";

/// Resolve the secrets file path: `UNDERWRITE_SECRETS` or the default.
pub fn default_secrets_path() -> PathBuf {
    std::env::var(SECRETS_PATH_VAR)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_PATH))
}

/// A bearer credential. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Look up `var` in the process environment, then in `secrets_path`.
    pub fn load(var: &str, secrets_path: &Path) -> Result<Self, UnderwriteError> {
        let env_value = std::env::var(var).ok();
        Self::resolve(var, env_value.as_deref(), secrets_path)
    }

    /// Same as [`ApiKey::load`] with the environment value supplied by the caller.
    pub fn resolve(
        var: &str,
        env_value: Option<&str>,
        secrets_path: &Path,
    ) -> Result<Self, UnderwriteError> {
        if let Some(v) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
            debug!(var, "API key found in environment");
            return Ok(Self(v.to_string()));
        }

        if let Some(v) = read_secrets_file(secrets_path)?.remove(var) {
            let v = v.trim();
            if !v.is_empty() {
                debug!(var, path = %secrets_path.display(), "API key found in secrets file");
                return Ok(Self(v.to_string()));
            }
        }

        Err(UnderwriteError::CredentialMissing {
            var: var.to_string(),
            secrets_path: secrets_path.to_path_buf(),
        })
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// String-valued top-level keys of the secrets file. A missing file is empty.
fn read_secrets_file(path: &Path) -> Result<HashMap<String, String>, UnderwriteError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(source) => {
            return Err(UnderwriteError::FileRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let table: toml::Table =
        toml::from_str(&raw).map_err(|e| UnderwriteError::SecretsFileInvalid {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    Ok(table
        .into_iter()
        .filter_map(|(k, v)| match v {
            toml::Value::String(s) => Some((k, s)),
            _ => None,
        })
        .collect())
}
