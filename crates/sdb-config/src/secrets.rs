//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `db.url_env: "SDB_DATABASE_URL"`).
//! - Callers invoke [`resolve_db_secrets`] once at startup and pass the result
//!   into constructors; no other module reads `std::env::var` for credentials.
//! - `Debug` redacts values.
//! - Error messages reference the env var **NAME**, never the value.

use anyhow::{bail, Result};

use crate::settings::DbSettings;

/// Database credentials resolved from the environment.
#[derive(Clone)]
pub struct ResolvedDbSecrets {
    /// Name of the env var the URL came from.
    pub url_env: String,
    pub database_url: String,
}

impl std::fmt::Debug for ResolvedDbSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedDbSecrets")
            .field("url_env", &self.url_env)
            .field("database_url", &"<REDACTED>")
            .finish()
    }
}

/// Resolve a named environment variable.
/// Returns `None` if the variable is unset or its value is blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Read the database URL from the env var named in `db.url_env`.
///
/// # Errors
/// `SECRETS_MISSING` naming the variable when it is unset or blank.
pub fn resolve_db_secrets(db: &DbSettings) -> Result<ResolvedDbSecrets> {
    let name = db.url_env.trim();
    if name.is_empty() {
        bail!("SECRETS_MISSING: db.url_env is blank; set it to the NAME of an env var");
    }
    match resolve_env(name) {
        Some(database_url) => Ok(ResolvedDbSecrets {
            url_env: name.to_string(),
            database_url,
        }),
        None => bail!(
            "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
            name
        ),
    }
}
