//! Environment variable helpers.
//!
//! Thin wrapper over [`std::env::var`] that reports missing variables as a
//! structured error instead of `VarError`, plus typed accessors used by
//! [`crate::config`].

use thiserror::Error;

/// An environment variable required by the application is not set, or is set
/// to a value that cannot be parsed as the requested type.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The variable is not present (or not valid unicode).
    #[error("missing environment variable: {0}")]
    Missing(String),

    /// The variable is present but failed to parse as the requested type.
    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Reads a required environment variable.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    std::env::var(name).map_err(|_| EnvError::Missing(name.to_string()))
}

/// Reads an optional environment variable, returning `None` when unset.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Reads a boolean flag. Accepts `1`/`true`/`yes`/`on` (case-insensitive) as
/// true; unset variables default to `default`.
pub fn get_env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Reads an unsigned integer, falling back to `default` when unset, and
/// erroring when set but unparsable.
pub fn get_env_u64(name: &str, default: u64) -> Result<u64, EnvError> {
    match std::env::var(name) {
        Ok(v) => v.trim().parse::<u64>().map_err(|e| EnvError::Invalid {
            name: name.to_string(),
            value: v,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
