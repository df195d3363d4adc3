//! `kaitai-config` — runtime configuration for the Kaitai estimator.
//!
//! Provides:
//! - Typed config schema with defaults
//! - YAML loading with `${ENV_VAR}` substitution
//! - Environment overrides (credential, model, server)
//! - Redaction for safe display
//! - Validation

pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use env::{
    apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError,
    API_KEY_ENV, API_KEY_FALLBACK_ENV,
};
pub use io::{config_dir, config_file_path, load_config_value};
pub use redact::redact;
pub use schema::{CredentialPolicy, KaitaiConfig};
pub use validation::{log_warnings, validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load the config file (or the default path), substitute env vars, apply
/// environment overrides, and reject invalid values.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: Option<&Path>) -> Result<KaitaiConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path(&config_dir()),
    };
    let raw = load_config_value(&path).await?;
    prepare(&raw, &std::env::vars().collect())
}

/// Turn a raw config tree into a validated config using the given env.
pub fn prepare(raw: &Value, env: &HashMap<String, String>) -> Result<KaitaiConfig> {
    let value = resolve_env_vars_with(raw, env).context("Failed to resolve env vars in config")?;

    let config: KaitaiConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;
    let config = apply_env_overrides(config, env)?;

    // Warnings are logged by the caller once the logger is installed.
    let report = validate(&config);
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}
