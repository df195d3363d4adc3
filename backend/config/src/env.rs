//! Environment variable substitution and overrides for config values.
//!
//! Supports `${VAR_NAME}` syntax in string values, resolved at load time.
//! Only uppercase `[A-Z_][A-Z0-9_]*` variable names are matched.
//! `$${}` escapes to a literal `${}`.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::schema::{CredentialPolicy, KaitaiConfig};

/// Primary credential variable.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Generic fallback credential variable.
pub const API_KEY_FALLBACK_ENV: &str = "API_KEY";

/// Matches `${VAR}` with an optional leading `$` for the escaped form.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute env vars using a provided map (useful for testing).
///
/// Walks the value tree; only string leaves are processed. Fails if any
/// referenced variable is unset or empty.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => {
            let result: Result<Vec<_>> = arr
                .iter()
                .enumerate()
                .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
                .collect();
            Ok(Value::Array(result?))
        }
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &regex::Captures| {
        let var_name = &caps[1];
        if caps[0].starts_with("$$") {
            return format!("${{{var_name}}}");
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Apply environment overrides on top of a loaded config.
///
/// Empty variables are ignored. `GEMINI_API_KEY` wins over `API_KEY`.
pub fn apply_env_overrides(
    mut config: KaitaiConfig,
    env: &HashMap<String, String>,
) -> Result<KaitaiConfig> {
    let get = |name: &str| env.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(key) = get(API_KEY_ENV).or_else(|| get(API_KEY_FALLBACK_ENV)) {
        config.api_key = Some(key.to_string());
    }
    if let Some(model) = get("KAITAI_MODEL") {
        config.model = model.to_string();
    }
    if let Some(url) = get("KAITAI_BASE_URL") {
        config.base_url = url.to_string();
    }
    if let Some(policy) = get("KAITAI_CREDENTIAL_POLICY") {
        config.credential_policy = policy
            .parse::<CredentialPolicy>()
            .map_err(|e| anyhow!("Invalid KAITAI_CREDENTIAL_POLICY: {e}"))?;
    }
    if let Some(secs) = get("KAITAI_TIMEOUT_SECS") {
        config.request_timeout_secs = secs
            .parse()
            .with_context(|| format!("Invalid KAITAI_TIMEOUT_SECS: {secs}"))?;
    }
    if let Some(bind) = get("KAITAI_BIND") {
        config.bind_address = bind.to_string();
    }
    if let Some(port) = get("KAITAI_PORT") {
        config.port = port
            .parse()
            .with_context(|| format!("Invalid KAITAI_PORT: {port}"))?;
    }
    if let Some(dir) = get("KAITAI_LOG_DIR") {
        config.log_dir = Some(PathBuf::from(dir));
    }
    if let Some(level) = get("RUST_LOG") {
        config.log_level = level.to_string();
    }

    Ok(config)
}
