//! Kaitai runtime configuration schema.
//!
//! Typed for serde YAML/JSON deserialization; every field has a default so a
//! missing or partial file is valid.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kaitai_core::{GenerationConfig, DEFAULT_BASE_URL, DEFAULT_MODEL, SURVEY_INSTRUCTION};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PORT: u16 = 8787;

/// What to do when an estimate is requested without a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPolicy {
    /// Fail the request with a configuration error; nothing is sent.
    #[default]
    Block,
    /// Log a warning and send the request anyway.
    Warn,
}

impl FromStr for CredentialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "warn" => Ok(Self::Warn),
            other => Err(format!("unknown credential policy '{other}' (expected block or warn)")),
        }
    }
}

impl fmt::Display for CredentialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::Warn => f.write_str("warn"),
        }
    }
}

/// Root configuration for Kaitai.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KaitaiConfig {
    /// Provider credential. Usually supplied through `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub credential_policy: CredentialPolicy,
    /// Replaces the built-in survey instruction when set.
    pub instruction: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub log_level: String,
    /// Directory for rotated JSON logs; console only when unset.
    pub log_dir: Option<PathBuf>,
    pub bind_address: String,
    pub port: u16,
}

impl Default for KaitaiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            credential_policy: CredentialPolicy::default(),
            instruction: None,
            temperature: None,
            max_output_tokens: None,
            log_level: "info".to_string(),
            log_dir: None,
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl KaitaiConfig {
    pub fn instruction(&self) -> &str {
        self.instruction
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(SURVEY_INSTRUCTION)
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}
