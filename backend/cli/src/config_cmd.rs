//! CLI Config Command
//!
//! Prints the effective configuration with the credential masked.

use anyhow::Result;
use serde_json::Value;

use kaitai_config::{config_dir, config_file_path, redact, KaitaiConfig};

/// Effective config as JSON, secrets masked.
pub fn render(config: &KaitaiConfig) -> Result<Value> {
    Ok(redact(&serde_json::to_value(config)?))
}

pub fn run(config: &KaitaiConfig) -> Result<()> {
    println!("# default file: {}", config_file_path(&config_dir()).display());
    println!("{}", serde_json::to_string_pretty(&render(config)?)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_masked() {
        let config = KaitaiConfig {
            api_key: Some("AIzaSyExampleExampleExample".into()),
            ..KaitaiConfig::default()
        };
        let value = render(&config).unwrap();
        assert_eq!(value["apiKey"], "AIza***");
        assert_eq!(value["model"], config.model);
        assert_eq!(value["credentialPolicy"], "block");
    }
}
