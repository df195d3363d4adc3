//! CLI Doctor Command
//!
//! Checks the credential and the loaded configuration before a real request.

use kaitai_config::{validate, CredentialPolicy, KaitaiConfig, API_KEY_ENV, API_KEY_FALLBACK_ENV};

use crate::terminal_output::{note_error, note_success, note_warn};

/// Run every check. Returns false if an estimate request would fail locally.
pub fn run(config: &KaitaiConfig) -> bool {
    println!("\nRunning Kaitai doctor...\n");

    let credential_ok = check_credential(config);
    let config_ok = check_config(config);

    println!();
    if credential_ok && config_ok {
        note_success("All checks passed.");
    } else {
        note_error("Some checks failed. Please fix the errors above.");
    }
    credential_ok && config_ok
}

fn check_credential(config: &KaitaiConfig) -> bool {
    println!("Credential:");
    if config.has_api_key() {
        note_success("API key is configured");
        return true;
    }
    match config.credential_policy {
        CredentialPolicy::Block => {
            note_error(&format!(
                "No API key; set {API_KEY_ENV} (or {API_KEY_FALLBACK_ENV}). Estimates will be refused."
            ));
            false
        }
        CredentialPolicy::Warn => {
            note_warn(&format!(
                "No API key; set {API_KEY_ENV}. Requests will be sent and rejected by the provider."
            ));
            true
        }
    }
}

fn check_config(config: &KaitaiConfig) -> bool {
    println!("Configuration:");
    let report = validate(config);
    for error in &report.errors {
        note_error(&format!("{}: {}", error.path, error.message));
    }
    for warning in report.warnings.iter().filter(|w| w.path != "apiKey") {
        note_warn(&format!("{}: {}", warning.path, warning.message));
    }
    if report.is_valid() {
        note_success(&format!("model {} at {}", config.model, config.base_url));
    }
    report.is_valid()
}
