//! Config validation with user-friendly messages.

use crate::schema::KaitaiConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &KaitaiConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.model.trim().is_empty() {
        report.error("model", "model name must not be empty");
    }
    if !(config.base_url.starts_with("https://") || config.base_url.starts_with("http://")) {
        report.error("baseUrl", format!("'{}' is not an http(s) URL", config.base_url));
    } else if config.base_url.starts_with("http://") {
        report.warn("baseUrl", "provider URL is not using HTTPS");
    }
    if config.request_timeout_secs == 0 {
        report.error("requestTimeoutSecs", "timeout must be at least one second");
    }
    if let Some(t) = config.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("temperature", format!("{t} is outside 0.0..=2.0"));
        }
    }
    if config.max_output_tokens == Some(0) {
        report.error("maxOutputTokens", "must be greater than zero");
    }
    if !config.has_api_key() {
        report.warn(
            "apiKey",
            "no API key configured; estimate requests cannot be authenticated",
        );
    }

    report
}

/// Log every warning of a valid config. Returns how many were logged.
pub fn log_warnings(config: &KaitaiConfig) -> usize {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, detail = %warning.message, "Config warning");
    }
    report.warnings.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn defaults_only_warn_about_missing_key() {
        let report = validate(&KaitaiConfig::default());
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].path, "apiKey");
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn warning_log_has_one_message_field() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        let logged = tracing::subscriber::with_default(subscriber, || {
            log_warnings(&KaitaiConfig::default())
        });
        assert_eq!(logged, 1);

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let line = output.lines().next().unwrap();
        assert_eq!(line.matches("\"message\"").count(), 1, "{line}");
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["fields"]["message"], "Config warning");
        assert_eq!(event["fields"]["path"], "apiKey");
        assert!(event["fields"]["detail"].as_str().unwrap().contains("API key"));
    }

    #[test]
    fn rejects_bad_values() {
        let config = KaitaiConfig {
            api_key: Some("k".into()),
            base_url: "ftp://example".into(),
            request_timeout_secs: 0,
            temperature: Some(3.5),
            ..KaitaiConfig::default()
        };
        let report = validate(&config);
        let paths: Vec<_> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["baseUrl", "requestTimeoutSecs", "temperature"]);
    }
}
