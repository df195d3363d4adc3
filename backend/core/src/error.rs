use thiserror::Error;

use crate::types::{ErrorKind, ErrorState};

/// Message shown when an estimate is requested with no photos.
pub const NO_IMAGES_MESSAGE: &str =
    "Please upload at least one photo of the building before requesting an estimate.";

/// Failure of a single estimate request.
///
/// Every variant is terminal for the current request only; the session can
/// be retried immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    /// The request was refused locally and never reached the network.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required setting (the provider credential) is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network failure or a non-success response from the provider.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl EstimateError {
    pub fn no_images() -> Self {
        Self::Validation(NO_IMAGES_MESSAGE.to_string())
    }

    pub fn missing_credential(env_var: &str) -> Self {
        Self::Configuration(format!(
            "no API key is configured; set {env_var} before requesting an estimate"
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Text shown to the user in the error view.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Configuration(msg) => format!("The estimator is not configured: {msg}"),
            Self::Transport(detail) => {
                format!("Could not get an estimate from the AI service: {detail}")
            }
            Self::Unknown(detail) => {
                format!("An unexpected error occurred while estimating. Please try again. ({detail})")
            }
        }
    }
}

impl From<&EstimateError> for ErrorState {
    fn from(err: &EstimateError) -> Self {
        ErrorState {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

impl From<EstimateError> for ErrorState {
    fn from(err: EstimateError) -> Self {
        ErrorState::from(&err)
    }
}
