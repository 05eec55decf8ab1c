// Typed errors with thiserror. Surface meaningful messages to JS.

use thiserror::Error;

/// Engine error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid session form: {0}")]
    InvalidForm(String),

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    #[error("Operation not allowed while session is {phase}: {operation}")]
    InvalidState {
        phase: &'static str,
        operation: &'static str,
    },

    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
