//! Error types for the decision profile engine
//!
//! Capture and scoring never fail; only the session boundary, the flow
//! controller's input checks, reference loading and replay parsing do.

use thiserror::Error;

use crate::replay::EventValidationError;
use crate::types::SessionId;

/// Errors raised by the session persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Failed to create session: {0}")]
    CreateFailed(String),

    #[error("Session already completed: {0}")]
    Sealed(SessionId),

    #[error("Session backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the test-flow controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("Cannot start test without a session: {0}")]
    SessionUnavailable(SessionError),

    #[error("Operation requires stage {expected}, controller is in {found}")]
    InvalidStage { expected: String, found: String },

    #[error("Option {option} out of range ({available} options)")]
    InvalidChoice { option: usize, available: usize },

    #[error("Stale commit for step {got}, active step is {expected}")]
    StaleCommit { expected: u32, got: u32 },

    #[error("No active question to commit")]
    NotActive,

    #[error("Open answer too short: {got} characters, at least {min} required")]
    OpenAnswerTooShort { min: usize, got: usize },

    #[error("Session completion failed: {0}")]
    CompletionFailed(SessionError),
}

/// Errors raised while loading or validating reference data
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Invalid reference JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid reference data: {0}")]
    Invalid(String),
}

/// Errors raised while loading engine configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while parsing or replaying interaction events
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to parse interaction events: {0}")]
    Parse(String),

    #[error("Event {index} failed validation: {source}")]
    Validation {
        index: usize,
        #[source]
        source: EventValidationError,
    },

    #[error("Event {index} rejected by flow controller: {source}")]
    Flow {
        index: usize,
        #[source]
        source: FlowError,
    },
}
