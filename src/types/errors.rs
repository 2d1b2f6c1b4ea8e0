//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Only
//! `Input`, `StateTransition` and genuinely unexpected failures are meant to
//! reach callers; the completion-related variants are recovered inside the
//! pipeline and monitoring engine.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for cropwatch.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid request input. Raised before any network call.
    #[error("input error: {0}")]
    Input(String),

    /// Completion service rejected credentials or quota. Terminal for the call.
    #[error("completion auth/quota error: {0}")]
    AuthQuota(String),

    /// Any other completion service failure (transport, 5xx, malformed envelope).
    #[error("completion error: {0}")]
    Completion(String),

    /// Every extraction strategy failed on a completion response.
    #[error("parse error: {0}")]
    Parse(String),

    /// A single tool invocation failed.
    #[error("tool error: {0}")]
    Tool(String),

    /// The refinement completion could not be normalized.
    #[error("refinement parse error: {0}")]
    RefinementParse(String),

    /// Invalid monitoring plan state transition.
    #[error("state transition error: {0}")]
    StateTransition(String),

    /// Timeout.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable machine-readable code, used in structured logs and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Input(_) => "INPUT",
            Error::AuthQuota(_) => "AUTH_QUOTA",
            Error::Completion(_) => "COMPLETION",
            Error::Parse(_) => "PARSE",
            Error::Tool(_) => "TOOL",
            Error::RefinementParse(_) => "REFINEMENT_PARSE",
            Error::StateTransition(_) => "STATE_TRANSITION",
            Error::Timeout(_) => "TIMEOUT",
            Error::Internal(_) => "INTERNAL",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Io(_) => "IO",
        }
    }
}

// Convenience constructors
impl Error {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn auth_quota(msg: impl Into<String>) -> Self {
        Self::AuthQuota(msg.into())
    }

    pub fn completion(msg: impl Into<String>) -> Self {
        Self::Completion(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    pub fn refinement_parse(msg: impl Into<String>) -> Self {
        Self::RefinementParse(msg.into())
    }

    pub fn state_transition(msg: impl Into<String>) -> Self {
        Self::StateTransition(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_failures_have_distinct_codes() {
        assert_eq!(Error::auth_quota("401").code(), "AUTH_QUOTA");
        assert_eq!(Error::completion("503").code(), "COMPLETION");
        assert_eq!(Error::timeout("slow").code(), "TIMEOUT");
        assert_eq!(Error::refinement_parse("garbage").code(), "REFINEMENT_PARSE");
    }

    #[test]
    fn test_display_includes_message() {
        let err = Error::input("image is required");
        assert_eq!(err.to_string(), "input error: image is required");
        assert_eq!(err.code(), "INPUT");
    }
}
