//! Typed error hierarchy for genforge.
//!
//! Four top-level enums cover the four subsystem boundaries:
//! - `AiError`: failures from the AI code-generation service
//! - `SandboxError`: failures from the sandbox execution environment
//! - `GenerationError`: fatal failures that abort a generation request
//! - `SessionError`: build-validation session lookups

use thiserror::Error;

/// Errors from the AI code-generation service.
///
/// The split between transient and fatal drives the retry policy in
/// [`crate::ai::RetryingAiService`]: only transient errors are retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiError {
    #[error("AI service temporarily unavailable: {0}")]
    Transient(String),

    #[error("AI service request failed: {0}")]
    Fatal(String),
}

impl AiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors from a sandbox operation.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Unknown sandbox handle {0}")]
    UnknownHandle(String),

    #[error("Refusing to mount path outside the sandbox: {0}")]
    InvalidPath(String),

    #[error("Sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Sandbox operation `{operation}` timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

/// Fatal errors that abort a whole generation request.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Unknown technology stack '{0}'")]
    UnknownStack(String),

    #[error("Stack '{0}' produced no scaffold files")]
    EmptyScaffold(String),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Generation exceeded the {secs}s time limit")]
    TimedOut { secs: u64 },
}

/// Errors from the validation session registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Validation session {0} not found")]
    NotFound(String),

    #[error("Validation session {0} is still running")]
    StillRunning(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_error_transient_is_distinguishable() {
        assert!(AiError::Transient("503".into()).is_transient());
        assert!(!AiError::Fatal("401".into()).is_transient());
    }

    #[test]
    fn generation_error_converts_from_ai_error() {
        let err: GenerationError = AiError::Fatal("bad key".into()).into();
        match &err {
            GenerationError::Ai(AiError::Fatal(msg)) => assert_eq!(msg, "bad key"),
            _ => panic!("Expected GenerationError::Ai(Fatal(...))"),
        }
        assert!(err.to_string().contains("bad key"));
    }

    #[test]
    fn sandbox_timeout_carries_operation() {
        let err = SandboxError::Timeout {
            operation: "build".into(),
            secs: 30,
        };
        assert!(err.to_string().contains("build"));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn session_not_found_carries_id() {
        let err = SessionError::NotFound("abc".into());
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&AiError::Fatal("x".into()));
        assert_std_error(&SandboxError::UnknownHandle("h".into()));
        assert_std_error(&GenerationError::EmptyScaffold("s".into()));
        assert_std_error(&SessionError::NotFound("id".into()));
    }
}
