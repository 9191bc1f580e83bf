//! Error types for the Dossier domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level [`Error`]
//! carries the pipeline taxonomy; the generation backend and the document
//! compiler each have their own bounded-context error.

use thiserror::Error;

/// The top-level error type for all Dossier operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input. Never retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A session, artifact, or section reference that does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A costed operation would push the session past its token ceiling.
    /// Raised before the operation runs.
    #[error(
        "Token budget exceeded for session {session_id}: requested {requested}, used {used} of {ceiling}"
    )]
    BudgetExceeded {
        session_id: String,
        requested: u64,
        used: u64,
        ceiling: u64,
    },

    // --- Generation backend ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A same-key store write could not take the key lock in time.
    #[error("Concurrency conflict on {key}: lock not acquired within {waited_ms}ms")]
    ConcurrencyConflict { key: String, waited_ms: u64 },

    // --- Document compiler ---
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    // --- Persistence ---
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session {0} was cancelled")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether a caller may retry the failed operation.
    ///
    /// Validation and not-found errors are surfaced immediately. Budget
    /// breaches get their own reduced-length retry in the generator, so they
    /// are not reported as retryable here.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(e) => e.is_transient(),
            Self::ConcurrencyConflict { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered but produced no usable text, usually because the
    /// output ceiling was consumed by reasoning tokens.
    #[error("Backend returned no output: {0}")]
    EmptyOutput(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Transient failures are retried with backoff; everything else is
    /// surfaced to the caller as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. }
            | Self::Timeout(_)
            | Self::Network(_)
            | Self::EmptyOutput(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 408 || *status_code >= 500,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Compiler not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to launch compiler {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Compiler exited with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },

    #[error("Compiler timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Compiler I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::ApiError {
            status_code: 503,
            message: "Service Unavailable".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn transient_classification() {
        assert!(BackendError::RateLimited { retry_after_secs: 1 }.is_transient());
        assert!(BackendError::Timeout("slow".into()).is_transient());
        assert!(BackendError::EmptyOutput("nothing".into()).is_transient());
        assert!(
            BackendError::ApiError {
                status_code: 502,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !BackendError::ApiError {
                status_code: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!BackendError::AuthenticationFailed("bad key".into()).is_transient());
    }

    #[test]
    fn retryable_errors() {
        assert!(
            Error::ConcurrencyConflict {
                key: "valuation/analysis".into(),
                waited_ms: 500
            }
            .is_retryable()
        );
        assert!(!Error::validation("empty content").is_retryable());
        assert!(!Error::not_found("artifact", "abc").is_retryable());
    }

    #[test]
    fn budget_error_mentions_ceiling() {
        let err = Error::BudgetExceeded {
            session_id: "s1".into(),
            requested: 900,
            used: 200,
            ceiling: 1000,
        };
        let text = err.to_string();
        assert!(text.contains("s1"));
        assert!(text.contains("1000"));
    }
}
