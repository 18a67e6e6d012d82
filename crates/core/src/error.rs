use thiserror::Error;

/// Errors raised by the interception layer itself.
///
/// Failures produced by the wrapped call are never represented here; they
/// travel through the pipeline as the wrapped capability's own error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BehaviorError {
    /// Call arguments could not be canonically encoded for key derivation.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A duration string did not match `<positive integer><s|m|h|d>`.
    #[error("Invalid duration format: {0:?} (use '1s', '1m', '1h' or '1d')")]
    InvalidFormat(String),

    /// A binding configuration could not be applied.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An async-only behavior was bound to a synchronous operation.
    #[error("{behavior} behavior cannot run on synchronous method {method}")]
    UnsupportedOperationKind {
        behavior: &'static str,
        method: &'static str,
    },

    /// A stored result does not have the type the caller expects.
    #[error("Cached result for {method} has an unexpected type")]
    ResultTypeMismatch { method: &'static str },
}

/// Result type for interception operations.
pub type Result<T> = std::result::Result<T, BehaviorError>;
