//! Admission control error types.

/// Admission control error type.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

/// Result type for admission control operations.
pub type ControlResult<T> = Result<T, ControlError>;
