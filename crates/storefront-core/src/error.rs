use thiserror::Error;

/// Core error types for storefront document handling
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid document id: {0}")]
    InvalidId(String),

    #[error("Time formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),

    #[error("Invalid document: {message}")]
    InvalidDocument { message: String },
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidDocument error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidId(_) | Self::InvalidDocument { .. })
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
