use thiserror::Error;

/// Result type for media handler operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors reported by media handler implementations
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Blob not found: {id}")]
    NotFound { id: String },

    #[error("Permission denied: {message}")]
    Denied { message: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Operation not supported by this handler")]
    Unsupported,

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl MediaError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a permission denied error
    pub fn denied<S: Into<String>>(message: S) -> Self {
        Self::Denied {
            message: message.into(),
        }
    }
}
