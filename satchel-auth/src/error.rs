use thiserror::Error;

/// Result type for gate operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Classified authentication failures.
///
/// Every variant maps to exactly one wire response; the gateway owns that
/// translation.
#[derive(Error, Debug)]
pub enum AuthError {
    /// API key absent or syntactically invalid. Raised before identity
    /// resolution is attempted.
    #[error("valid API key required")]
    ApiKeyRequired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session expired")]
    SessionExpired,

    #[error("malformed authorization data")]
    MalformedAuth,

    /// Credential was syntactically valid but resolves to no caller.
    #[error("authentication required")]
    AuthRequired,

    #[error("identity subsystem error: {source}")]
    Internal {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl AuthError {
    /// Wrap an identity subsystem failure.
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            source: Box::new(error),
        }
    }
}
