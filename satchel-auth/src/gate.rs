use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ApiKeyScheme, AuthError, AuthResult};

/// Identity of a resolved caller.
///
/// The zero id is a valid resolution outcome ("this credential maps to
/// nobody") and is rejected by the gate, distinct from a failed resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn zero() -> Self {
        Self(String::new())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credentials extracted from one HTTP request by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    /// Client API key, from header or query string.
    pub api_key: Option<String>,
    /// Raw `Authorization` header value, if any.
    pub authorization: Option<String>,
    /// Session id, if the client holds one.
    pub session_id: Option<String>,
}

impl AuthRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_authorization(mut self, header: impl Into<String>) -> Self {
        self.authorization = Some(header.into());
        self
    }

    pub fn with_session_id(mut self, sid: impl Into<String>) -> Self {
        self.session_id = Some(sid.into());
        self
    }
}

/// Outcome of identity resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Caller resolved. May be the zero identity.
    Identity(UserId),
    /// The client must complete a further authentication step; the payload
    /// is echoed to it verbatim.
    Challenge(Vec<u8>),
}

/// The external identity subsystem, injected into the gate.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, req: &AuthRequest) -> AuthResult<AuthOutcome>;
}

/// Request-level authentication gate.
///
/// Composes the API key check with identity resolution; handlers see one
/// call with one classified result.
pub struct AuthGate {
    scheme: ApiKeyScheme,
    authenticator: Arc<dyn Authenticator>,
}

impl AuthGate {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            scheme: ApiKeyScheme::new(),
            authenticator,
        }
    }

    /// Syntactic API key check alone, for transports that must reject
    /// key-less requests before reading the request body.
    pub fn check_api_key(&self, req: &AuthRequest) -> AuthResult<()> {
        self.scheme.check(req.api_key.as_deref())
    }

    /// Run the full gate in order: API key, then identity, then the
    /// zero-identity rejection. Challenges pass through untouched.
    pub async fn authorize(&self, req: &AuthRequest) -> AuthResult<AuthOutcome> {
        self.scheme.check(req.api_key.as_deref())?;

        match self.authenticator.authenticate(req).await? {
            AuthOutcome::Identity(uid) if uid.is_zero() => Err(AuthError::AuthRequired),
            outcome => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode_key;
    use crate::API_KEY_LEN;

    struct StaticAuth(AuthResult<AuthOutcome>);

    #[async_trait]
    impl Authenticator for StaticAuth {
        async fn authenticate(&self, _req: &AuthRequest) -> AuthResult<AuthOutcome> {
            match &self.0 {
                Ok(outcome) => Ok(outcome.clone()),
                Err(AuthError::InvalidCredentials) => Err(AuthError::InvalidCredentials),
                Err(_) => Err(AuthError::MalformedAuth),
            }
        }
    }

    fn keyed_request() -> AuthRequest {
        AuthRequest::new().with_api_key(encode_key(&[1u8; API_KEY_LEN - 1]))
    }

    #[tokio::test]
    async fn missing_key_short_circuits_before_identity_resolution() {
        let gate = AuthGate::new(Arc::new(StaticAuth(Ok(AuthOutcome::Identity(
            UserId::new("usr-1"),
        )))));
        let err = gate.authorize(&AuthRequest::new()).await.unwrap_err();
        assert!(matches!(err, AuthError::ApiKeyRequired));
    }

    #[tokio::test]
    async fn key_check_alone_never_resolves_identity() {
        let gate = AuthGate::new(Arc::new(StaticAuth(Err(AuthError::InvalidCredentials))));
        assert!(matches!(
            gate.check_api_key(&AuthRequest::new()),
            Err(AuthError::ApiKeyRequired)
        ));
        // A well-formed key passes the syntactic check even though the
        // authenticator would reject the request.
        assert!(gate.check_api_key(&keyed_request()).is_ok());
    }

    #[tokio::test]
    async fn resolved_identity_passes_through() {
        let gate = AuthGate::new(Arc::new(StaticAuth(Ok(AuthOutcome::Identity(
            UserId::new("usr-1"),
        )))));
        let outcome = gate.authorize(&keyed_request()).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Identity(UserId::new("usr-1")));
    }

    #[tokio::test]
    async fn zero_identity_is_auth_required() {
        let gate = AuthGate::new(Arc::new(StaticAuth(Ok(AuthOutcome::Identity(
            UserId::zero(),
        )))));
        let err = gate.authorize(&keyed_request()).await.unwrap_err();
        assert!(matches!(err, AuthError::AuthRequired));
    }

    #[tokio::test]
    async fn challenge_passes_through_verbatim() {
        let gate = AuthGate::new(Arc::new(StaticAuth(Ok(AuthOutcome::Challenge(
            b"step-2".to_vec(),
        )))));
        let outcome = gate.authorize(&keyed_request()).await.unwrap();
        assert_eq!(outcome, AuthOutcome::Challenge(b"step-2".to_vec()));
    }

    #[tokio::test]
    async fn resolution_failures_keep_their_class() {
        let gate = AuthGate::new(Arc::new(StaticAuth(Err(AuthError::InvalidCredentials))));
        let err = gate.authorize(&keyed_request()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
