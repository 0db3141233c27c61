use chrono::{DateTime, Utc};
use satchel_auth::AuthError;
use satchel_media::MediaError;
use thiserror::Error;

use crate::Envelope;

/// Classified request failure.
///
/// Identity and storage failures flow through the same [`From`] impls and
/// the same [`GatewayError::envelope`] translation, so both subsystems get
/// one decoding path to the wire.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("operation not allowed")]
    NotAllowed,

    /// Upload body hit the configured size ceiling. Distinct from
    /// [`GatewayError::Malformed`] so clients can tell the two apart.
    #[error("request body too large")]
    TooLarge,

    /// File part missing or unreadable for any reason other than size.
    #[error("malformed request")]
    Malformed,

    #[error("internal error")]
    Internal,
}

impl GatewayError {
    /// Decode into the wire envelope, echoing the correlation id.
    pub fn envelope(&self, id: &str, ts: DateTime<Utc>) -> Envelope {
        match self {
            Self::Auth(AuthError::ApiKeyRequired) => Envelope::err_api_key_required(ts),
            Self::Auth(AuthError::AuthRequired) => Envelope::err_auth_required(id, ts),
            Self::Auth(AuthError::InvalidCredentials) => {
                Envelope::error(401, "invalid credentials", id, ts)
            }
            Self::Auth(AuthError::SessionExpired) => {
                Envelope::error(401, "session expired", id, ts)
            }
            Self::Auth(AuthError::MalformedAuth) => {
                Envelope::error(400, "malformed authorization", id, ts)
            }
            Self::Auth(AuthError::Internal { .. }) => Envelope::err_unknown(id, ts),

            Self::Media(MediaError::NotFound { .. }) => Envelope::err_not_found(id, ts),
            Self::Media(MediaError::Denied { .. }) => Envelope::err_permission_denied(id, ts),
            Self::Media(MediaError::Invalid { .. }) => Envelope::err_malformed(id, ts),
            Self::Media(MediaError::Unsupported) => {
                Envelope::error(501, "not implemented", id, ts)
            }
            Self::Media(
                MediaError::Backend { .. }
                | MediaError::Io { .. }
                | MediaError::Serialization { .. },
            ) => Envelope::err_unknown(id, ts),

            Self::NotAllowed => Envelope::err_not_allowed(id, ts),
            Self::TooLarge => Envelope::err_too_large(id, ts),
            Self::Malformed => Envelope::err_malformed(id, ts),
            Self::Internal => Envelope::err_unknown(id, ts),
        }
    }
}
