use std::collections::BTreeMap;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Control section of a response envelope: status, echoed message id,
/// human text, request timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct Ctrl {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub code: u16,
    pub text: String,
    #[serde(serialize_with = "serialize_millis")]
    pub ts: DateTime<Utc>,
}

/// Uniform JSON envelope for every control response the gateway emits.
///
/// Successful downloads bypass it entirely; everything else - success,
/// redirect, challenge, error - is exactly one envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub ctrl: Ctrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
}

fn serialize_millis<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl Envelope {
    fn new(code: u16, text: &str, id: &str, ts: DateTime<Utc>) -> Self {
        Self {
            ctrl: Ctrl {
                id: id.to_string(),
                code,
                text: text.to_string(),
                ts,
            },
            params: None,
        }
    }

    pub fn ok(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(200, "ok", id, ts)
    }

    /// Body accompanying an HTTP redirect.
    pub fn found(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(302, "found", id, ts)
    }

    /// Info response carrying an authentication challenge, echoed verbatim
    /// (base64 on the wire).
    pub fn challenge(id: &str, ts: DateTime<Utc>, challenge: &[u8]) -> Self {
        Self::new(200, "challenge", id, ts).with_param("challenge", BASE64.encode(challenge))
    }

    /// Generic classified error.
    pub fn error(code: u16, text: &str, id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(code, text, id, ts)
    }

    pub fn err_api_key_required(ts: DateTime<Utc>) -> Self {
        Self::new(401, "valid API key required", "", ts)
    }

    pub fn err_auth_required(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(401, "authentication required", id, ts)
    }

    pub fn err_not_allowed(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(405, "operation not allowed", id, ts)
    }

    pub fn err_too_large(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(413, "request too large", id, ts)
    }

    pub fn err_malformed(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(400, "malformed request", id, ts)
    }

    pub fn err_unknown(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(500, "internal error", id, ts)
    }

    pub fn err_not_found(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(404, "not found", id, ts)
    }

    pub fn err_permission_denied(id: &str, ts: DateTime<Utc>) -> Self {
        Self::new(403, "permission denied", id, ts)
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn code(&self) -> u16 {
        self.ctrl.code
    }

    pub fn text(&self) -> &str {
        &self.ctrl.text
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.ctrl.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_vec(&self).unwrap_or_default();
        (
            status,
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response()
    }
}
