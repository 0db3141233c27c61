use std::collections::HashMap;
use std::io;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, OriginalUri, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use futures::SinkExt;
use satchel_auth::{AuthOutcome, AuthRequest};
use satchel_media::{bytes_stream, now_millis, ByteStream, FileDescriptor};
use tracing::{debug, info, warn};

use crate::content::serve_content;
use crate::sniff::{detect_content_type, SNIFF_LEN};
use crate::{Envelope, GatewayError, GatewayState};

/// Header carrying the client API key; the `apikey` query parameter is the
/// fallback.
pub const API_KEY_HEADER: &str = "x-satchel-api-key";
/// Query parameter naming the caller's session.
pub const SESSION_PARAM: &str = "sid";

const ID_FIELD: &str = "id";
const FILE_FIELD: &str = "file";

fn auth_request(headers: &HeaderMap, query: &HashMap<String, String>) -> AuthRequest {
    let mut req = AuthRequest::new();

    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| query.get("apikey").cloned());
    if let Some(key) = api_key {
        req = req.with_api_key(key);
    }
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        req = req.with_authorization(auth);
    }
    if let Some(sid) = query.get(SESSION_PARAM) {
        req = req.with_session_id(sid);
    }

    req
}

fn redirect_response(location: &str, id: &str, ts: DateTime<Utc>) -> Response {
    let mut res = Envelope::found(id, ts).into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        res.headers_mut().insert(header::LOCATION, value);
    }
    res
}

/// GET handler: stream a stored blob back to an authorized caller.
pub async fn download(
    State(state): State<GatewayState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let now = now_millis();
    debug!(path = uri.path(), "media serve");

    match state.media.redirect(uri.path()).await {
        Ok(Some(location)) => return redirect_response(&location, "", now),
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "media serve: redirect probe failed");
            return GatewayError::from(err).envelope("", now).into_response();
        }
    }

    let creds = auth_request(&headers, &query);
    let uid = match state.auth.authorize(&creds).await {
        Ok(AuthOutcome::Identity(uid)) => uid,
        Ok(AuthOutcome::Challenge(challenge)) => {
            return Envelope::challenge("", now, &challenge).into_response();
        }
        Err(err) => {
            debug!(error = %err, "media serve: unauthorized");
            return GatewayError::from(err).envelope("", now).into_response();
        }
    };

    let opened = match state.media.download(uri.path()).await {
        Ok(opened) => opened,
        Err(err) => {
            warn!(error = %err, path = uri.path(), "media serve: failed");
            return GatewayError::from(err).envelope("", now).into_response();
        }
    };

    let res = serve_content(&headers, &opened.descriptor, opened.content).await;
    info!(user = %uid, id = %opened.descriptor.id, "media served OK");
    res
}

/// Resolve the caller, then report a form failure that was held back so
/// authentication rejections take precedence over body problems.
async fn gate_then_fail(
    state: &GatewayState,
    creds: &AuthRequest,
    msg_id: &str,
    pending: GatewayError,
    now: DateTime<Utc>,
) -> Response {
    match state.auth.authorize(creds).await {
        Ok(AuthOutcome::Challenge(challenge)) => {
            Envelope::challenge(msg_id, now, &challenge).into_response()
        }
        Ok(AuthOutcome::Identity(_)) => {
            debug!(error = %pending, "media upload: bad form");
            pending.envelope(msg_id, now).into_response()
        }
        Err(err) => {
            debug!(error = %err, "media upload: unauthorized");
            GatewayError::from(err).envelope(msg_id, now).into_response()
        }
    }
}

/// Read the leading bytes of the file part for content-type detection.
///
/// Returns the buffered bytes and whether the part is already exhausted.
/// The buffer may overshoot [`SNIFF_LEN`] by up to one chunk; every byte
/// read here is forwarded to the backend.
async fn read_prefix(field: &mut Field<'_>, limit: u64) -> Result<(Vec<u8>, bool), GatewayError> {
    let mut prefix = Vec::new();
    while prefix.len() < SNIFF_LEN {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if limit > 0 && (prefix.len() as u64).saturating_add(chunk.len() as u64) > limit {
                    return Err(GatewayError::TooLarge);
                }
                prefix.extend_from_slice(&chunk);
            }
            Ok(None) => return Ok((prefix, true)),
            Err(_) => return Err(GatewayError::Malformed),
        }
    }
    Ok((prefix, false))
}

/// Hand the backend a stream of the sniffed prefix followed by the rest of
/// the file part, forwarded chunk by chunk under the size ceiling.
///
/// The pump and the backend upload run concurrently over a bounded channel,
/// so no more than a few chunks are ever in flight. On a ceiling breach or
/// a read failure the stream is poisoned with an error so the backend
/// aborts instead of persisting a truncated blob.
async fn stream_upload(
    state: &GatewayState,
    descriptor: &FileDescriptor,
    field: Field<'_>,
    prefix: Vec<u8>,
    limit: u64,
) -> Result<String, GatewayError> {
    let sent = prefix.len() as u64;
    let (mut tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(1);
    if tx.send(Ok(Bytes::from(prefix))).await.is_err() {
        return Err(GatewayError::Internal);
    }

    let stream: ByteStream = Box::pin(rx);
    let upload = state.media.upload(descriptor, stream);
    let pump = async move {
        let mut field = field;
        let mut sent = sent;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    sent = sent.saturating_add(chunk.len() as u64);
                    if limit > 0 && sent > limit {
                        let _ = tx.send(Err(io::Error::other("upload size ceiling"))).await;
                        return Err(GatewayError::TooLarge);
                    }
                    if tx.send(Ok(chunk)).await.is_err() {
                        // Backend gave up; its error is reported below.
                        return Ok(());
                    }
                }
                Ok(None) => return Ok(()),
                Err(_) => {
                    let _ = tx
                        .send(Err(io::Error::other("multipart read failure")))
                        .await;
                    return Err(GatewayError::Malformed);
                }
            }
        }
    };

    let (pumped, uploaded) = tokio::join!(pump, upload);
    pumped?;
    uploaded.map_err(GatewayError::from)
}

/// Authorize the caller, then sniff and stream the file part to storage.
async fn accept_file(
    state: &GatewayState,
    creds: &AuthRequest,
    msg_id: &str,
    mut field: Field<'_>,
    now: DateTime<Utc>,
) -> Response {
    let uid = match state.auth.authorize(creds).await {
        Ok(AuthOutcome::Identity(uid)) => uid,
        Ok(AuthOutcome::Challenge(challenge)) => {
            return Envelope::challenge(msg_id, now, &challenge).into_response();
        }
        Err(err) => {
            debug!(error = %err, "media upload: unauthorized");
            return GatewayError::from(err).envelope(msg_id, now).into_response();
        }
    };

    let limit = state.config.max_upload_size;
    let (prefix, exhausted) = match read_prefix(&mut field, limit).await {
        Ok(read) => read,
        Err(err) => {
            info!(error = %err, user = %uid, "media upload: rejected");
            return err.envelope(msg_id, now).into_response();
        }
    };

    let descriptor = FileDescriptor::new(uid.as_str()).with_mime_type(detect_content_type(&prefix));
    debug!(id = %descriptor.id, mime = %descriptor.mime_type, "media upload");

    let uploaded = if exhausted {
        state
            .media
            .upload(&descriptor, bytes_stream(Bytes::from(prefix)))
            .await
            .map_err(GatewayError::from)
    } else {
        stream_upload(state, &descriptor, field, prefix, limit).await
    };

    match uploaded {
        Ok(url) => {
            info!(user = %uid, id = %descriptor.id, "media upload: ok");
            Envelope::ok(msg_id, now)
                .with_param("url", url)
                .into_response()
        }
        Err(err) => {
            warn!(error = %err, "media upload: failed");
            err.envelope(msg_id, now).into_response()
        }
    }
}

/// POST handler: accept one multipart upload and answer with the blob's
/// serve URL.
///
/// Order of checks: redirect probe, API key, form fields up to the file
/// part, full authorization, then the streamed transfer. The key check
/// needs nothing from the body, so a key-less request is rejected before
/// any of it is read; later form failures are held until the gate has
/// resolved the caller, and echo the correlation id when the `id` field
/// arrived before the failure.
pub async fn upload(
    State(state): State<GatewayState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    form: Result<Multipart, MultipartRejection>,
) -> Response {
    let now = now_millis();

    match state.media.redirect(uri.path()).await {
        Ok(Some(location)) => return redirect_response(&location, "", now),
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "media upload: redirect probe failed");
            return GatewayError::from(err).envelope("", now).into_response();
        }
    }

    let creds = auth_request(&headers, &query);
    if let Err(err) = state.auth.check_api_key(&creds) {
        return GatewayError::from(err).envelope("", now).into_response();
    }

    let mut form = match form {
        Ok(form) => form,
        Err(_) => {
            return gate_then_fail(&state, &creds, "", GatewayError::Malformed, now).await;
        }
    };

    let mut msg_id = String::new();
    loop {
        match form.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some(ID_FIELD) => match field.text().await {
                    Ok(text) => msg_id = text,
                    Err(_) => {
                        return gate_then_fail(&state, &creds, &msg_id, GatewayError::Malformed, now)
                            .await;
                    }
                },
                Some(FILE_FIELD) => {
                    return accept_file(&state, &creds, &msg_id, field, now).await;
                }
                _ => {}
            },
            // End of form without a file part.
            Ok(None) => {
                return gate_then_fail(&state, &creds, &msg_id, GatewayError::Malformed, now).await;
            }
            Err(_) => {
                return gate_then_fail(&state, &creds, &msg_id, GatewayError::Malformed, now).await;
            }
        }
    }
}

/// Fallback for the upload route: every verb except POST is refused, unless
/// the backend redirects the caller elsewhere first.
pub async fn upload_not_allowed(
    State(state): State<GatewayState>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let now = now_millis();
    if let Ok(Some(location)) = state.media.redirect(uri.path()).await {
        return redirect_response(&location, "", now);
    }
    Envelope::err_not_allowed("", now).into_response()
}
