use bytes::Bytes;
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncSeek};
use uuid::Uuid;

/// Stream of inbound blob content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Seekable reader over stored blob content.
///
/// Seekability is what lets the gateway serve ranged and conditional
/// downloads without backend round-trips.
pub trait MediaContent: AsyncRead + AsyncSeek + Send {}

impl<T: AsyncRead + AsyncSeek + Send> MediaContent for T {}

/// Boxed content reader returned by [`MediaHandler::download`].
///
/// [`MediaHandler::download`]: crate::MediaHandler::download
pub type MediaReader = Pin<Box<dyn MediaContent>>;

/// Wrap an already-buffered payload as a [`ByteStream`].
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures_util::stream::once(std::future::ready(Ok(data))))
}

/// Current time truncated to millisecond resolution.
///
/// All request and descriptor timestamps go through this so comparisons are
/// reproducible across serialization boundaries.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(now)
}

/// Metadata for one stored blob.
///
/// Created by the gateway for each accepted upload and handed to the media
/// handler, which persists it. The gateway never mutates a descriptor after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Opaque unique identifier, generated at upload time.
    pub id: String,
    /// Identity of the uploading caller. Set once.
    pub user: String,
    /// Content type detected from the first bytes of the upload. Set once.
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed by the backend on physical write; doubles as the HTTP
    /// freshness indicator on download.
    pub updated_at: DateTime<Utc>,
}

impl FileDescriptor {
    /// New descriptor with a fresh id and both timestamps set to now.
    pub fn new(user: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().simple().to_string(),
            user: user.into(),
            mime_type: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }
}

/// Result of opening a blob for download.
pub struct OpenedMedia {
    pub descriptor: FileDescriptor,
    pub content: MediaReader,
}

impl OpenedMedia {
    pub fn new(descriptor: FileDescriptor, content: MediaReader) -> Self {
        Self {
            descriptor,
            content,
        }
    }
}
