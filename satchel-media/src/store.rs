use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{ByteStream, FileDescriptor, MediaResult, OpenedMedia};

/// Storage capability consumed by the gateway - must be implemented by all
/// media backends (local filesystem, object storage, proxy to an external
/// service).
///
/// Implementations must be safe for concurrent use: upload, download and
/// reclamation calls arrive from independent request tasks plus the
/// background collector.
#[async_trait]
pub trait MediaHandler: Send + Sync {
    /// Ask whether the reference should be served by another origin.
    ///
    /// A `Some(url)` answer short-circuits the request: the gateway responds
    /// with a redirect and never touches the backend again.
    async fn redirect(&self, reference: &str) -> MediaResult<Option<String>>;

    /// Persist a blob from a stream and return its access URL.
    ///
    /// The handler owns stamping `updated_at` on physical write.
    async fn upload(&self, descriptor: &FileDescriptor, content: ByteStream)
        -> MediaResult<String>;

    /// Open a blob for reading.
    async fn download(&self, reference: &str) -> MediaResult<OpenedMedia>;

    /// Physically delete unused blobs older than the cutoff, up to `limit`
    /// per call. Returns the number of blobs reclaimed.
    async fn delete_unused(&self, older_than: DateTime<Utc>, limit: usize) -> MediaResult<usize>;
}
