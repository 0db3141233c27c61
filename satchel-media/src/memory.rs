use std::collections::HashMap;
use std::io::Cursor;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;

use crate::{
    now_millis, ByteStream, FileDescriptor, MediaError, MediaHandler, MediaResult, OpenedMedia,
};

/// Download path prefix baked into the access URLs this store hands out.
const SERVE_PREFIX: &str = "/v0/file/s/";

struct StoredBlob {
    descriptor: FileDescriptor,
    data: Vec<u8>,
}

/// In-memory media handler.
///
/// Reference backend for tests, demos and single-process deployments; blobs
/// live for the lifetime of the process or until reclaimed.
#[derive(Default)]
pub struct MemoryMediaStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// References arrive as full request paths; the trailing segment is the
    /// blob id.
    fn blob_id(reference: &str) -> &str {
        reference
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(reference)
    }
}

#[async_trait]
impl MediaHandler for MemoryMediaStore {
    async fn redirect(&self, _reference: &str) -> MediaResult<Option<String>> {
        // Everything is served locally.
        Ok(None)
    }

    async fn upload(
        &self,
        descriptor: &FileDescriptor,
        mut content: ByteStream,
    ) -> MediaResult<String> {
        let mut data = Vec::new();
        while let Some(chunk) = content.next().await {
            data.extend_from_slice(&chunk?);
        }

        let mut descriptor = descriptor.clone();
        descriptor.updated_at = now_millis();

        let id = descriptor.id.clone();
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| MediaError::invalid("store lock poisoned"))?;
        blobs.insert(id.clone(), StoredBlob { descriptor, data });

        Ok(format!("{SERVE_PREFIX}{id}"))
    }

    async fn download(&self, reference: &str) -> MediaResult<OpenedMedia> {
        let id = Self::blob_id(reference);
        let blobs = self
            .blobs
            .read()
            .map_err(|_| MediaError::invalid("store lock poisoned"))?;
        let blob = blobs.get(id).ok_or_else(|| MediaError::not_found(id))?;

        Ok(OpenedMedia::new(
            blob.descriptor.clone(),
            Box::pin(Cursor::new(blob.data.clone())),
        ))
    }

    async fn delete_unused(&self, older_than: DateTime<Utc>, limit: usize) -> MediaResult<usize> {
        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| MediaError::invalid("store lock poisoned"))?;

        // Oldest first so repeated capped runs drain in age order.
        let mut expired: Vec<(String, DateTime<Utc>)> = blobs
            .iter()
            .filter(|(_, blob)| blob.descriptor.updated_at < older_than)
            .map(|(id, blob)| (id.clone(), blob.descriptor.updated_at))
            .collect();
        expired.sort_by_key(|(_, updated_at)| *updated_at);
        expired.truncate(limit);

        for (id, _) in &expired {
            blobs.remove(id);
        }
        Ok(expired.len())
    }
}
