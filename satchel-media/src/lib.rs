//! # satchel-media: media handler capability for the Satchel gateway
//!
//! The gateway consumes blob storage only through the [`MediaHandler`]
//! trait: redirect probing, streaming upload, seekable download, and batch
//! reclamation. Backends (local filesystem, object storage, proxies) plug in
//! behind it without touching the HTTP layer.
//!
//! This crate also owns the [`GarbageCollector`], the background task that
//! periodically reclaims unused blobs, and [`MemoryMediaStore`], an
//! in-memory reference backend.

mod error;
mod gc;
mod memory;
mod store;
mod types;

pub use error::{MediaError, MediaResult};
pub use gc::{GarbageCollector, GcHandle, RETENTION_WINDOW};
pub use memory::MemoryMediaStore;
pub use store::MediaHandler;
pub use types::{
    bytes_stream, now_millis, ByteStream, FileDescriptor, MediaContent, MediaReader, OpenedMedia,
};
