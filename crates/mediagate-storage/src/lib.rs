//! Mediagate Storage Library
//!
//! Object storage abstraction used by the upload engine: presigned simple and per-part
//! uploads, multipart lifecycle, object inspection and download URLs.
//!
//! Keys follow the `{media_type}/{file_id}` layout produced by `mediagate_core::storage_key`.

#[cfg(feature = "storage-memory")]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{FileStorage, ObjectInfo, StorageError, StorageResult};
