//! Mediagate Core Library
//!
//! Domain entities, the error taxonomy, media type rules and configuration shared by
//! every Mediagate component.

pub mod config;
pub mod error;
pub mod media_type;
pub mod models;

pub use config::{Config, DatabaseConfig, NatsConfig, PresignConfig, ServerConfig, StorageConfig, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel, MediaTypeError};
pub use media_type::{classify, sniff_content_type, storage_key, MediaType};
