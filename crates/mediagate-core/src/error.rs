//! Error types module
//!
//! Every failure the upload engine can surface is a variant of `AppError`. Domain kinds
//! (validation, consistency, not-found) stay distinguishable so callers can map them
//! without string matching; mechanical failures carry their source.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Client-side inconsistencies worth watching
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "SESSION_NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Why a (filename, content type) pair was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaTypeError {
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("unsupported mime type: {0}")]
    UnsupportedMimeType(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("file has no extension")]
    MissingExtension,

    #[error("extension {extension} does not match mime type {mime_type}")]
    ExtensionMismatch {
        extension: String,
        mime_type: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("already exists")]
    AlreadyExists,

    #[error("upload session not found")]
    SessionNotFound,

    #[error("tag not found: {0}")]
    TagNotFound(String),

    #[error("file metadata not found")]
    FileMetadataNotFound,

    #[error("invalid file type: {0}")]
    InvalidFileType(#[source] MediaTypeError),

    #[error("file size too big")]
    FileSizeTooBig,

    #[error("file size too small")]
    FileSizeTooSmall,

    #[error("etag mismatch")]
    MismatchETag,

    #[error("number of parts mismatch")]
    MismatchNbParts,

    #[error("duplicate part number: {0}")]
    DuplicatePart(i32),

    #[error("checksum mismatch")]
    MismatchChecksum,

    #[error("size mismatch")]
    SizeMismatch,

    #[error("content type mismatch: declared {declared}, detected {detected}")]
    ContentTypeMismatch { declared: String, detected: String },

    #[error("file not ready")]
    FileNotReady,

    #[error("file upload failed")]
    FileUploadFailed,

    #[error("invalid notification: {0}")]
    InvalidNotification(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<MediaTypeError> for AppError {
    fn from(err: MediaTypeError) -> Self {
        AppError::InvalidFileType(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidNotification(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::AlreadyExists => (409, "ALREADY_EXISTS", false, None, false, LogLevel::Debug),
        AppError::SessionNotFound => (
            404,
            "SESSION_NOT_FOUND",
            false,
            Some("Start a new multipart upload"),
            false,
            LogLevel::Debug,
        ),
        AppError::TagNotFound(_) => (
            404,
            "TAG_NOT_FOUND",
            false,
            Some("Create the missing tags first"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileMetadataNotFound => {
            (404, "FILE_NOT_FOUND", false, None, false, LogLevel::Debug)
        }
        AppError::InvalidFileType(_) => (
            400,
            "INVALID_FILE_TYPE",
            false,
            Some("Use a supported image or video format with a matching extension"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileSizeTooBig => (
            413,
            "FILE_SIZE_TOO_BIG",
            false,
            Some("Use the multipart upload for large files"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileSizeTooSmall => (
            400,
            "FILE_SIZE_TOO_SMALL",
            false,
            Some("Use the simple upload for small files"),
            false,
            LogLevel::Debug,
        ),
        AppError::MismatchETag => (
            409,
            "ETAG_MISMATCH",
            false,
            Some("List the uploaded parts and retry completion"),
            false,
            LogLevel::Warn,
        ),
        AppError::MismatchNbParts => (
            409,
            "PARTS_COUNT_MISMATCH",
            false,
            Some("List the uploaded parts and retry completion"),
            false,
            LogLevel::Warn,
        ),
        AppError::DuplicatePart(_) => {
            (400, "DUPLICATE_PART", false, None, false, LogLevel::Debug)
        }
        AppError::MismatchChecksum => {
            (409, "CHECKSUM_MISMATCH", false, None, false, LogLevel::Warn)
        }
        AppError::SizeMismatch => (409, "SIZE_MISMATCH", false, None, false, LogLevel::Warn),
        AppError::ContentTypeMismatch { .. } => (
            409,
            "CONTENT_TYPE_MISMATCH",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::FileNotReady => (
            409,
            "FILE_NOT_READY",
            true,
            Some("Retry once the upload has been processed"),
            false,
            LogLevel::Debug,
        ),
        AppError::FileUploadFailed => {
            (410, "FILE_UPLOAD_FAILED", false, None, false, LogLevel::Debug)
        }
        AppError::InvalidNotification(_) => (
            400,
            "INVALID_NOTIFICATION",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidInput(_) => (400, "INVALID_INPUT", false, None, false, LogLevel::Debug),
        #[cfg(feature = "sqlx")]
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            (500, "INTERNAL_ERROR", true, None, true, LogLevel::Error)
        }
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::AlreadyExists => "AlreadyExists",
            AppError::SessionNotFound => "SessionNotFound",
            AppError::TagNotFound(_) => "TagNotFound",
            AppError::FileMetadataNotFound => "FileMetadataNotFound",
            AppError::InvalidFileType(_) => "InvalidFileType",
            AppError::FileSizeTooBig => "FileSizeTooBig",
            AppError::FileSizeTooSmall => "FileSizeTooSmall",
            AppError::MismatchETag => "MismatchETag",
            AppError::MismatchNbParts => "MismatchNbParts",
            AppError::DuplicatePart(_) => "DuplicatePart",
            AppError::MismatchChecksum => "MismatchChecksum",
            AppError::SizeMismatch => "SizeMismatch",
            AppError::ContentTypeMismatch { .. } => "ContentTypeMismatch",
            AppError::FileNotReady => "FileNotReady",
            AppError::FileUploadFailed => "FileUploadFailed",
            AppError::InvalidNotification(_) => "InvalidNotification",
            AppError::InvalidInput(_) => "InvalidInput",
            #[cfg(feature = "sqlx")]
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            #[cfg(feature = "sqlx")]
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_session_not_found() {
        let err = AppError::SessionNotFound;
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "SESSION_NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_error_metadata_storage_is_sensitive() {
        let err = AppError::Storage("connection reset by peer".to_string());
        assert!(err.is_sensitive());
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access storage");
    }

    #[test]
    fn test_invalid_file_type_keeps_cause() {
        let err: AppError = MediaTypeError::MissingExtension.into();
        assert!(matches!(
            err,
            AppError::InvalidFileType(MediaTypeError::MissingExtension)
        ));
        assert!(err.detailed_message().contains("Caused by: file has no extension"));
    }

    #[test]
    fn test_tag_not_found_lists_missing_names() {
        let err = AppError::TagNotFound("sport, nature".to_string());
        assert_eq!(err.client_message(), "tag not found: sport, nature");
        assert_eq!(err.error_type(), "TagNotFound");
    }
}
