//! Domain entities and value types

pub mod file;
pub mod notification;
pub mod part;
pub mod session;
pub mod tag;

pub use file::{FileMetadata, FileStatus, NewFile};
pub use notification::{EventType, UploadNotification};
pub use part::{PartsPage, PresignedRequest, UploadPart};
pub use session::{UploadSession, UploadSessionStatus};
pub use tag::{FileTag, Tag, TagsPage};
