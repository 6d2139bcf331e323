//! Mediagate Services Layer
//!
//! Upload orchestration and reconciliation: requesting uploads, verifying multipart
//! completion, finalizing uploads from storage notifications and reaping abandoned ones.
//! Services are generic over the [`UnitOfWork`](mediagate_db::UnitOfWork) and take object
//! storage as `Arc<dyn FileStorage>`.

pub mod cleanup;
pub mod files;
pub mod notification;
pub mod tags;

#[cfg(test)]
pub(crate) mod test_support;

pub use cleanup::{CleanupService, SweepReport};
pub use files::{FileDownload, FileService, MultipartUploadTicket, UploadTicket};
pub use notification::{MessageHandler, NotificationService};
pub use tags::{resolve_tag_ids, TagService};
