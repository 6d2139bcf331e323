//! Mediagate persistence
//!
//! Repository contracts for files, upload sessions, tags and file-tag links, the
//! `UnitOfWork` that scopes them to one transaction, and their PostgreSQL adapter.

#[cfg(feature = "memory")]
pub mod memory;
pub mod postgres;
pub mod repository;

#[cfg(feature = "memory")]
pub use memory::{MemoryState, MemoryUnitOfWork};
pub use postgres::{connect, run_migrations, PgUnitOfWork};
pub use repository::{
    FileRepository, FileTagRepository, Repositories, TagRepository, TxFuture, UnitOfWork,
    UploadSessionRepository,
};
