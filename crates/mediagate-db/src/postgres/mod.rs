//! PostgreSQL adapter
//!
//! Queries are built at runtime with `sqlx::query` so the crate compiles without a live
//! database or an offline query cache.

mod file;
mod file_tag;
mod pool;
mod session;
mod tag;

pub use pool::{connect, run_migrations};

use async_trait::async_trait;
use futures::FutureExt;
use mediagate_core::AppError;
use sqlx::{PgPool, Postgres, Transaction};
use std::panic::AssertUnwindSafe;

use crate::repository::{
    FileRepository, FileTagRepository, Repositories, TagRepository, TxFuture, UnitOfWork,
    UploadSessionRepository,
};

/// Repositories bound to one open transaction.
pub struct PgRepositories {
    tx: Transaction<'static, Postgres>,
}

impl Repositories for PgRepositories {
    fn tags(&mut self) -> &mut dyn TagRepository {
        self
    }

    fn files(&mut self) -> &mut dyn FileRepository {
        self
    }

    fn sessions(&mut self) -> &mut dyn UploadSessionRepository {
        self
    }

    fn file_tags(&mut self) -> &mut dyn FileTagRepository {
        self
    }
}

#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn execute<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: for<'tx> FnOnce(&'tx mut dyn Repositories) -> TxFuture<'tx, T> + Send + 'static,
    {
        let tx = self.pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to begin transaction");
            AppError::Database(e)
        })?;
        let mut repos = PgRepositories { tx };

        let outcome = AssertUnwindSafe(f(&mut repos)).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                repos.tx.commit().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to commit transaction");
                    AppError::Database(e)
                })?;
                Ok(value)
            }
            Ok(Err(err)) => {
                if let Err(e) = repos.tx.rollback().await {
                    tracing::error!(error = %e, cause = %err, "Failed to rollback transaction");
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(e) = repos.tx.rollback().await {
                    tracing::error!(error = %e, "Failed to rollback transaction after panic");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}
