//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use mediagate_core::Config;
use mediagate_db::PgUnitOfWork;
use mediagate_services::{CleanupService, FileService, TagService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use routes::build_router;

/// Everything `main` needs to run the API process.
pub struct App {
    pub router: axum::Router,
    pub cleanup: Arc<CleanupService<PgUnitOfWork>>,
}

/// Connects the database and storage, then wires services, router and reaper.
pub async fn initialize_app(config: &Config, shutdown: CancellationToken) -> Result<App> {
    let pool = database::setup_database(config).await?;
    let storage = storage::setup_storage(config).await?;
    let uow = Arc::new(PgUnitOfWork::new(pool));

    let files = FileService::new(
        uow.clone(),
        storage.clone(),
        config.upload.clone(),
        config.presign.clone(),
    );
    let tags = TagService::new(uow.clone());
    let state = Arc::new(AppState::new(files, tags));

    let cleanup = Arc::new(CleanupService::new(
        uow,
        storage,
        config.upload.session_ttl,
        shutdown,
    ));

    Ok(App {
        router: build_router(state),
        cleanup,
    })
}
