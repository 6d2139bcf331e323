use anyhow::Context;
use mediagate_core::Config;
use mediagate_db::PgUnitOfWork;
use mediagate_services::{FileService, MessageHandler, NotificationService};
use mediagate_storage::{FileStorage, S3Storage};
use mediagate_worker::{ConsumerSettings, NotificationConsumer};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    mediagate_infra::init_tracing("mediagate-worker")?;
    tracing::info!("Configuration loaded and validated successfully");

    let pool = mediagate_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let uow = Arc::new(PgUnitOfWork::new(pool));

    let storage: Arc<dyn FileStorage> = Arc::new(
        S3Storage::new(&config.storage)
            .await
            .context("Failed to initialize S3 storage")?,
    );

    let files = FileService::new(
        uow.clone(),
        storage.clone(),
        config.upload.clone(),
        config.presign.clone(),
    );
    let handler: Arc<dyn MessageHandler> =
        Arc::new(NotificationService::new(uow, storage, files));

    let shutdown = mediagate_infra::shutdown_token();
    NotificationConsumer::new(ConsumerSettings::from(&config.nats), handler)
        .run(shutdown)
        .await?;

    tracing::info!("Worker stopped");
    Ok(())
}
