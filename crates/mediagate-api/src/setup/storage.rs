//! Object storage setup

use anyhow::{Context, Result};
use mediagate_core::Config;
use mediagate_storage::{FileStorage, S3Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn FileStorage>> {
    let storage = S3Storage::new(&config.storage)
        .await
        .context("Failed to initialize S3 storage")?;

    tracing::info!(
        bucket = %config.storage.bucket,
        region = %config.storage.region,
        endpoint = ?config.storage.endpoint_url,
        "S3 storage initialized"
    );
    Ok(Arc::new(storage))
}
