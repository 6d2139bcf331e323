use anyhow::Context;
use mediagate_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    mediagate_infra::init_tracing("mediagate-api")?;
    tracing::info!("Configuration loaded and validated successfully");

    let shutdown = mediagate_infra::shutdown_token();
    let app = mediagate_api::setup::initialize_app(&config, shutdown.clone())
        .await
        .context("Failed to initialize application")?;

    let reaper = app.cleanup.clone().start(config.upload.cleanup_interval);

    let served = mediagate_api::setup::server::start_server(&config, app.router, shutdown.clone()).await;

    // Stop the reaper whether the server drained or failed.
    shutdown.cancel();
    if let Err(e) = reaper.await {
        tracing::error!(error = %e, "Cleanup scheduler task failed");
    }

    served
}
