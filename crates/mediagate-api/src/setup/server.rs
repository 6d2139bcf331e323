//! Server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use mediagate_core::Config;
use tokio_util::sync::CancellationToken;

/// Serve `app` until `shutdown` is cancelled, then drain in-flight requests.
pub async fn start_server(config: &Config, app: Router, shutdown: CancellationToken) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        single_upload_max_bytes = config.upload.single_upload_max_bytes,
        multipart_upload_max_bytes = config.upload.multipart_upload_max_bytes,
        part_size_bytes = config.upload.part_size_bytes,
        session_ttl_secs = config.upload.session_ttl.as_secs(),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
