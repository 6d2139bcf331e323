//! Tracing initialization

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set. Targets match by prefix, so `mediagate`
/// covers every `mediagate_*` crate.
pub const DEFAULT_FILTER: &str = "mediagate=debug,tower_http=debug";

/// Install the global subscriber: `EnvFilter` from `RUST_LOG` (or [`DEFAULT_FILTER`])
/// and the fmt layer. Call once per process.
pub fn init_tracing(service_name: &str) -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))?;

    tracing::info!(service = service_name, "Tracing initialized");
    Ok(())
}
