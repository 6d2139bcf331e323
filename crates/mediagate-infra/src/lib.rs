//! Mediagate Infrastructure Library
//!
//! Shared process plumbing for the Mediagate binaries:
//! - Tracing subscriber initialization
//! - HTTP middleware (request id)
//! - Shutdown signal handling

#[cfg(feature = "middleware")]
pub mod middleware;

pub mod shutdown;
pub mod telemetry;

#[cfg(feature = "middleware")]
pub use middleware::{request_id_middleware, RequestId, REQUEST_ID_HEADER};

pub use shutdown::{shutdown_signal, shutdown_token};
pub use telemetry::init_tracing;
