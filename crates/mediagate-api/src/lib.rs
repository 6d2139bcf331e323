//! Mediagate HTTP API
//!
//! JSON endpoints over the upload engine: simple and multipart upload requests, multipart
//! session driving, downloads and tags. The binary also runs the expiration reaper.

pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use setup::build_router;
pub use state::AppState;
