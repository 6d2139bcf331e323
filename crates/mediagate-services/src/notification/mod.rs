//! Reconciliation of storage notifications

mod handler;

use async_trait::async_trait;
use mediagate_core::AppError;

pub use handler::NotificationService;

/// Consumer of raw broker payloads. `Err` asks the broker to redeliver.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, payload: &[u8]) -> Result<(), AppError>;
}
