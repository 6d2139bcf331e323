//! Mediagate finalization worker
//!
//! Pulls storage bucket notifications from NATS JetStream and hands each payload to a
//! [`MessageHandler`](mediagate_services::MessageHandler). The handler's result decides
//! the acknowledgement: success acks, failure naks so the broker redelivers.

pub mod consumer;
pub mod dispatch;

pub use consumer::{ConsumerSettings, NotificationConsumer};
pub use dispatch::{dispatch, Disposition};
