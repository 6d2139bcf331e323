use mediagate_services::MessageHandler;

/// What to tell the broker about a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Redeliver, subject to the consumer's backoff and delivery limit.
    Nak,
}

/// Runs the handler on one payload and maps its result to a disposition.
pub async fn dispatch(handler: &dyn MessageHandler, payload: &[u8]) -> Disposition {
    match handler.handle_message(payload).await {
        Ok(()) => Disposition::Ack,
        Err(e) => {
            tracing::error!(
                error = %e,
                error_type = e.error_type(),
                "Failed to handle storage notification"
            );
            Disposition::Nak
        }
    }
}
