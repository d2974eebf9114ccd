use crate::domain::ports::EventSink;
use crate::domain::transaction::TransactionEvent;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Event sink backed by a bounded `tokio` channel.
///
/// `publish` waits while the queue is full. The receiving half belongs to
/// whatever delivers notifications.
#[derive(Clone)]
pub struct ChannelEventSink {
    sender: mpsc::Sender<TransactionEvent>,
}

impl ChannelEventSink {
    /// Creates the sink and the receiver that drains it.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<TransactionEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn publish(&self, event: TransactionEvent) -> Result<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| PaymentError::EventSinkClosed)
    }
}
