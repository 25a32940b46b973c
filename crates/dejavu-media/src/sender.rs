//! Paced outbound replies.
//!
//! Sends are attempted once. A failed send is logged and reported to the
//! caller as `None`; it never cancels the batch it belongs to.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use dejavu_core::{ChatTransport, OutgoingReply};

#[derive(Clone)]
pub struct ReplySender {
    transport: Arc<dyn ChatTransport>,
    delay: Duration,
}

impl ReplySender {
    pub fn new(transport: Arc<dyn ChatTransport>, delay: Duration) -> Self {
        Self { transport, delay }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Send one reply, returning the sent message id on success.
    pub async fn send(&self, reply: OutgoingReply) -> Option<i64> {
        let chat_id = reply.chat_id;
        let reply_to = reply.reply_to;
        match self.transport.send_reply(reply).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    subsystem = "media",
                    component = "sender",
                    chat_id,
                    reply_to,
                    error = %e,
                    "Reply send failed, continuing"
                );
                None
            }
        }
    }

    /// Send each reply in order with the fixed delay between them.
    ///
    /// Returns how many were delivered.
    pub async fn send_paced(&self, replies: Vec<OutgoingReply>) -> usize {
        let mut delivered = 0;
        let total = replies.len();
        for (i, reply) in replies.into_iter().enumerate() {
            if self.send(reply).await.is_some() {
                delivered += 1;
            }
            if i + 1 < total {
                tokio::time::sleep(self.delay).await;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;

    fn replies_to(targets: &[i64]) -> Vec<OutgoingReply> {
        targets
            .iter()
            .map(|&t| OutgoingReply::new(1, format!("to {}", t)).reply_to(t))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_replies_only() {
        let transport = RecordingTransport::new();
        let sender = ReplySender::new(Arc::new(transport.clone()), Duration::from_secs(1));

        let start = tokio::time::Instant::now();
        let delivered = sender.send_paced(replies_to(&[1, 2, 3])).await;

        assert_eq!(delivered, 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
        assert_eq!(transport.texts(), vec!["to 1", "to 2", "to 3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_keeps_going() {
        let transport = RecordingTransport::new();
        transport.fail_replies_to(2);
        let sender = ReplySender::new(Arc::new(transport.clone()), Duration::from_millis(10));

        assert_eq!(sender.send_paced(replies_to(&[1, 2, 3])).await, 2);
        assert_eq!(transport.texts(), vec!["to 1", "to 3"]);
        assert!(sender.send(replies_to(&[2]).remove(0)).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let sender = ReplySender::new(Arc::new(RecordingTransport::new()), Duration::from_secs(60));
        assert_eq!(sender.send_paced(Vec::new()).await, 0);
    }
}
