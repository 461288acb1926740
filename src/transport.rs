//! Seam between the dispatcher and the chat backend.

use anyhow::Result;
use std::future::Future;

/// A text message received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: String,
}

/// Sending half of a transport. Cheap to clone into per-message tasks.
pub trait ReplySender: Clone + Send + Sync + 'static {
    fn send(&self, chat_id: i64, text: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Chat backend the daemon polls for messages.
pub trait ChatTransport: Send {
    type Sender: ReplySender;

    /// Wait for the next batch of inbound messages. May return an empty batch.
    fn next_batch(&mut self) -> impl Future<Output = Result<Vec<InboundMessage>>> + Send;

    fn split_sender(&self) -> Self::Sender;

    /// Username the bot is addressed by, if the backend has one.
    fn bot_username(&self) -> Option<&str> {
        None
    }
}
