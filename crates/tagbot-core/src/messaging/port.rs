use async_trait::async_trait;

use crate::{domain::ChatId, messaging::types::Reply, Result};

/// Outbound side of the messenger.
///
/// The bot core only produces [`Reply`] values; delivering them (splitting,
/// markup rendering, retries) is the adapter's job.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_reply(&self, chat_id: ChatId, reply: Reply) -> Result<()>;
}
