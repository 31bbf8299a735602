use async_trait::async_trait;

use crate::{
    domain::{ChatId, UserId},
    Result,
};

/// One administrator of a chat, as reported by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatAdmin {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub is_creator: bool,
}

/// Source of truth for chat administrators (Telegram `getChatAdministrators`).
///
/// Lookups go over the network and may fail; callers treat a failure as
/// "no admins known".
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn chat_admins(&self, chat_id: ChatId) -> Result<Vec<ChatAdmin>>;
}
