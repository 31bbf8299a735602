//! Telegram update handlers.
//!
//! Every message first registers its sender, then text is routed to the
//! command or button/text handler. Handlers return an optional reply which is
//! delivered here.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::{debug, warn};

use tagbot_core::{
    domain::{ChatId, ChatKind, UserId},
    messaging::types::{Inbound, Sender},
};

use crate::router::AppState;

mod commands;
mod text;

fn inbound(msg: &Message) -> Option<Inbound> {
    let user = msg.from()?;
    Some(Inbound {
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: if msg.chat.is_private() {
            ChatKind::Private
        } else {
            ChatKind::Group
        },
        sender: Sender {
            user_id: UserId(user.id.0 as i64),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        },
        text: msg.text().unwrap_or_default().to_string(),
    })
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = inbound(&msg) else {
        return Ok(());
    };

    state.bot.observe(&inbound).await;

    if msg.text().is_none() {
        debug!(chat_id = inbound.chat_id.0, "Non-text message, registered sender only");
        return Ok(());
    }

    let reply = if inbound.text.starts_with('/') {
        commands::handle_command(&state, &inbound).await
    } else {
        text::handle_text(&state, &inbound).await
    };

    if let Some(reply) = reply {
        if let Err(e) = state.messenger.send_reply(inbound.chat_id, reply).await {
            warn!(chat_id = inbound.chat_id.0, "Failed to send reply: {e}");
        }
    }
    Ok(())
}
