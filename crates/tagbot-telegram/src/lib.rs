//! Telegram adapter (teloxide).
//!
//! Implements the `tagbot-core` ports over the Telegram Bot API: outbound
//! messages (`MessagingPort`) and chat administrator lookups (`AdminDirectory`).

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        ChatMemberKind, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
        KeyboardMarkup, ParseMode, ReplyMarkup,
    },
};

use tokio::time::sleep;
use tracing::warn;

pub mod handlers;
pub mod router;

pub use teloxide::Bot;

use tagbot_core::{
    config::Config,
    domain::{ChatId, UserId},
    errors::Error,
    formatting::split_message,
    messaging::{
        port::MessagingPort,
        types::{Markup, Reply, ReplyKeyboard},
    },
    ports::{AdminDirectory, ChatAdmin},
    Result,
};

/// Telegram client for the configured token.
pub fn connect(cfg: &Config) -> Bot {
    Bot::new(cfg.telegram_bot_token.clone())
}

fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

fn map_err(e: teloxide::RequestError) -> Error {
    Error::External(format!("telegram error: {e}"))
}

async fn with_retry<T, Fut>(mut op: impl FnMut() -> Fut) -> Result<T>
where
    Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
    Fut::IntoFuture: Send,
{
    const MAX_RETRIES: usize = 1;
    let mut attempts = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => match e {
                teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    warn!(secs = d.as_secs(), "Telegram rate limit hit, retrying");
                    sleep(d).await;
                    continue;
                }
                other => return Err(map_err(other)),
            },
        }
    }
}

fn keyboard_markup(keyboard: &ReplyKeyboard) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(KeyboardButton::new).collect())
        .collect();
    KeyboardMarkup::new(rows).resize_keyboard(true)
}

fn reply_markup(markup: &Markup) -> Result<ReplyMarkup> {
    Ok(match markup {
        Markup::Keyboard(k) => keyboard_markup(k).into(),
        Markup::Link(link) => {
            let url = reqwest::Url::parse(&link.url)
                .map_err(|e| Error::External(format!("invalid link url {}: {e}", link.url)))?;
            InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
                link.label.clone(),
                url,
            )]])
            .into()
        }
    })
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    limit: usize,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, limit: usize) -> Self {
        Self {
            bot,
            limit: limit.max(200),
        }
    }

    async fn send_chunk(
        &self,
        chat_id: ChatId,
        html: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()> {
        with_retry(|| {
            let req = self
                .bot
                .send_message(tg_chat(chat_id), html.to_string())
                .parse_mode(ParseMode::Html);
            match markup {
                Some(m) => req.reply_markup(m.clone()),
                None => req,
            }
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    /// Long replies are split; the markup rides on the last chunk.
    async fn send_reply(&self, chat_id: ChatId, reply: Reply) -> Result<()> {
        let markup = reply.markup.as_ref().map(reply_markup).transpose()?;
        let chunks = split_message(&reply.html, self.limit);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            let m = if i == last { markup.as_ref() } else { None };
            self.send_chunk(chat_id, chunk, m).await?;
        }
        Ok(())
    }
}

/// `getChatAdministrators` lookups.
#[derive(Clone)]
pub struct TelegramAdmins {
    bot: Bot,
}

impl TelegramAdmins {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl AdminDirectory for TelegramAdmins {
    async fn chat_admins(&self, chat_id: ChatId) -> Result<Vec<ChatAdmin>> {
        let members = with_retry(|| self.bot.get_chat_administrators(tg_chat(chat_id))).await?;
        Ok(members
            .into_iter()
            .map(|m| ChatAdmin {
                user_id: UserId(m.user.id.0 as i64),
                username: m.user.username.clone(),
                first_name: m.user.first_name.clone(),
                is_creator: matches!(m.kind, ChatMemberKind::Owner(_)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_rows_are_kept() {
        let kb = ReplyKeyboard::new(vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
        ]);
        let markup = keyboard_markup(&kb);
        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.keyboard[0][1].text, "b");
    }

    #[test]
    fn link_markup_rejects_bad_urls() {
        let good = Reply::text("x").with_link("open", "https://example.com/a");
        assert!(matches!(
            reply_markup(good.markup.as_ref().unwrap()),
            Ok(ReplyMarkup::InlineKeyboard(_))
        ));

        let bad = Reply::text("x").with_link("open", "not a url");
        assert!(reply_markup(bad.markup.as_ref().unwrap()).is_err());
    }
}
