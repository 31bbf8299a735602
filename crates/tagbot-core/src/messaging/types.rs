use crate::{
    domain::{ChatId, ChatKind, UserId},
    registry::Profile,
};

/// Sender of an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Sender {
    pub fn profile(&self) -> Profile {
        Profile {
            user_id: self.user_id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    /// `@username` if set, otherwise the first name.
    pub fn mention(&self) -> String {
        match self.username.as_deref().filter(|u| !u.is_empty()) {
            Some(u) => format!("@{u}"),
            None => self.first_name.clone(),
        }
    }
}

/// Messenger-agnostic inbound message.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub sender: Sender,
    pub text: String,
}

impl Inbound {
    pub fn is_private(&self) -> bool {
        self.chat_kind == ChatKind::Private
    }
}

/// Persistent reply keyboard (quick-reply labels).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
}

impl ReplyKeyboard {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }
}

/// Inline button opening an external URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Markup {
    Keyboard(ReplyKeyboard),
    Link(LinkButton),
}

/// Outbound reply: HTML text plus optional markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub html: String,
    pub markup: Option<Markup>,
}

impl Reply {
    pub fn text(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            markup: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.markup = Some(Markup::Keyboard(keyboard));
        self
    }

    pub fn with_link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.markup = Some(Markup::Link(LinkButton {
            label: label.into(),
            url: url.into(),
        }));
        self
    }

    pub fn keyboard(&self) -> Option<&ReplyKeyboard> {
        match &self.markup {
            Some(Markup::Keyboard(k)) => Some(k),
            _ => None,
        }
    }
}
