//! Reply-keyboard menus and the buttons they carry.

use crate::{domain::ChatKind, messaging::types::ReplyKeyboard};

const TAG_KEYBOARD_COLUMNS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    ListUsers,
    TagAll,
    AddMe,
    Help,
    Schedule,
    PersonalAccount,
    EducationPrograms,
    AdminPanel,
    TagUser,
    Stats,
    AdminList,
    Settings,
    BackToMenu,
    Back,
}

impl Button {
    pub const ALL: [Button; 14] = [
        Button::ListUsers,
        Button::TagAll,
        Button::AddMe,
        Button::Help,
        Button::Schedule,
        Button::PersonalAccount,
        Button::EducationPrograms,
        Button::AdminPanel,
        Button::TagUser,
        Button::Stats,
        Button::AdminList,
        Button::Settings,
        Button::BackToMenu,
        Button::Back,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Button::ListUsers => "📋 User list",
            Button::TagAll => "🔔 Tag everyone",
            Button::AddMe => "➕ Add me",
            Button::Help => "❓ Help",
            Button::Schedule => "📅 Schedule",
            Button::PersonalAccount => "👤 Personal account",
            Button::EducationPrograms => "📚 Study programs",
            Button::AdminPanel => "👑 Admin panel",
            Button::TagUser => "🔨 Tag user",
            Button::Stats => "📊 Statistics",
            Button::AdminList => "👥 Admin list",
            Button::Settings => "⚙️ Settings",
            Button::BackToMenu => "◀️ Back to menu",
            Button::Back => "◀️ Back",
        }
    }

    pub fn from_label(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|b| b.label() == text)
    }
}

fn rows(buttons: &[&[Button]]) -> ReplyKeyboard {
    ReplyKeyboard::new(
        buttons
            .iter()
            .map(|row| row.iter().map(|b| b.label().to_string()).collect())
            .collect(),
    )
}

/// Main menu. Group admins get the admin panel entry instead of "Add me".
pub fn main_keyboard(kind: ChatKind, is_admin: bool) -> ReplyKeyboard {
    use Button::*;
    match (kind, is_admin) {
        (ChatKind::Private, _) => rows(&[
            &[ListUsers, TagAll],
            &[AddMe, Schedule],
            &[PersonalAccount, EducationPrograms],
            &[Help],
        ]),
        (ChatKind::Group, true) => rows(&[
            &[ListUsers, TagAll],
            &[AdminPanel, Schedule],
            &[PersonalAccount, EducationPrograms],
            &[Help],
        ]),
        (ChatKind::Group, false) => rows(&[
            &[AddMe, ListUsers],
            &[TagAll, Schedule],
            &[PersonalAccount, EducationPrograms],
            &[Help],
        ]),
    }
}

pub fn admin_keyboard() -> ReplyKeyboard {
    use Button::*;
    rows(&[
        &[TagUser, Stats],
        &[AdminList, Settings],
        &[Schedule, PersonalAccount],
        &[EducationPrograms, BackToMenu],
    ])
}

/// Quick-reply `@username` buttons for the last `max` usernames (in the given
/// order), three per row, followed by "Back". `None` when there is nobody.
pub fn tag_keyboard<'a>(
    usernames: impl IntoIterator<Item = &'a str>,
    max: usize,
) -> Option<ReplyKeyboard> {
    let names: Vec<&str> = usernames.into_iter().filter(|u| !u.is_empty()).collect();
    if names.is_empty() {
        return None;
    }

    let recent = &names[names.len().saturating_sub(max)..];
    let mut keyboard: Vec<Vec<String>> = recent
        .chunks(TAG_KEYBOARD_COLUMNS)
        .map(|row| row.iter().map(|u| format!("@{u}")).collect())
        .collect();
    keyboard.push(vec![Button::Back.label().to_string()]);
    Some(ReplyKeyboard::new(keyboard))
}
