use tagbot_core::{
    menu::Button,
    messaging::types::{Inbound, Reply},
};

use crate::router::AppState;

/// `@username` pressed on the tag keyboard: a single token with the prefix.
fn quick_reply_username(text: &str) -> Option<&str> {
    let name = text.trim().strip_prefix('@')?;
    (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
}

pub async fn handle_text(state: &AppState, msg: &Inbound) -> Option<Reply> {
    let bot = &state.bot;

    if let Some(button) = Button::from_label(&msg.text) {
        let reply = match button {
            Button::ListUsers => bot.list_members(msg).await,
            Button::TagAll => bot.tag_all(msg).await,
            Button::AddMe => bot.add_me(msg).await,
            Button::Help => bot.help(msg).await,
            Button::Schedule | Button::PersonalAccount | Button::EducationPrograms => {
                bot.link(button)?
            }
            Button::AdminPanel => bot.admin_panel(msg).await,
            Button::TagUser => bot.tag_prompt(msg).await,
            Button::Stats => bot.stats(msg).await,
            Button::AdminList => bot.show_admins(msg).await,
            Button::Settings => bot.settings(msg).await,
            Button::BackToMenu | Button::Back => bot.main_menu(msg).await,
        };
        return Some(reply);
    }

    if let Some(username) = quick_reply_username(&msg.text) {
        return Some(bot.tag_user(msg, username, None).await);
    }

    bot.note_mentions(msg);
    if msg.is_private() {
        return Some(bot.private_hint(msg).await);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_reply_is_a_single_token() {
        assert_eq!(quick_reply_username("@bob"), Some("bob"));
        assert_eq!(quick_reply_username(" @bob "), Some("bob"));
        assert_eq!(quick_reply_username("@bob hi"), None);
        assert_eq!(quick_reply_username("@"), None);
        assert_eq!(quick_reply_username("bob"), None);
    }
}
