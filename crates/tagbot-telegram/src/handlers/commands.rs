use tagbot_core::{
    bot::parse_tag_args,
    messaging::types::{Inbound, Reply},
};

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(state: &AppState, msg: &Inbound) -> Option<Reply> {
    let (cmd, arg) = parse_command(&msg.text);
    let bot = &state.bot;

    let reply = match cmd.as_str() {
        "start" => bot.start(msg).await,
        "help" => bot.help(msg).await,
        "addme" => bot.add_me(msg).await,
        "list" => bot.list_members(msg).await,
        "tagall" => bot.tag_all(msg).await,
        "tag" => {
            let (username, note) = parse_tag_args(&arg).unwrap_or_default();
            bot.tag_user(msg, &username, note.as_deref()).await
        }
        "stats" => bot.stats(msg).await,
        "admins" => bot.show_admins(msg).await,

        // Group chats are full of commands meant for other bots.
        _ if msg.is_private() => {
            Reply::text("Unknown command. Send /help for the list of commands.")
        }
        _ => return None,
    };
    Some(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix() {
        assert_eq!(
            parse_command("/Tag@tagbot @bob see you"),
            ("tag".to_string(), "@bob see you".to_string())
        );
        assert_eq!(parse_command("/tagall"), ("tagall".to_string(), String::new()));
    }
}
