//! The tag bot application service.
//!
//! `TagBot` owns the registry and the tag cooldowns behind one lock, so a
//! snapshot never observes a half-applied update. Every operation returns a
//! [`Reply`]; delivering it is up to the messenger adapter.

use std::{
    sync::{Arc, OnceLock},
    time::Instant,
};

use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    access::{authorize, Access},
    config::Config,
    cooldown::{TagCooldowns, TagTarget},
    domain::{ChatId, ChatKind},
    formatting::escape_html,
    menu::{self, Button},
    messaging::types::{Inbound, Reply, ReplyKeyboard},
    ports::{AdminDirectory, ChatAdmin},
    registry::{Registry, Upsert},
    snapshot::{self, SnapshotStore},
    Error,
};

struct BotState {
    registry: Registry,
    cooldowns: TagCooldowns,
}

pub struct TagBot {
    cfg: Arc<Config>,
    admins: Arc<dyn AdminDirectory>,
    store: SnapshotStore,
    state: Mutex<BotState>,
}

impl TagBot {
    pub fn new(cfg: Arc<Config>, admins: Arc<dyn AdminDirectory>, registry: Registry) -> Self {
        let cooldowns = TagCooldowns::new(
            cfg.tag_cooldown,
            cfg.tag_all_cooldown,
            cfg.cooldown_horizon,
        );
        Self {
            store: SnapshotStore::new(cfg.data_file.clone()),
            cfg,
            admins,
            state: Mutex::new(BotState {
                registry,
                cooldowns,
            }),
        }
    }

    /// Build the bot from the configured snapshot (empty on first run or on a
    /// malformed file).
    pub fn load(cfg: Arc<Config>, admins: Arc<dyn AdminDirectory>) -> Self {
        let registry = SnapshotStore::new(cfg.data_file.clone()).load();
        Self::new(cfg, admins, registry)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub async fn user_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    #[cfg(test)]
    pub(crate) async fn with_registry<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        let st = self.state.lock().await;
        f(&st.registry)
    }

    /// Best-effort snapshot save. The registry is encoded under the lock; the
    /// file write runs on the blocking pool after it is released.
    pub async fn save(&self) -> bool {
        let (encoded, users) = {
            let st = self.state.lock().await;
            (snapshot::encode(&st.registry), st.registry.len())
        };

        let result = match encoded {
            Ok(text) => {
                let store = self.store.clone();
                tokio::task::spawn_blocking(move || store.write(&text))
                    .await
                    .unwrap_or_else(|e| Err(Error::External(format!("snapshot write task: {e}"))))
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                info!(users, path = %self.store.path().display(), "Saved users to snapshot");
                true
            }
            Err(e) => {
                warn!(path = %self.store.path().display(), "Failed to save snapshot: {e}");
                false
            }
        }
    }

    // ============== Admin checks ==============

    /// Fetch the chat's administrators and refresh the admin cache.
    /// Failures are logged and yield `None`.
    pub async fn fetch_admins(&self, chat_id: ChatId) -> Option<Vec<ChatAdmin>> {
        match self.admins.chat_admins(chat_id).await {
            Ok(list) => {
                let mut st = self.state.lock().await;
                st.registry
                    .set_admin_ids(chat_id, list.iter().map(|a| a.user_id));
                Some(list)
            }
            Err(e) => {
                warn!(chat_id = chat_id.0, "Failed to fetch chat administrators: {e}");
                None
            }
        }
    }

    /// Fresh admin status of the sender. Private chats always count as admin;
    /// a failed lookup counts as "not admin".
    pub async fn is_admin(&self, msg: &Inbound) -> bool {
        if msg.is_private() {
            return true;
        }
        self.fetch_admins(msg.chat_id)
            .await
            .is_some_and(|list| list.iter().any(|a| a.user_id == msg.sender.user_id))
    }

    pub async fn authorize_admin(&self, msg: &Inbound) -> Access {
        let is_admin = self.is_admin(msg).await;
        authorize(msg.chat_kind, is_admin)
    }

    async fn cached_admin(&self, msg: &Inbound) -> bool {
        let st = self.state.lock().await;
        st.registry
            .is_cached_admin(msg.chat_id, msg.sender.user_id)
    }

    /// Admin status without a platform round trip: private chats count as
    /// admin, groups use the cache refreshed by [`TagBot::observe`].
    async fn known_admin(&self, msg: &Inbound) -> bool {
        msg.is_private() || self.cached_admin(msg).await
    }

    async fn main_keyboard_reply(&self, msg: &Inbound, html: String) -> Reply {
        let is_admin = self.cached_admin(msg).await;
        Reply::text(html).with_keyboard(menu::main_keyboard(msg.chat_kind, is_admin))
    }

    // ============== Registration ==============

    /// Register or refresh the sender. Group messages refresh the admin flag;
    /// private messages keep the stored one. New users trigger a save.
    pub async fn observe(&self, msg: &Inbound) -> Upsert {
        let is_admin = match msg.chat_kind {
            ChatKind::Private => None,
            ChatKind::Group => Some(self.is_admin(msg).await),
        };

        let outcome = {
            let mut st = self.state.lock().await;
            st.registry
                .upsert(msg.sender.profile(), msg.chat_id, is_admin)
        };

        if outcome == Upsert::Created {
            self.save().await;
        }
        outcome
    }

    /// Greeting and main menu. The sender is expected to be registered
    /// already through [`TagBot::observe`]; this only forces a save.
    pub async fn start(&self, msg: &Inbound) -> Reply {
        self.save().await;

        let first_name = escape_html(&msg.sender.first_name);
        let html = if msg.is_private() {
            format!(
                "👋 Hi, {first_name}!\n\n\
🤖 I tag chat members by their username.\n\n\
📌 <b>In groups only administrators can tag a specific user</b>\n\
📌 <b>Everyone can tag the whole chat</b>\n\n\
🎓 <b>Useful links (for everyone):</b>\n\
• 📅 Class schedule\n\
• 👤 Personal account\n\
• 📚 Study programs\n\n\
Use the buttons below or the commands."
            )
        } else {
            let status = if self.cached_admin(msg).await {
                "👑 You are an administrator"
            } else {
                "👤 You are a regular member"
            };
            format!(
                "👋 Hi, {first_name}!\n\n\
🤖 I am the staff helper bot. More features are on the way.\n\n\
{status}\n\
🎓 <b>Useful links:</b>\n\
• 📅 Class schedule\n\
• 👤 Personal account\n\
• 📚 Study programs"
            )
        };

        self.main_keyboard_reply(msg, html).await
    }

    pub async fn add_me(&self, msg: &Inbound) -> Reply {
        let Some(username) = msg.sender.username.as_deref().filter(|u| !u.is_empty()) else {
            return Reply::text(
                "❌ You have no Telegram username set!\n\
Set one in Telegram: Settings → Username.\n\n\
Then press \"➕ Add me\" again.",
            );
        };

        self.save().await;

        let html = format!(
            "✅ Great, {}!\n\
You are registered as @{}\n\n\
🎯 <b>You can now be tagged in this chat!</b>\n\
📌 <b>Administrators can tag you directly</b>\n\
📌 <b>Everyone can tag the whole chat</b>",
            escape_html(&msg.sender.first_name),
            escape_html(username),
        );
        self.main_keyboard_reply(msg, html).await
    }

    // ============== Tagging ==============

    /// Tag one user by username. Admin-only in groups.
    ///
    /// Unknown usernames are reported without touching the cooldowns.
    pub async fn tag_user(&self, msg: &Inbound, username: &str, note: Option<&str>) -> Reply {
        self.tag_user_at(msg, username, note, Instant::now()).await
    }

    pub async fn tag_user_at(
        &self,
        msg: &Inbound,
        username: &str,
        note: Option<&str>,
        now: Instant,
    ) -> Reply {
        if !self.authorize_admin(msg).await.is_allowed() {
            return denied();
        }

        let wanted = username.trim().trim_start_matches('@');
        if wanted.is_empty() {
            return tag_usage();
        }

        let mut st = self.state.lock().await;
        let BotState {
            registry,
            cooldowns,
        } = &mut *st;

        let Some((target_id, record)) = registry.find_by_username(wanted) else {
            return Reply::text(format!(
                "❌ User @{} not found.\nThey need to send at least one message where the bot can see it.",
                escape_html(wanted)
            ));
        };

        if !cooldowns.allow_at(
            msg.chat_id,
            msg.sender.user_id,
            TagTarget::User(target_id),
            now,
        ) {
            info!(
                chat_id = msg.chat_id.0,
                actor = msg.sender.user_id.0,
                target = target_id.0,
                "Tag blocked by cooldown"
            );
            return Reply::text(
                "⏳ You tagged this user recently.\nPlease wait a little before tagging again.",
            );
        }

        let name = escape_html(record.username.as_deref().unwrap_or(wanted));
        match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => Reply::text(format!("🔔 @{name} {}", escape_html(n))),
            None => Reply::text(format!("🔔 @{name}")),
        }
    }

    /// Tag every taggable member of the chat. Open to everyone.
    pub async fn tag_all(&self, msg: &Inbound) -> Reply {
        self.tag_all_at(msg, Instant::now()).await
    }

    pub async fn tag_all_at(&self, msg: &Inbound, now: Instant) -> Reply {
        let mut st = self.state.lock().await;
        let BotState {
            registry,
            cooldowns,
        } = &mut *st;

        let mentions: Vec<String> = registry
            .list_members(msg.chat_id)
            .into_iter()
            .filter_map(|(_, u)| u.username.as_deref().map(|n| format!("@{}", escape_html(n))))
            .collect();

        if mentions.is_empty() {
            return Reply::text("📭 Nobody to tag in this chat yet.");
        }

        if !cooldowns.allow_at(msg.chat_id, msg.sender.user_id, TagTarget::All, now) {
            info!(
                chat_id = msg.chat_id.0,
                actor = msg.sender.user_id.0,
                "Tag-all blocked by cooldown"
            );
            return Reply::text(
                "⏳ /tagall was used recently.\nPlease wait a minute before using it again.",
            );
        }

        Reply::text(format!(
            "🔔 {} tagged everyone:\n{}",
            escape_html(&msg.sender.mention()),
            mentions.join(" ")
        ))
    }

    pub async fn tag_prompt(&self, msg: &Inbound) -> Reply {
        if !self.authorize_admin(msg).await.is_allowed() {
            return denied();
        }

        let keyboard = self.tag_keyboard(msg.chat_id).await;
        let reply = Reply::text(
            "Send the username to tag (with or without @):\n\
Example: <code>@username</code> or <code>username</code>\n\n\
<b>Only administrators can tag a specific user</b>",
        );
        match keyboard {
            Some(k) => reply.with_keyboard(k),
            None => reply,
        }
    }

    async fn tag_keyboard(&self, chat_id: ChatId) -> Option<ReplyKeyboard> {
        let st = self.state.lock().await;
        let members = st.registry.list_members(chat_id);
        menu::tag_keyboard(
            members.iter().filter_map(|(_, u)| u.username.as_deref()),
            self.cfg.tag_keyboard_size,
        )
    }

    // ============== Listing ==============

    pub async fn list_members(&self, msg: &Inbound) -> Reply {
        let body = {
            let st = self.state.lock().await;
            let members = st.registry.list_members(msg.chat_id);
            if members.is_empty() {
                None
            } else {
                let mut out = String::from("📋 <b>Users in this chat:</b>\n\n");
                for (i, (_, u)) in members.iter().enumerate() {
                    let crown = if u.is_admin { " 👑" } else { "" };
                    out.push_str(&format!(
                        "{}. @{} - {}{crown}\n",
                        i + 1,
                        escape_html(u.username.as_deref().unwrap_or_default()),
                        escape_html(&u.full_name()),
                    ));
                }
                out.push_str(&format!("\nTotal: {} users", members.len()));
                Some(out)
            }
        };

        let Some(body) = body else {
            return Reply::text(
                "📭 No registered users in this chat yet.\n\
Press \"➕ Add me\" or just send any message.",
            );
        };

        let reply = Reply::text(body);
        if !self.known_admin(msg).await {
            return reply;
        }
        match self.tag_keyboard(msg.chat_id).await {
            Some(k) => reply.with_keyboard(k),
            None => reply,
        }
    }

    pub async fn show_admins(&self, msg: &Inbound) -> Reply {
        if !self.authorize_admin(msg).await.is_allowed() {
            return denied();
        }

        let Some(list) = self.fetch_admins(msg.chat_id).await else {
            return Reply::text("Could not fetch the list of administrators.");
        };
        if list.is_empty() {
            return Reply::text("This chat has no administrators.");
        }

        let mut out = String::from("👑 <b>Chat administrators:</b>\n\n");
        for (i, admin) in list.iter().enumerate() {
            let (icon, status) = if admin.is_creator {
                ("👑", "Owner")
            } else {
                ("⚡", "Admin")
            };
            let first = escape_html(&admin.first_name);
            match admin.username.as_deref().filter(|u| !u.is_empty()) {
                Some(u) => out.push_str(&format!(
                    "{}. {icon} @{} - {first} ({status})\n",
                    i + 1,
                    escape_html(u)
                )),
                None => out.push_str(&format!("{}. {icon} {first} ({status})\n", i + 1)),
            }
        }
        Reply::text(out)
    }

    pub async fn stats(&self, msg: &Inbound) -> Reply {
        if !self.authorize_admin(msg).await.is_allowed() {
            return denied();
        }

        let st = {
            let guard = self.state.lock().await;
            guard.registry.stats(msg.chat_id)
        };
        let file = escape_html(&self.store.path().display().to_string());

        Reply::text(format!(
            "📊 <b>Bot statistics:</b>\n\n\
👥 Total users: {}\n\
📝 With username: {}\n\
💬 Known chats: {}\n\n\
<b>This chat:</b>\n\
Users: {}\n\
Administrators: {}\n\
Regular members: {}\n\n\
💾 <b>Data file:</b> <code>{file}</code>",
            st.total_users,
            st.users_with_username,
            st.total_chats,
            st.chat_members,
            st.chat_admins,
            st.chat_members.saturating_sub(st.chat_admins),
        ))
    }

    // ============== Menus ==============

    pub async fn help(&self, msg: &Inbound) -> Reply {
        let html = if self.known_admin(msg).await {
            "📚 <b>Bot help</b>\n\n\
<b>Administrator commands:</b>\n\
<code>/tag @username</code> - Tag a specific user\n\
<code>/admins</code> - List administrators\n\
<code>/stats</code> - Bot statistics\n\n\
<b>Commands for everyone:</b>\n\
<code>/tagall</code> - Tag everyone in the chat\n\
<code>/start</code> - Get started\n\
<code>/addme</code> - Add yourself\n\
<code>/list</code> - List users\n\n\
<b>Useful links (buttons):</b>\n\
📅 Schedule - class schedule\n\
👤 Personal account - student sign-in\n\
📚 Study programs - course programs\n\n\
<b>How it works:</b>\n\
1. The bot registers everyone who writes in the chat\n\
2. Tagging needs a Telegram @username"
        } else {
            "📚 <b>Bot help</b>\n\n\
<b>Commands:</b>\n\
<code>/tagall</code> - Tag everyone in the chat\n\
<code>/start</code> - Get started\n\
<code>/addme</code> - Add yourself\n\
<code>/list</code> - List users in this chat\n\n\
<b>Useful links (buttons):</b>\n\
📅 Schedule - class schedule\n\
👤 Personal account - student sign-in\n\
📚 Study programs - course programs\n\n\
<b>How it works:</b>\n\
1. Send any message in the chat and the bot adds you\n\
2. Set a @username in Telegram settings"
        };
        self.main_keyboard_reply(msg, html.to_string()).await
    }

    pub async fn main_menu(&self, msg: &Inbound) -> Reply {
        self.main_keyboard_reply(msg, "Main menu:".to_string()).await
    }

    pub async fn admin_panel(&self, msg: &Inbound) -> Reply {
        if !self.authorize_admin(msg).await.is_allowed() {
            return denied();
        }
        Reply::text(
            "👑 <b>Admin panel</b>\n\n\
Available actions:\n\
• Tag a specific user\n\
• View statistics\n\
• List administrators\n\
• Useful links for students\n\n\
Choose an action:",
        )
        .with_keyboard(menu::admin_keyboard())
    }

    pub async fn settings(&self, msg: &Inbound) -> Reply {
        if !self.authorize_admin(msg).await.is_allowed() {
            return denied();
        }
        Reply::text(
            "⚙️ <b>Settings</b>\n\n\
Bot settings will arrive in a future update.\n\
For now you can:\n\
• Use /tag to tag a user (administrators)\n\
• Use /tagall to tag everyone (all users)\n\
• View statistics\n\
• Open useful links for students\n\
• Data is saved automatically",
        )
    }

    /// Static link replies for the three resource buttons.
    pub fn link(&self, button: Button) -> Option<Reply> {
        let links = &self.cfg.links;
        let reply = match button {
            Button::Schedule => Reply::text("📅 <b>Class schedule</b>\n\nOfficial schedule:")
                .with_link("📅 Open schedule", links.schedule.clone()),
            Button::PersonalAccount => {
                Reply::text("👤 <b>Personal account</b>\n\nSign-in link:")
                    .with_link("👤 Open personal account", links.personal_account.clone())
            }
            Button::EducationPrograms => {
                Reply::text("📚 <b>Study programs</b>\n\nCourse programs:")
                    .with_link("📚 Open study programs", links.education_programs.clone())
            }
            _ => return None,
        };
        Some(reply)
    }

    pub async fn private_hint(&self, msg: &Inbound) -> Reply {
        self.main_keyboard_reply(
            msg,
            "Use the buttons below or send:\n\
/tag @username - tag a user (administrators only)\n\
/tagall - tag everyone"
                .to_string(),
        )
        .await
    }

    /// Log `@mentions` a user typed by hand. Nothing is sent back.
    pub fn note_mentions(&self, msg: &Inbound) -> Vec<String> {
        let found = manual_mentions(&msg.text);
        for name in &found {
            debug!(
                chat_id = msg.chat_id.0,
                actor = ?msg.sender.username,
                mentioned = %name,
                "Manual mention"
            );
        }
        found
    }
}

fn denied() -> Reply {
    Reply::text(
        "❌ You do not have enough rights!\nOnly chat administrators can do this.",
    )
}

fn tag_usage() -> Reply {
    Reply::text(
        "❌ Give a username!\n\
Example: <code>/tag username</code>\n\
Or: <code>/tag @username message</code>",
    )
}

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)@([A-Za-z0-9_]{1,32})").expect("valid mention regex"))
}

pub fn manual_mentions(text: &str) -> Vec<String> {
    mention_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Split `/tag` arguments into a username and an optional free-form note.
pub fn parse_tag_args(args: &str) -> Option<(String, Option<String>)> {
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let username = parts.next()?.trim_start_matches('@').to_string();
    if username.is_empty() {
        return None;
    }
    let note = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some((username, note))
}
