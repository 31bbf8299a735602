use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::{ChatId, UserId};

/// What a tag is aimed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagTarget {
    User(UserId),
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct TagKey {
    actor: UserId,
    target: TagTarget,
}

/// Per-chat cooldowns for repeated tags.
///
/// An actor may not repeat the same tag within its window. Only successful
/// attempts reset the timer. Entries older than `horizon` are dropped lazily,
/// on the next successful check in the same chat.
#[derive(Clone, Debug)]
pub struct TagCooldowns {
    user_window: Duration,
    all_window: Duration,
    horizon: Duration,
    chats: HashMap<ChatId, HashMap<TagKey, Instant>>,
}

impl TagCooldowns {
    pub fn new(user_window: Duration, all_window: Duration, horizon: Duration) -> Self {
        Self {
            user_window,
            all_window,
            horizon,
            chats: HashMap::new(),
        }
    }

    pub fn window(&self, target: TagTarget) -> Duration {
        match target {
            TagTarget::User(_) => self.user_window,
            TagTarget::All => self.all_window,
        }
    }

    pub fn allow(&mut self, chat_id: ChatId, actor: UserId, target: TagTarget) -> bool {
        self.allow_at(chat_id, actor, target, Instant::now())
    }

    pub fn allow_at(
        &mut self,
        chat_id: ChatId,
        actor: UserId,
        target: TagTarget,
        now: Instant,
    ) -> bool {
        let window = self.window(target);
        let horizon = self.horizon;
        let table = self.chats.entry(chat_id).or_default();
        let key = TagKey { actor, target };

        if let Some(last) = table.get(&key) {
            if now.saturating_duration_since(*last) < window {
                return false;
            }
        }

        table.insert(key, now);
        table.retain(|_, at| now.saturating_duration_since(*at) <= horizon);
        true
    }

    /// Number of live entries for a chat (stale ones included until purged).
    #[cfg(test)]
    pub(crate) fn tracked(&self, chat_id: ChatId) -> usize {
        self.chats.get(&chat_id).map(HashMap::len).unwrap_or(0)
    }
}

impl Default for TagCooldowns {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(60),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAT: ChatId = ChatId(7);
    const ADMIN: UserId = UserId(200);
    const BOB: TagTarget = TagTarget::User(UserId(100));

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn blocks_within_window_then_allows() {
        let t0 = Instant::now();
        let mut cd = TagCooldowns::default();

        assert!(cd.allow_at(CHAT, ADMIN, BOB, t0));
        assert!(!cd.allow_at(CHAT, ADMIN, BOB, t0 + secs(1)));
        assert!(cd.allow_at(CHAT, ADMIN, BOB, t0 + secs(31)));
    }

    #[test]
    fn blocked_attempts_do_not_refresh_the_timer() {
        let t0 = Instant::now();
        let mut cd = TagCooldowns::default();

        assert!(cd.allow_at(CHAT, ADMIN, BOB, t0));
        assert!(!cd.allow_at(CHAT, ADMIN, BOB, t0 + secs(10)));
        assert!(!cd.allow_at(CHAT, ADMIN, BOB, t0 + secs(29)));
        // 30s after the first (successful) tag, not after the last blocked one.
        assert!(cd.allow_at(CHAT, ADMIN, BOB, t0 + secs(30)));
    }

    #[test]
    fn tag_all_uses_longer_window() {
        let t0 = Instant::now();
        let mut cd = TagCooldowns::default();

        assert!(cd.allow_at(CHAT, ADMIN, TagTarget::All, t0));
        assert!(!cd.allow_at(CHAT, ADMIN, TagTarget::All, t0 + secs(45)));
        assert!(cd.allow_at(CHAT, ADMIN, TagTarget::All, t0 + secs(60)));
    }

    #[test]
    fn keys_are_independent() {
        let t0 = Instant::now();
        let mut cd = TagCooldowns::default();

        assert!(cd.allow_at(CHAT, ADMIN, BOB, t0));
        assert!(cd.allow_at(CHAT, ADMIN, TagTarget::User(UserId(101)), t0));
        assert!(cd.allow_at(CHAT, UserId(201), BOB, t0));
        assert!(cd.allow_at(ChatId(8), ADMIN, BOB, t0));
        assert!(cd.allow_at(CHAT, ADMIN, TagTarget::All, t0));
    }

    #[test]
    fn stale_entries_purged_only_in_checked_chat() {
        let t0 = Instant::now();
        let mut cd = TagCooldowns::default();

        assert!(cd.allow_at(CHAT, ADMIN, BOB, t0));
        assert!(cd.allow_at(ChatId(8), ADMIN, BOB, t0));
        assert_eq!(cd.tracked(CHAT), 1);

        assert!(cd.allow_at(CHAT, UserId(5), TagTarget::All, t0 + secs(61)));
        assert_eq!(cd.tracked(CHAT), 1);
        assert_eq!(cd.tracked(ChatId(8)), 1);
    }

    #[test]
    fn entries_at_the_horizon_are_kept() {
        let t0 = Instant::now();
        let mut cd = TagCooldowns::default();

        assert!(cd.allow_at(CHAT, ADMIN, BOB, t0));
        assert!(cd.allow_at(CHAT, UserId(5), BOB, t0 + secs(60)));
        assert_eq!(cd.tracked(CHAT), 2);
    }
}
