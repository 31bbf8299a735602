use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{ChatId, Timestamp, UserId};

/// Profile and activity metadata for one user.
///
/// `is_admin` caches the admin status in `chat_id` as of the last message and
/// may be stale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub chat_id: ChatId,
    #[serde(default)]
    pub joined_date: Timestamp,
    #[serde(default)]
    pub last_active: Timestamp,
    #[serde(default)]
    pub is_admin: bool,
}

impl UserRecord {
    pub fn has_username(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().filter(|s| !s.is_empty()) {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }

    fn sort_key(&self) -> String {
        self.username.as_deref().unwrap_or_default().to_lowercase()
    }
}

/// Identity fields observed on an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_users: usize,
    pub users_with_username: usize,
    pub total_chats: usize,
    pub chat_members: usize,
    pub chat_admins: usize,
}

/// In-memory user registry: user records, single-chat membership lists and
/// the per-chat admin cache.
///
/// Invariants:
/// - every id in a membership list has a record
/// - a user appears in exactly one membership list (the record's `chat_id`)
/// - membership lists keep insertion order and hold no duplicates
#[derive(Clone, Debug, Default)]
pub struct Registry {
    users: BTreeMap<UserId, UserRecord>,
    chats: BTreeMap<ChatId, Vec<UserId>>,
    admins: HashMap<ChatId, BTreeSet<UserId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted tables, repairing membership lists so
    /// the invariants hold again.
    pub fn from_parts(
        users: BTreeMap<UserId, UserRecord>,
        chats: BTreeMap<ChatId, Vec<UserId>>,
    ) -> Self {
        let mut out = Self {
            users,
            chats: BTreeMap::new(),
            admins: HashMap::new(),
        };

        let mut dropped = 0usize;
        for (chat_id, members) in chats {
            let list = out.chats.entry(chat_id).or_default();
            for user_id in members {
                let belongs = out
                    .users
                    .get(&user_id)
                    .is_some_and(|u| u.chat_id == chat_id);
                if belongs && !list.contains(&user_id) {
                    list.push(user_id);
                } else {
                    dropped += 1;
                }
            }
        }

        let orphans: Vec<(UserId, ChatId)> = out
            .users
            .iter()
            .filter(|(id, u)| {
                !out.chats
                    .get(&u.chat_id)
                    .is_some_and(|list| list.contains(id))
            })
            .map(|(id, u)| (*id, u.chat_id))
            .collect();
        for (user_id, chat_id) in orphans {
            out.chats.entry(chat_id).or_default().push(user_id);
        }

        if dropped > 0 {
            warn!(dropped, "Dropped stale or duplicate membership entries from snapshot");
        }
        out
    }

    pub fn users(&self) -> &BTreeMap<UserId, UserRecord> {
        &self.users
    }

    pub fn chats(&self) -> &BTreeMap<ChatId, Vec<UserId>> {
        &self.chats
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn get(&self, user_id: UserId) -> Option<&UserRecord> {
        self.users.get(&user_id)
    }

    /// Members of `chat_id` in insertion order, including users without a username.
    pub fn member_ids(&self, chat_id: ChatId) -> &[UserId] {
        self.chats.get(&chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn upsert(
        &mut self,
        profile: Profile,
        chat_id: ChatId,
        is_admin: Option<bool>,
    ) -> Upsert {
        self.upsert_at(profile, chat_id, is_admin, Timestamp::now())
    }

    /// Create or refresh a record. `is_admin: None` leaves the stored flag as is.
    ///
    /// A user that shows up in a different chat is moved there: removed from the
    /// previous chat's list and appended to the new one.
    pub fn upsert_at(
        &mut self,
        profile: Profile,
        chat_id: ChatId,
        is_admin: Option<bool>,
        now: Timestamp,
    ) -> Upsert {
        let Profile {
            user_id,
            username,
            first_name,
            last_name,
        } = profile;

        let outcome = match self.users.get_mut(&user_id) {
            None => {
                info!(user_id = user_id.0, username = ?username, "New user registered");
                self.users.insert(
                    user_id,
                    UserRecord {
                        username,
                        first_name,
                        last_name,
                        chat_id,
                        joined_date: now.clone(),
                        last_active: now,
                        is_admin: is_admin.unwrap_or(false),
                    },
                );
                Upsert::Created
            }
            Some(record) => {
                record.last_active = now;
                if record.username != username {
                    info!(
                        user_id = user_id.0,
                        old = ?record.username,
                        new = ?username,
                        "Username changed"
                    );
                    record.username = username;
                }
                record.first_name = first_name;
                record.last_name = last_name;
                if let Some(flag) = is_admin {
                    record.is_admin = flag;
                }

                let old_chat = record.chat_id;
                if old_chat != chat_id {
                    record.chat_id = chat_id;
                    self.remove_member(old_chat, user_id);
                    info!(
                        user_id = user_id.0,
                        from = old_chat.0,
                        to = chat_id.0,
                        "User moved to another chat"
                    );
                }
                Upsert::Updated
            }
        };

        let list = self.chats.entry(chat_id).or_default();
        if !list.contains(&user_id) {
            list.push(user_id);
        }
        outcome
    }

    fn remove_member(&mut self, chat_id: ChatId, user_id: UserId) {
        if let Some(list) = self.chats.get_mut(&chat_id) {
            list.retain(|id| *id != user_id);
        }
    }

    /// Taggable members of a chat (non-empty username), sorted by
    /// case-insensitive username.
    pub fn list_members(&self, chat_id: ChatId) -> Vec<(UserId, &UserRecord)> {
        let mut out: Vec<(UserId, &UserRecord)> = self
            .member_ids(chat_id)
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| (*id, u)))
            .filter(|(_, u)| u.has_username())
            .collect();
        out.sort_by_cached_key(|(_, u)| u.sort_key());
        out
    }

    /// Case-insensitive exact match; the lowest user id wins on duplicates.
    pub fn find_by_username(&self, username: &str) -> Option<(UserId, &UserRecord)> {
        let wanted = username.trim().trim_start_matches('@').to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.users
            .iter()
            .find(|(_, u)| {
                u.username
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase() == wanted)
            })
            .map(|(id, u)| (*id, u))
    }

    /// Cached admin ids for a chat; empty if never populated.
    pub fn admin_ids(&self, chat_id: ChatId) -> BTreeSet<UserId> {
        self.admins.get(&chat_id).cloned().unwrap_or_default()
    }

    pub fn is_cached_admin(&self, chat_id: ChatId, user_id: UserId) -> bool {
        self.admins
            .get(&chat_id)
            .is_some_and(|set| set.contains(&user_id))
    }

    /// Replace the cached admin set for a chat.
    pub fn set_admin_ids(&mut self, chat_id: ChatId, ids: impl IntoIterator<Item = UserId>) {
        self.admins.insert(chat_id, ids.into_iter().collect());
    }

    pub fn stats(&self, chat_id: ChatId) -> RegistryStats {
        let members = self.member_ids(chat_id);
        RegistryStats {
            total_users: self.users.len(),
            users_with_username: self.users.values().filter(|u| u.has_username()).count(),
            total_chats: self.chats.len(),
            chat_members: members.len(),
            chat_admins: members
                .iter()
                .filter(|id| self.users.get(id).is_some_and(|u| u.is_admin))
                .count(),
        }
    }
}
