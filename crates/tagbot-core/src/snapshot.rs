//! JSON snapshot of the user registry.
//!
//! Layout (field names kept stable for existing data files):
//!
//! ```json
//! {
//!   "users_storage": { "<user id>": { "username": ..., "joined_date": "...", ... } },
//!   "chat_users": { "<chat id>": [<user id>, ...] }
//! }
//! ```
//!
//! The admin cache and tag cooldowns are not persisted.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    domain::{ChatId, UserId},
    registry::{Registry, UserRecord},
    Result,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    users_storage: BTreeMap<UserId, UserRecord>,
    #[serde(default)]
    chat_users: BTreeMap<ChatId, Vec<UserId>>,
}

impl Snapshot {
    fn capture(registry: &Registry) -> Self {
        Self {
            users_storage: registry.users().clone(),
            chat_users: registry.chats().clone(),
        }
    }
}

/// Render the registry as snapshot text.
pub fn encode(registry: &Registry) -> Result<String> {
    Ok(serde_json::to_string_pretty(&Snapshot::capture(registry))?)
}

/// Parse snapshot text. Timestamp fields that do not parse stay raw; anything
/// structurally wrong (bad ids, wrong shapes) fails the whole decode.
pub fn decode(text: &str) -> Result<Registry> {
    if text.trim().is_empty() {
        return Ok(Registry::new());
    }
    let snap: Snapshot = serde_json::from_str(text)?;
    Ok(Registry::from_parts(snap.users_storage, snap.chat_users))
}

/// Snapshot file on disk.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot via a sibling temp file + rename.
    pub fn write(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, text)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// `Ok(None)` when no snapshot exists yet.
    pub fn load_strict(&self) -> Result<Option<Registry>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        decode(&text).map(Some)
    }

    /// Load the registry, falling back to an empty one.
    ///
    /// A malformed snapshot is logged and replaced by an empty registry: the
    /// bot starts, and the old file is overwritten by the next save.
    pub fn load(&self) -> Registry {
        match self.load_strict() {
            Ok(Some(registry)) => {
                info!(users = registry.len(), path = %self.path.display(), "Loaded users from snapshot");
                registry
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No snapshot found, starting empty");
                Registry::new()
            }
            Err(e) => {
                error!(path = %self.path.display(), "Failed to load snapshot: {e}");
                warn!("Starting with an empty registry; the snapshot will be overwritten on next save");
                Registry::new()
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::Timestamp,
        registry::{Profile, Registry},
    };
    use chrono::{TimeZone, Utc};

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    fn profile(id: i64, username: Option<&str>, first: &str, last: Option<&str>) -> Profile {
        Profile {
            user_id: UserId(id),
            username: username.map(str::to_string),
            first_name: first.to_string(),
            last_name: last.map(str::to_string),
        }
    }

    #[test]
    fn round_trip_keeps_names_and_instants() {
        let joined = Timestamp::At(Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap());
        let mut reg = Registry::new();
        reg.upsert_at(
            profile(100, Some("Пётр_2"), "Пётр", Some("Иванов")),
            ChatId(-1001),
            Some(true),
            joined.clone(),
        );
        reg.upsert_at(
            profile(101, None, "名前", None),
            ChatId(-1001),
            None,
            joined.clone(),
        );

        let store = SnapshotStore::new(tmp("tagbot-snap"));
        store.write(&encode(&reg).unwrap()).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("Пётр_2"), "non-ASCII must not be escaped");

        let back = store.load_strict().unwrap().unwrap();
        assert_eq!(back.users(), reg.users());
        assert_eq!(back.chats(), reg.chats());
        assert_eq!(back.get(UserId(100)).unwrap().joined_date, joined);

        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = SnapshotStore::new(tmp("tagbot-missing"));
        assert!(store.load_strict().unwrap().is_none());
        assert!(store.load().is_empty());
    }

    // Corrupt snapshots are dropped silently (logged only). This is a known
    // data-loss path: the next save overwrites the broken file.
    #[test]
    fn corrupt_file_loads_empty() {
        let store = SnapshotStore::new(tmp("tagbot-corrupt"));
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load_strict().is_err());
        assert!(store.load().is_empty());
        let _ = fs::remove_file(store.path());
    }

    #[test]
    fn non_numeric_keys_fail_the_decode() {
        let text = r#"{"users_storage": {"abc": {"chat_id": 1, "joined_date": "x", "last_active": "y"}}, "chat_users": {}}"#;
        assert!(decode(text).is_err());
    }

    #[test]
    fn decodes_legacy_snapshot_with_naive_and_broken_dates() {
        let text = r#"{
          "users_storage": {
            "100": {
              "username": "bob",
              "first_name": "Bob",
              "last_name": null,
              "chat_id": -500,
              "joined_date": "2025-09-01T10:15:30.123456",
              "last_active": "not a date",
              "is_admin": false
            }
          },
          "chat_users": { "-500": [100, 100, 999] }
        }"#;

        let reg = decode(text).unwrap();
        let bob = reg.get(UserId(100)).unwrap();
        assert!(bob.joined_date.instant().is_some());
        assert_eq!(bob.last_active, Timestamp::Raw("not a date".to_string()));
        assert_eq!(reg.member_ids(ChatId(-500)), &[UserId(100)]);

        // Raw values survive a re-encode untouched.
        let again = encode(&reg).unwrap();
        assert!(again.contains("\"not a date\""));
    }

    #[test]
    fn bad_timestamps_do_not_drop_other_records() {
        let text = r#"{
          "users_storage": {
            "1": {"username": "amy", "first_name": "Amy", "chat_id": -500,
                  "joined_date": null, "last_active": "2025-09-01T10:00:00+00:00"},
            "2": {"username": "zed", "first_name": "Zed", "chat_id": -500,
                  "joined_date": 1700000000},
            "3": {"username": "bob", "first_name": "Bob", "chat_id": -500,
                  "joined_date": "2025-09-01T10:00:00+00:00",
                  "last_active": "2025-09-02T10:00:00+00:00"}
          },
          "chat_users": { "-500": [1, 2, 3] }
        }"#;

        let reg = decode(text).unwrap();
        assert_eq!(reg.len(), 3);

        let amy = reg.get(UserId(1)).unwrap();
        assert_eq!(amy.joined_date, Timestamp::Raw("null".to_string()));
        assert!(amy.last_active.instant().is_some());

        let zed = reg.get(UserId(2)).unwrap();
        assert_eq!(zed.joined_date, Timestamp::Raw("1700000000".to_string()));
        assert_eq!(zed.last_active, Timestamp::default());

        assert!(reg.get(UserId(3)).unwrap().joined_date.instant().is_some());
        assert_eq!(reg.list_members(ChatId(-500)).len(), 3);
    }

    #[test]
    fn write_failure_is_an_error() {
        let store = SnapshotStore::new("/proc/tagbot-cannot-write/users.json");
        assert!(store.write(&encode(&Registry::new()).unwrap()).is_err());
    }
}
