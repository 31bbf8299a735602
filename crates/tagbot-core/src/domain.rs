use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

/// A point in time as stored in the snapshot.
///
/// Values that cannot be parsed on load are kept verbatim in `Raw` and written
/// back unchanged on the next save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Timestamp {
    At(DateTime<Utc>),
    Raw(String),
}

impl Timestamp {
    /// Current time, truncated to the microsecond precision the snapshot keeps.
    pub fn now() -> Self {
        Self::At(Utc::now().trunc_subsecs(6))
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::At(dt) => Some(*dt),
            Self::Raw(_) => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::At(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
            Self::Raw(s) => s.clone(),
        }
    }

    /// Accepts RFC 3339 and naive ISO-8601 (interpreted as local time).
    pub fn decode(raw: &str) -> Self {
        let s = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Self::At(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                if let Some(local) = Local.from_local_datetime(&naive).earliest() {
                    return Self::At(local.with_timezone(&Utc));
                }
            }
        }
        Self::Raw(raw.to_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::At(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

/// Missing timestamp fields load as an empty raw value.
impl Default for Timestamp {
    fn default() -> Self {
        Self::Raw(String::new())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    /// Never fails on well-formed JSON: strings go through [`Timestamp::decode`],
    /// any other value (null, numbers, objects) is kept as its JSON text.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(raw) => Self::decode(&raw),
            other => Self::Raw(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rfc3339_and_naive_iso() {
        let a = Timestamp::decode("2025-09-01T10:00:00.123456+00:00");
        let expected = Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(a, Timestamp::At(expected));

        let b = Timestamp::decode("2025-09-01T10:00:00.500000");
        assert!(b.instant().is_some());
    }

    #[test]
    fn keeps_unparseable_text_raw() {
        let t = Timestamp::decode("last tuesday");
        assert_eq!(t, Timestamp::Raw("last tuesday".to_string()));
        assert_eq!(t.encode(), "last tuesday");
    }

    #[test]
    fn non_string_values_are_kept_as_json_text() {
        let null: Timestamp = serde_json::from_str("null").unwrap();
        assert_eq!(null, Timestamp::Raw("null".to_string()));
        let num: Timestamp = serde_json::from_str("1700000000").unwrap();
        assert_eq!(num, Timestamp::Raw("1700000000".to_string()));
    }

    #[test]
    fn encode_then_decode_is_same_instant() {
        let now = Timestamp::now();
        assert_eq!(Timestamp::decode(&now.encode()), now);
    }
}
