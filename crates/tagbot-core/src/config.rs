use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_SCHEDULE_URL: &str = "https://www.muiv.ru/studentu/spo/raspisanie/";
pub const DEFAULT_PERSONAL_ACCOUNT_URL: &str = "https://e.muiv.ru/login/index.php";
pub const DEFAULT_EDUCATION_PROGRAMS_URL: &str = "https://www.muiv.ru/sveden/education/oop/";

/// Static links surfaced by the menu buttons.
#[derive(Clone, Debug)]
pub struct Links {
    pub schedule: String,
    pub personal_account: String,
    pub education_programs: String,
}

impl Default for Links {
    fn default() -> Self {
        Self {
            schedule: DEFAULT_SCHEDULE_URL.to_string(),
            personal_account: DEFAULT_PERSONAL_ACCOUNT_URL.to_string(),
            education_programs: DEFAULT_EDUCATION_PROGRAMS_URL.to_string(),
        }
    }
}

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    // Persistence
    pub data_file: PathBuf,
    pub autosave_interval: Duration,

    // Tag cooldowns
    pub tag_cooldown: Duration,
    pub tag_all_cooldown: Duration,
    pub cooldown_horizon: Duration,

    // Telegram limits / layout
    pub tag_keyboard_size: usize,
    pub telegram_message_limit: usize,

    pub links: Links,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            data_file: PathBuf::from("users_data.json"),
            autosave_interval: Duration::from_secs(300),
            tag_cooldown: Duration::from_secs(30),
            tag_all_cooldown: Duration::from_secs(60),
            cooldown_horizon: Duration::from_secs(60),
            tag_keyboard_size: 12,
            telegram_message_limit: 4096,
            links: Links::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let defaults = Self::default();

        let data_file = env_str("DATA_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or(defaults.data_file);

        let autosave_interval = env_secs("AUTOSAVE_INTERVAL_SECS")
            .filter(|d| !d.is_zero())
            .unwrap_or(defaults.autosave_interval);

        let tag_cooldown = env_secs("TAG_COOLDOWN_SECS").unwrap_or(defaults.tag_cooldown);
        let tag_all_cooldown =
            env_secs("TAG_ALL_COOLDOWN_SECS").unwrap_or(defaults.tag_all_cooldown);
        // Entries must survive at least as long as the longest window.
        let cooldown_horizon = env_secs("TAG_COOLDOWN_HORIZON_SECS")
            .unwrap_or(defaults.cooldown_horizon)
            .max(tag_cooldown)
            .max(tag_all_cooldown);

        let tag_keyboard_size = env_usize("TAG_KEYBOARD_SIZE")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.tag_keyboard_size);
        let telegram_message_limit = env_usize("TELEGRAM_MESSAGE_LIMIT")
            .filter(|n| *n >= 64)
            .unwrap_or(defaults.telegram_message_limit);

        let links = Links {
            schedule: env_str("SCHEDULE_URL")
                .and_then(non_empty)
                .unwrap_or(defaults.links.schedule),
            personal_account: env_str("PERSONAL_ACCOUNT_URL")
                .and_then(non_empty)
                .unwrap_or(defaults.links.personal_account),
            education_programs: env_str("EDUCATION_PROGRAMS_URL")
                .and_then(non_empty)
                .unwrap_or(defaults.links.education_programs),
        };

        Ok(Self {
            telegram_bot_token,
            data_file,
            autosave_interval,
            tag_cooldown,
            tag_all_cooldown,
            cooldown_horizon,
            tag_keyboard_size,
            telegram_message_limit,
            links,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_secs(key: &str) -> Option<Duration> {
    env_str(key)
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_parsing_strips_quotes_and_comments() {
        let parsed = parse_dotenv(
            "# comment\nTELEGRAM_BOT_TOKEN=\"123:abc\"\nexport DATA_FILE='users.json'\nbroken line\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "123:abc".to_string()),
                ("DATA_FILE".to_string(), "users.json".to_string()),
            ]
        );
    }

    #[test]
    fn defaults_match_documented_windows() {
        let cfg = Config::default();
        assert_eq!(cfg.tag_cooldown, Duration::from_secs(30));
        assert_eq!(cfg.tag_all_cooldown, Duration::from_secs(60));
        assert_eq!(cfg.cooldown_horizon, Duration::from_secs(60));
        assert_eq!(cfg.autosave_interval, Duration::from_secs(300));
        assert_eq!(cfg.data_file, PathBuf::from("users_data.json"));
    }
}
