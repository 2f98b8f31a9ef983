use std::{
    env, fs,
    path::{Path, PathBuf},
};

use tracing::Level;

use crate::{errors::Error, Result};

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "bot_errors.log";

/// Settings for the process-wide log sink.
///
/// These are fixed in code: there is no env var or file that changes them.
#[derive(Clone, Debug)]
pub struct LogConfig {
    pub file_path: PathBuf,
    pub console: bool,
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
            console: true,
            level: Level::INFO,
        }
    }
}

/// Bot configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Empty means every user is allowed.
    pub telegram_allowed_users: Vec<i64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
        })
    }

    pub fn is_authorized(&self, user_id: Option<i64>) -> bool {
        if self.telegram_allowed_users.is_empty() {
            return true;
        }
        user_id.is_some_and(|id| self.telegram_allowed_users.contains(&id))
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

        let key = k.trim();
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

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    let Some(v) = v else { return vec![] };
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}
