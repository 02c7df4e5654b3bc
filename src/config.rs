//! Application-level configuration loading and validation.

use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::services::{matcher::MatchPolicy, timer::Deadlines};

/// Default location on disk where the bot looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/trivia.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CHAT_TRIVIA_CONFIG_PATH";
/// Environment variable that overrides the chat password from the file.
const CHAT_PASS_ENV: &str = "CHAT_TRIVIA_CHAT_PASS";

/// Errors preventing the bot from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid JSON for the expected layout.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Path that was parsed.
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Values are out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Round rules and timings.
    pub trivia: TriviaSettings,
    /// Chat connection parameters.
    pub chat: ChatSettings,
    /// Locations of the persisted documents.
    pub storage: StorageSettings,
    /// Identities allowed to run admin commands.
    pub admins: HashSet<String>,
}

/// Round rules consumed by the session engine.
#[derive(Debug, Clone)]
pub struct TriviaSettings {
    /// CSV question bank.
    pub question_file: PathBuf,
    /// Questions per round, clamped to the bank size.
    pub num_questions: usize,
    /// Hint and skip thresholds.
    pub deadlines: Deadlines,
    /// Pause before the first question and between questions.
    pub delay: Duration,
    /// Points per question while bonus mode is on.
    pub bonus_value: u32,
    /// Answer matching rule.
    pub match_policy: MatchPolicy,
    /// Interval between deadline checks.
    pub poll_interval: Duration,
}

/// Chat server parameters.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Bot nickname.
    pub nick: String,
    /// Server password or OAuth token.
    pub pass: String,
    /// Channel to join, including the leading `#`.
    pub channel: String,
}

/// Locations of the score table and the backup snapshot.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// Score table file.
    pub scores_path: PathBuf,
    /// Backup snapshot file.
    pub backup_path: PathBuf,
}

impl AppConfig {
    /// Load the configuration from disk. Any failure is fatal to startup.
    pub fn load() -> Result<Self, ConfigError> {
        let path = resolve_config_path();
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let mut config = Self::from_json_str(&contents, &path)?;

        if let Some(pass) = env::var(CHAT_PASS_ENV).ok().filter(|p| !p.is_empty()) {
            config.chat.pass = pass;
        }

        info!(
            path = %path.display(),
            num_questions = config.trivia.num_questions,
            admins = config.admins.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate a JSON document; `origin` is only used in error messages.
    pub fn from_json_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw = serde_json::from_str::<RawConfig>(contents).map_err(|source| {
            ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            }
        })?;
        raw.validate()?;
        Ok(raw.into())
    }
}

#[derive(Debug, Deserialize, Validate)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[validate(nested)]
    trivia: RawTrivia,
    #[validate(nested)]
    chat: RawChat,
    #[serde(default)]
    storage: RawStorage,
    #[serde(default)]
    admins: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_deadlines"))]
struct RawTrivia {
    #[validate(length(min = 1))]
    question_file: String,
    #[validate(range(min = 1))]
    num_questions: usize,
    hint_time_1: u64,
    hint_time_2: u64,
    skip_time: u64,
    delay: u64,
    #[serde(default = "default_bonus_value")]
    #[validate(range(min = 1))]
    bonus_value: u32,
    #[serde(default)]
    match_policy: MatchPolicy,
    #[serde(default = "default_poll_interval_ms")]
    #[validate(range(min = 1, max = 10_000))]
    poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Validate)]
struct RawChat {
    #[validate(length(min = 1))]
    host: String,
    port: u16,
    #[validate(length(min = 1))]
    nick: String,
    #[serde(default)]
    pass: String,
    #[validate(length(min = 2))]
    channel: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawStorage {
    scores_path: String,
    backup_path: String,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self {
            scores_path: "userscores.json".into(),
            backup_path: "backup/trivia_backup.json".into(),
        }
    }
}

fn default_bonus_value() -> u32 {
    2
}

fn default_poll_interval_ms() -> u64 {
    100
}

/// Hint and skip thresholds must be strictly increasing.
fn validate_deadlines(raw: &RawTrivia) -> Result<(), ValidationError> {
    if raw.hint_time_1 < raw.hint_time_2 && raw.hint_time_2 < raw.skip_time {
        return Ok(());
    }
    let mut err = ValidationError::new("deadline_order");
    err.message = Some(
        format!(
            "expected hint_time_1 < hint_time_2 < skip_time (got {}, {}, {})",
            raw.hint_time_1, raw.hint_time_2, raw.skip_time
        )
        .into(),
    );
    Err(err)
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let RawConfig {
            trivia,
            chat,
            storage,
            admins,
        } = value;

        let mut channel = chat.channel;
        if !channel.starts_with('#') {
            channel.insert(0, '#');
        }

        Self {
            trivia: TriviaSettings {
                question_file: PathBuf::from(trivia.question_file),
                num_questions: trivia.num_questions,
                deadlines: Deadlines {
                    hint_1: Duration::from_secs(trivia.hint_time_1),
                    hint_2: Duration::from_secs(trivia.hint_time_2),
                    skip: Duration::from_secs(trivia.skip_time),
                },
                delay: Duration::from_secs(trivia.delay),
                bonus_value: trivia.bonus_value,
                match_policy: trivia.match_policy,
                poll_interval: Duration::from_millis(trivia.poll_interval_ms),
            },
            chat: ChatSettings {
                host: chat.host,
                port: chat.port,
                nick: chat.nick,
                pass: chat.pass,
                channel,
            },
            storage: StorageSettings {
                scores_path: PathBuf::from(storage.scores_path),
                backup_path: PathBuf::from(storage.backup_path),
            },
            admins: admins
                .into_iter()
                .map(|admin| admin.trim().to_owned())
                .filter(|admin| !admin.is_empty())
                .collect(),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r##"{
        "trivia": {
            "question_file": "triviaset.csv",
            "num_questions": 5,
            "hint_time_1": 30,
            "hint_time_2": 60,
            "skip_time": 90,
            "delay": 10
        },
        "chat": {
            "host": "irc.chat.twitch.tv",
            "port": 6667,
            "nick": "triviabot",
            "pass": "oauth:secret",
            "channel": "somechannel"
        },
        "admins": ["alice", " bob ", ""]
    }"##;

    #[test]
    fn parses_and_applies_defaults() {
        let config = AppConfig::from_json_str(VALID, Path::new("inline")).unwrap();

        assert_eq!(config.trivia.num_questions, 5);
        assert_eq!(config.trivia.deadlines.skip, Duration::from_secs(90));
        assert_eq!(config.trivia.bonus_value, 2);
        assert_eq!(config.trivia.match_policy, MatchPolicy::Fuzzy);
        assert_eq!(config.trivia.poll_interval, Duration::from_millis(100));
        assert_eq!(config.chat.channel, "#somechannel");
        assert_eq!(config.storage.scores_path, PathBuf::from("userscores.json"));
        assert!(config.admins.contains("alice"));
        assert!(config.admins.contains("bob"));
        assert!(!config.admins.contains(""));
        assert_eq!(config.admins.len(), 2);
    }

    #[test]
    fn rejects_unordered_deadlines() {
        let contents = VALID.replace("\"hint_time_2\": 60", "\"hint_time_2\": 95");
        let err = AppConfig::from_json_str(&contents, Path::new("inline")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");
    }

    #[test]
    fn rejects_empty_rounds() {
        let contents = VALID.replace("\"num_questions\": 5", "\"num_questions\": 0");
        let err = AppConfig::from_json_str(&contents, Path::new("inline")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err:?}");
    }

    #[test]
    fn literal_policy_can_be_selected() {
        let contents = VALID.replace(
            "\"delay\": 10",
            "\"delay\": 10, \"match_policy\": \"literal\"",
        );
        let config = AppConfig::from_json_str(&contents, Path::new("inline")).unwrap();
        assert_eq!(config.trivia.match_policy, MatchPolicy::Literal);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = AppConfig::from_json_str("{", Path::new("inline")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
