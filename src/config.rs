// Tracker configuration.
//
// Priority order:
// 1. Environment variables (SENDER_EMAIL, SENDER_PASSWORD, RECIPIENT_EMAIL,
//    TRACKER_* overrides)
// 2. Config file from --config, else TRACKER_CONFIG, else ./tracker.toml
// 3. Built-in defaults

use std::env;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::style::StylePresets;

pub const DEFAULT_CONFIG_FILE: &str = "tracker.toml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub paths: PathsConfig,
    pub api: ApiConfig,
    pub email: EmailConfig,
    pub styles: StylePresets,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub report: PathBuf,
    pub cache: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            report: PathBuf::from("leetcode_report.db"),
            cache: PathBuf::from("daily_cache.json"),
            export_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub referer: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub lookup_timeout_secs: u64,
    pub recent_submission_limit: u32,
    /// Pause after each user's queries.
    pub user_delay_ms: u64,
    /// Pause between per-problem difficulty lookups.
    pub lookup_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://leetcode.com/graphql".to_string(),
            referer: "https://leetcode.com".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            request_timeout_secs: 15,
            lookup_timeout_secs: 10,
            recent_submission_limit: 50,
            user_delay_ms: 1000,
            lookup_delay_ms: 200,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub recipient: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            sender: None,
            password: None,
            recipient: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Plain-text log appended to on every run, next to stdout.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn open_file(&self) -> Result<Option<File>> {
        let Some(path) = &self.file else {
            return Ok(None);
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(Some(file))
    }
}

/// Source of environment values, swappable in tests.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

impl TrackerConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match config_file(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(&StdEnvSource);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn apply_env(&mut self, env: &impl EnvSource) {
        if let Some(value) = env.get("SENDER_EMAIL") {
            self.email.sender = Some(value);
        }
        if let Some(value) = env.get("SENDER_PASSWORD") {
            self.email.password = Some(value);
        }
        if let Some(value) = env.get("RECIPIENT_EMAIL") {
            self.email.recipient = Some(value);
        }
        if let Some(value) = env.get("TRACKER_REPORT_PATH") {
            self.paths.report = PathBuf::from(value);
        }
        if let Some(value) = env.get("TRACKER_CACHE_PATH") {
            self.paths.cache = PathBuf::from(value);
        }
        if let Some(value) = env.get("TRACKER_EXPORT_DIR") {
            self.paths.export_dir = PathBuf::from(value);
        }
        if let Some(value) = env.get("TRACKER_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = env.get("TRACKER_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(value));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.trim().is_empty() {
            bail!("api.endpoint must not be empty");
        }
        if self.api.request_timeout_secs == 0 || self.api.lookup_timeout_secs == 0 {
            bail!("api timeouts must be greater than zero");
        }
        if self.api.recent_submission_limit == 0 {
            bail!("api.recent_submission_limit must be greater than zero");
        }
        for (name, value) in self.styles.colours() {
            if !StylePresets::is_hex_colour(value) {
                bail!("styles.{name} must be a six digit hex colour, got {value:?}");
            }
        }
        Ok(())
    }
}

fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = env::var("TRACKER_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let fallback = Path::new(DEFAULT_CONFIG_FILE);
    fallback.exists().then(|| fallback.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|value| value.to_string())
        }
    }

    #[test]
    fn defaults_match_tracker_conventions() {
        let config = TrackerConfig::default();
        assert_eq!(config.api.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.api.user_delay_ms, 1000);
        assert_eq!(config.api.lookup_delay_ms, 200);
        assert_eq!(config.email.smtp_port, 465);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(
            &path,
            r#"
            [paths]
            report = "/srv/tracker/report.db"

            [api]
            user_delay_ms = 250

            [styles]
            header_fill = "000000"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        let config = TrackerConfig::from_file(&path).unwrap();
        assert_eq!(config.paths.report, PathBuf::from("/srv/tracker/report.db"));
        assert_eq!(config.paths.cache, PathBuf::from("daily_cache.json"));
        assert_eq!(config.api.user_delay_ms, 250);
        assert_eq!(config.api.lookup_delay_ms, 200);
        assert_eq!(config.styles.header_fill, "000000");
        assert_eq!(config.styles.day_fill, "2E75B6");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_credentials_and_paths() {
        let env = MapEnv(HashMap::from([
            ("SENDER_EMAIL", "tracker@example.com"),
            ("SENDER_PASSWORD", "app-password"),
            ("RECIPIENT_EMAIL", "mentor@example.com"),
            ("TRACKER_REPORT_PATH", "other.db"),
        ]));
        let mut config = TrackerConfig::default();
        config.apply_env(&env);
        assert_eq!(config.email.sender.as_deref(), Some("tracker@example.com"));
        assert_eq!(config.email.password.as_deref(), Some("app-password"));
        assert_eq!(config.email.recipient.as_deref(), Some("mentor@example.com"));
        assert_eq!(config.paths.report, PathBuf::from("other.db"));
    }

    #[test]
    fn log_file_is_opened_for_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("tracker_log.txt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "earlier run\n").unwrap();

        let mut config = TrackerConfig::default();
        assert!(config.logging.open_file().unwrap().is_none());
        config.apply_env(&MapEnv(HashMap::from([("TRACKER_LOG_FILE", "tracker_log.txt")])));
        assert_eq!(config.logging.file, Some(PathBuf::from("tracker_log.txt")));

        config.logging.file = Some(path.clone());

        let mut file = config.logging.open_file().unwrap().unwrap();
        std::io::Write::write_all(&mut file, b"this run\n").unwrap();
        drop(file);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier run\nthis run\n"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = TrackerConfig::default();
        config.api.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.styles.alternate_fill = "blue".to_string();
        assert!(config.validate().is_err());
    }
}
