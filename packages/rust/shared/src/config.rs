//! Application configuration for Jobflow.
//!
//! User config lives at `~/.jobflow/jobflow.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{JobflowError, Result};
use crate::types::{FetchRequest, JOB_TTL_DAYS, MAX_RETENTION_DAYS, RETENTION_DAYS};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "jobflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".jobflow";

/// Default database file name inside the config directory.
const DATABASE_FILE_NAME: &str = "jobflow.db";

// ---------------------------------------------------------------------------
// Config structs (matching jobflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Defaults for on-demand fetches.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Hourly scheduler settings.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retention policy.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Per-platform overrides, keyed by platform tag.
    #[serde(default)]
    pub platforms: BTreeMap<String, PlatformConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Platforms fetched when a trigger names none.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,

    /// Location used when a trigger names none.
    #[serde(default = "default_location")]
    pub location: String,

    /// Keywords used when a trigger names none.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
            location: default_location(),
            keywords: default_keywords(),
        }
    }
}

fn default_platforms() -> Vec<String> {
    vec!["indeed".into(), "linkedin".into(), "glassdoor".into()]
}
fn default_location() -> String {
    "remote".into()
}
fn default_keywords() -> Vec<String> {
    vec![
        "software engineer".into(),
        "developer".into(),
        "frontend".into(),
        "backend".into(),
    ]
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether `jobflow serve` runs the periodic trigger.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression (5 or 6 fields, UTC).
    #[serde(default = "default_cron")]
    pub cron: String,

    /// Keywords used by scheduled runs.
    #[serde(default = "default_schedule_keywords")]
    pub keywords: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: default_cron(),
            keywords: default_schedule_keywords(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_cron() -> String {
    "0 * * * *".into()
}
fn default_schedule_keywords() -> Vec<String> {
    vec![
        "software engineer".into(),
        "developer".into(),
        "react".into(),
        "node.js".into(),
    ]
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. Defaults to `~/.jobflow/jobflow.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

/// `[retention]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Postings older than this many days are purged.
    #[serde(default = "default_retention_days")]
    pub days: i64,

    /// Days after posting at which a stored job expires.
    #[serde(default = "default_job_ttl_days")]
    pub job_ttl_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
            job_ttl_days: default_job_ttl_days(),
        }
    }
}

fn default_retention_days() -> i64 {
    RETENTION_DAYS
}
fn default_job_ttl_days() -> i64 {
    JOB_TTL_DAYS
}

/// `[platforms.<tag>]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Minimum ms between requests, overriding the board's built-in interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_ms: Option<u64>,

    /// JSON feed endpoint. When unset, the board's synthetic feed is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<Url>,
}

impl AppConfig {
    /// The request used when a trigger supplies no overrides.
    pub fn default_request(&self) -> FetchRequest {
        FetchRequest {
            platforms: self.defaults.platforms.clone(),
            location: self.defaults.location.clone(),
            keywords: self.defaults.keywords.clone(),
        }
    }

    /// The request used by scheduled runs.
    pub fn scheduled_request(&self) -> FetchRequest {
        FetchRequest {
            keywords: self.schedule.keywords.clone(),
            ..self.default_request()
        }
    }

    /// Reject values that would produce an empty or inverted time window.
    pub fn validate(&self) -> Result<()> {
        check_days("retention.days", self.retention.days)?;
        check_days("retention.job_ttl_days", self.retention.job_ttl_days)
    }

    /// Resolve the database path, falling back to the config directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(p) => Ok(expand_home(p)),
            None => Ok(config_dir()?.join(DATABASE_FILE_NAME)),
        }
    }
}

fn check_days(key: &str, days: i64) -> Result<()> {
    if (1..=MAX_RETENTION_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(JobflowError::config(format!(
            "{key} must be between 1 and {MAX_RETENTION_DAYS}, got {days}"
        )))
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.jobflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| JobflowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.jobflow/jobflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| JobflowError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| JobflowError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| JobflowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| JobflowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| JobflowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[defaults]"));
        assert!(toml_str.contains("0 * * * *"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.location, "remote");
        assert_eq!(parsed.retention.days, 7);
        assert_eq!(parsed.retention.job_ttl_days, 30);
        assert!(parsed.schedule.enabled);
    }

    #[test]
    fn default_request_matches_documented_defaults() {
        let req = AppConfig::default().default_request();
        assert_eq!(req.platforms, vec!["indeed", "linkedin", "glassdoor"]);
        assert_eq!(req.location, "remote");
        assert_eq!(
            req.keywords,
            vec!["software engineer", "developer", "frontend", "backend"]
        );
    }

    #[test]
    fn scheduled_request_uses_schedule_keywords() {
        let req = AppConfig::default().scheduled_request();
        assert_eq!(req.platforms.len(), 3);
        assert_eq!(
            req.keywords,
            vec!["software engineer", "developer", "react", "node.js"]
        );
    }

    #[test]
    fn config_with_platform_overrides() {
        let toml_str = r#"
[defaults]
location = "Berlin"

[storage]
database_path = "/tmp/jobflow-test.db"

[platforms.indeed]
rate_limit_ms = 250
feed_url = "https://feeds.example.com/indeed"

[platforms.linkedin]
rate_limit_ms = 500
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.location, "Berlin");
        assert_eq!(config.defaults.platforms.len(), 3);
        assert_eq!(config.platforms.len(), 2);
        assert_eq!(config.platforms["indeed"].rate_limit_ms, Some(250));
        assert!(config.platforms["indeed"].feed_url.is_some());
        assert!(config.platforms["linkedin"].feed_url.is_none());
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/jobflow-test.db")
        );
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let tmp = std::env::temp_dir().join(format!("jobflow-bad-{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&tmp, "[defaults\nlocation = ").unwrap();
        let err = load_config_from(&tmp).unwrap_err();
        assert!(err.to_string().starts_with("config error"));
        let _ = std::fs::remove_file(&tmp);
    }

    fn write_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("jobflow-cfg-{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn retention_values_in_range_load() {
        let path = write_config("[retention]\ndays = 1\njob_ttl_days = 3650\n");
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.retention.days, 1);
        assert_eq!(config.retention.job_ttl_days, MAX_RETENTION_DAYS);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn out_of_range_retention_is_rejected() {
        for (key, value) in [
            ("days", "0"),
            ("days", "-1"),
            ("days", "3651"),
            ("days", "9223372036854775807"),
            ("job_ttl_days", "0"),
            ("job_ttl_days", "-30"),
            ("job_ttl_days", "100000"),
        ] {
            let path = write_config(&format!("[retention]\n{key} = {value}\n"));
            let err = load_config_from(&path).unwrap_err();
            assert!(
                matches!(err, JobflowError::Config { .. }),
                "{key} = {value} should be rejected"
            );
            assert!(err.to_string().contains(&format!("retention.{key}")));
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
