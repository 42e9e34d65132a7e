use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Pre-compiled regex for site route validation (compiled once at first use)
static ROUTE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[A-Za-z0-9/_\-.~]*$").expect("route regex is valid"));

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub scheduler: Option<SchedulerSection>,
    #[serde(default)]
    pub storage: Option<StorageSection>,
    #[serde(default)]
    pub site: Option<SiteSection>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub state_file: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub idle_interval_ms: Option<u64>,
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,
    #[serde(default)]
    pub auto_start: Option<bool>,
    #[serde(default)]
    pub history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SchedulerSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub memory_alert_mb: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct StorageSection {
    #[serde(default)]
    pub uploads_dir: Option<String>,
    #[serde(default)]
    pub watermarked_dir: Option<String>,
    #[serde(default)]
    pub reports_dir: Option<String>,
    #[serde(default)]
    pub backup_dir: Option<String>,
    #[serde(default)]
    pub backup_keep: Option<usize>,
    #[serde(default)]
    pub temp_dirs: Option<Vec<String>>,
    #[serde(default)]
    pub cleanup_max_age_hours: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SiteSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub public_dir: Option<String>,
    #[serde(default)]
    pub routes: Option<Vec<String>>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s;
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub queue: JobQueueConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub site: SiteConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobQueueConfig {
    pub data_dir: String,
    pub state_file: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub idle_interval_ms: u64,
    pub job_timeout_secs: u64,
    pub auto_start: bool,
    pub history_limit: usize,
}

impl JobQueueConfig {
    /// Full path of the queue snapshot file.
    pub fn state_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.state_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub timezone: String,
    pub memory_alert_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageConfig {
    pub uploads_dir: String,
    pub watermarked_dir: String,
    pub reports_dir: String,
    pub backup_dir: String,
    pub backup_keep: usize,
    pub temp_dirs: Vec<String>,
    pub cleanup_max_age_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteConfig {
    pub base_url: String,
    pub public_dir: String,
    pub routes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            queue: JobQueueConfig {
                data_dir: "./data".to_string(),
                state_file: "queue-state.json".to_string(),
                max_retries: 3,
                retry_delay_ms: 5_000,
                idle_interval_ms: 1_000,
                job_timeout_secs: 300,
                auto_start: true,
                history_limit: 500,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                timezone: "UTC".to_string(),
                memory_alert_mb: 1_024,
            },
            storage: StorageConfig {
                uploads_dir: "./uploads".to_string(),
                watermarked_dir: "./uploads/watermarked".to_string(),
                reports_dir: "./data/reports".to_string(),
                backup_dir: "./backups".to_string(),
                backup_keep: 7,
                temp_dirs: vec!["./tmp".to_string()],
                cleanup_max_age_hours: 24,
            },
            site: SiteConfig {
                base_url: "http://localhost:3000".to_string(),
                public_dir: "./public".to_string(),
                routes: vec![
                    "/".to_string(),
                    "/sheet-music".to_string(),
                    "/about".to_string(),
                    "/contact".to_string(),
                ],
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" => Ok(false),
        _ => Err(()),
    }
}

#[inline]
fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .filter_map(|p| {
            let trimmed = p.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        if let Some(q) = raw.queue {
            apply_opt!(cfg.queue.data_dir, q.data_dir);
            apply_opt!(cfg.queue.state_file, q.state_file);
            apply_opt!(cfg.queue.max_retries, q.max_retries);
            apply_opt!(cfg.queue.retry_delay_ms, q.retry_delay_ms);
            apply_opt!(cfg.queue.idle_interval_ms, q.idle_interval_ms);
            apply_opt!(cfg.queue.job_timeout_secs, q.job_timeout_secs);
            apply_opt!(cfg.queue.auto_start, q.auto_start);
            apply_opt!(cfg.queue.history_limit, q.history_limit);
        }
        if let Some(s) = raw.scheduler {
            apply_opt!(cfg.scheduler.enabled, s.enabled);
            apply_opt!(cfg.scheduler.timezone, s.timezone);
            apply_opt!(cfg.scheduler.memory_alert_mb, s.memory_alert_mb);
        }
        if let Some(st) = raw.storage {
            apply_opt!(cfg.storage.uploads_dir, st.uploads_dir);
            apply_opt!(cfg.storage.watermarked_dir, st.watermarked_dir);
            apply_opt!(cfg.storage.reports_dir, st.reports_dir);
            apply_opt!(cfg.storage.backup_dir, st.backup_dir);
            apply_opt!(cfg.storage.backup_keep, st.backup_keep);
            apply_opt!(cfg.storage.temp_dirs, st.temp_dirs);
            apply_opt!(cfg.storage.cleanup_max_age_hours, st.cleanup_max_age_hours);
        }
        if let Some(site) = raw.site {
            apply_opt!(cfg.site.base_url, site.base_url);
            apply_opt!(cfg.site.public_dir, site.public_dir);
            apply_opt!(cfg.site.routes, site.routes);
        }
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Helper to get env var as string
#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Logging
    if let Some(v) = env_str("SCOREHUB_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("SCOREHUB_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Queue
    if let Some(v) = env_str("SCOREHUB_DATA_DIR") {
        cfg.queue.data_dir = v;
    }
    if let Some(v) = env_str("SCOREHUB_QUEUE_STATE_FILE") {
        cfg.queue.state_file = v;
    }
    if let Some(v) = env_parse::<u32>("SCOREHUB_QUEUE_MAX_RETRIES")? {
        cfg.queue.max_retries = v;
    }
    if let Some(v) = env_parse::<u64>("SCOREHUB_QUEUE_RETRY_DELAY_MS")? {
        cfg.queue.retry_delay_ms = v;
    }
    if let Some(v) = env_parse::<u64>("SCOREHUB_QUEUE_IDLE_INTERVAL_MS")? {
        cfg.queue.idle_interval_ms = v;
    }
    if let Some(v) = env_parse::<u64>("SCOREHUB_QUEUE_JOB_TIMEOUT_SECS")? {
        cfg.queue.job_timeout_secs = v;
    }
    if let Some(v) = env_bool("SCOREHUB_QUEUE_AUTO_START")? {
        cfg.queue.auto_start = v;
    }
    if let Some(v) = env_parse::<usize>("SCOREHUB_QUEUE_HISTORY_LIMIT")? {
        cfg.queue.history_limit = v;
    }

    // Scheduler
    if let Some(v) = env_bool("SCOREHUB_SCHEDULER_ENABLED")? {
        cfg.scheduler.enabled = v;
    }
    if let Some(v) = env_str("SCOREHUB_SCHEDULER_TIMEZONE") {
        cfg.scheduler.timezone = v;
    }
    if let Some(v) = env_parse::<u64>("SCOREHUB_MEMORY_ALERT_MB")? {
        cfg.scheduler.memory_alert_mb = v;
    }

    // Storage
    if let Some(v) = env_str("SCOREHUB_UPLOADS_DIR") {
        cfg.storage.uploads_dir = v;
    }
    if let Some(v) = env_str("SCOREHUB_WATERMARKED_DIR") {
        cfg.storage.watermarked_dir = v;
    }
    if let Some(v) = env_str("SCOREHUB_REPORTS_DIR") {
        cfg.storage.reports_dir = v;
    }
    if let Some(v) = env_str("SCOREHUB_BACKUP_DIR") {
        cfg.storage.backup_dir = v;
    }
    if let Some(v) = env_parse::<usize>("SCOREHUB_BACKUP_KEEP")? {
        cfg.storage.backup_keep = v;
    }
    if let Some(v) = env_str("SCOREHUB_TEMP_DIRS") {
        cfg.storage.temp_dirs = split_csv(&v);
    }
    if let Some(v) = env_parse::<u64>("SCOREHUB_CLEANUP_MAX_AGE_HOURS")? {
        cfg.storage.cleanup_max_age_hours = v;
    }

    // Site
    if let Some(v) = env_str("SCOREHUB_SITE_URL") {
        cfg.site.base_url = v;
    }
    if let Some(v) = env_str("SCOREHUB_PUBLIC_DIR") {
        cfg.site.public_dir = v;
    }
    if let Some(v) = env_str("SCOREHUB_SITE_ROUTES") {
        cfg.site.routes = split_csv(&v);
    }

    Ok(())
}

/// Longest file age the cleanup worker accepts, ten years.
pub const MAX_CLEANUP_AGE_HOURS: u64 = 24 * 365 * 10;

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.queue.max_retries == 0 {
        return Err(ConfigError::Validation(
            "queue.max_retries must be > 0".into(),
        ));
    }
    if cfg.queue.job_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "queue.job_timeout_secs must be > 0".into(),
        ));
    }
    if cfg.queue.idle_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "queue.idle_interval_ms must be > 0".into(),
        ));
    }
    if cfg.queue.data_dir.trim().is_empty() || cfg.queue.state_file.trim().is_empty() {
        return Err(ConfigError::Validation(
            "queue.data_dir and queue.state_file must be set".into(),
        ));
    }

    if cfg.scheduler.timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(ConfigError::Validation(format!(
            "unknown scheduler.timezone: {}",
            cfg.scheduler.timezone
        )));
    }

    if cfg.storage.backup_keep == 0 {
        return Err(ConfigError::Validation(
            "storage.backup_keep must be > 0".into(),
        ));
    }
    if cfg.storage.cleanup_max_age_hours > MAX_CLEANUP_AGE_HOURS {
        return Err(ConfigError::Validation(format!(
            "storage.cleanup_max_age_hours must be <= {}",
            MAX_CLEANUP_AGE_HOURS
        )));
    }

    match url::Url::parse(&cfg.site.base_url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        Ok(_) => {
            return Err(ConfigError::Validation(format!(
                "site.base_url must be http or https: {}",
                cfg.site.base_url
            )))
        }
        Err(_) => {
            return Err(ConfigError::Validation(format!(
                "invalid site.base_url: {}",
                cfg.site.base_url
            )))
        }
    }
    for route in &cfg.site.routes {
        if !ROUTE_REGEX.is_match(route) {
            return Err(ConfigError::Validation(format!(
                "invalid site route: {}",
                route
            )));
        }
    }
    Ok(())
}
