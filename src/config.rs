use crate::{api_client::DEFAULT_API_BASE, practice::RequestPolicy};
use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{OnceLock, RwLock},
    time::Duration,
};

/// Globally accessible application configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs_value")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_load_retry_attempts_value")]
    pub load_retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms_value")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_show_answer_feedback_value")]
    pub show_answer_feedback: bool,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub access_token: String,
}

impl AppConfig {
    fn normalize(&mut self) {
        if self.api_base_url.trim().is_empty() {
            self.api_base_url = default_api_base_url();
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        self.load_retry_attempts = self.load_retry_attempts.min(MAX_LOAD_RETRY_ATTEMPTS);
    }

    pub fn request_policy(&self) -> RequestPolicy {
        RequestPolicy {
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            load_retries: self.load_retry_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    /// Layer command line / environment values over the stored configuration.
    /// The result is never written back to disk.
    pub fn with_overrides(&self, overrides: &Overrides) -> AppConfig {
        let mut merged = self.clone();
        if let Some(url) = non_blank(&overrides.api_base_url) {
            merged.api_base_url = url;
        }
        if let Some(user_id) = non_blank(&overrides.user_id) {
            merged.user_id = user_id;
        }
        if let Some(token) = non_blank(&overrides.access_token) {
            merged.access_token = token;
        }
        merged
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            load_retry_attempts: DEFAULT_LOAD_RETRY_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            show_answer_feedback: default_show_answer_feedback_value(),
            user_id: String::new(),
            access_token: String::new(),
        }
    }
}

/// Session-only values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub user_id: Option<String>,
    pub access_token: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOAD_RETRY_ATTEMPTS: u32 = 1;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const MAX_LOAD_RETRY_ATTEMPTS: u32 = 5;
const RETRY_BACKOFF_STEP_MS: i64 = 100;

fn default_api_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}
const fn default_request_timeout_secs_value() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
const fn default_load_retry_attempts_value() -> u32 {
    DEFAULT_LOAD_RETRY_ATTEMPTS
}
const fn default_retry_backoff_ms_value() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}
const fn default_show_answer_feedback_value() -> bool {
    true
}

const CONFIG_FILE_PATH: &str = "config/app_config.toml";

static APP_CONFIG: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn config_lock() -> &'static RwLock<AppConfig> {
    APP_CONFIG.get_or_init(|| RwLock::new(AppConfig::default()))
}

/// Attempt to load configuration from disk. If loading fails, the in-memory config will be reset to defaults
/// and the error will be returned for the caller to surface if desired.
pub fn initialize() -> Result<()> {
    let loaded = load_config_from_path(&config_file_path());
    let mut guard = config_lock()
        .write()
        .map_err(|_| eyre!("configuration lock poisoned"))?;
    match loaded {
        Ok(config) => {
            *guard = config;
            Ok(())
        }
        Err(err) => {
            *guard = AppConfig::default();
            Err(err)
        }
    }
}

/// Retrieve a clone of the current configuration.
pub fn current() -> AppConfig {
    match config_lock().read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Apply the provided mutation to the in-memory configuration and persist the result to disk.
pub fn update<F>(mutator: F) -> Result<AppConfig>
where
    F: FnOnce(&mut AppConfig),
{
    let mut config = config_lock()
        .write()
        .map_err(|_| eyre!("configuration lock poisoned"))?;
    mutator(&mut config);
    config.normalize();
    save_config_to_path(&config_file_path(), &config)?;
    Ok(config.clone())
}

/// Path to the configuration file used for persistence, relative to the working directory.
pub fn config_file_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_PATH)
}

pub(crate) fn load_config_from_path(path: &Path) -> Result<AppConfig> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let mut config: AppConfig = toml::from_str(&contents)
                .wrap_err_with(|| format!("failed to parse configuration at {}", path.display()))?;
            config.normalize();
            Ok(config)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(eyre!(
            "failed to read configuration at {}: {}",
            path.display(),
            err
        )),
    }
}

pub(crate) fn save_config_to_path(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).wrap_err_with(|| {
            format!(
                "failed to create configuration directory {}",
                parent.display()
            )
        })?;
    }
    let serialized =
        toml::to_string_pretty(config).wrap_err("failed to serialize configuration to TOML")?;
    fs::write(path, serialized)
        .wrap_err_with(|| format!("failed to write configuration to {}", path.display()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigField {
    RequestTimeout,
    LoadRetries,
    RetryBackoff,
    AnswerFeedback,
    AccessToken,
}

/// Editable copy of the configuration behind the config view.
#[derive(Debug, Clone)]
pub struct ConfigForm {
    pub request_timeout_secs: u64,
    pub load_retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub show_answer_feedback: bool,
    pub access_token: String,
    editing_access_token: bool,
    access_token_buffer: String,
    field: ConfigField,
    pub dirty: bool,
    pub status: Option<String>,
}

impl ConfigForm {
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            request_timeout_secs: config.request_timeout_secs,
            load_retry_attempts: config.load_retry_attempts,
            retry_backoff_ms: config.retry_backoff_ms,
            show_answer_feedback: config.show_answer_feedback,
            access_token: config.access_token,
            editing_access_token: false,
            access_token_buffer: String::new(),
            field: ConfigField::RequestTimeout,
            dirty: false,
            status: None,
        }
    }

    pub fn selected_index(&self) -> usize {
        self.field.index()
    }

    pub fn select_next(&mut self) {
        self.field = self.field.next();
    }

    pub fn select_previous(&mut self) {
        self.field = self.field.previous();
    }

    pub fn adjust_current(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }

        let changed = match self.field {
            ConfigField::RequestTimeout => {
                let updated = (self.request_timeout_secs as i64 + delta).max(1) as u64;
                std::mem::replace(&mut self.request_timeout_secs, updated) != updated
            }
            ConfigField::LoadRetries => {
                let updated = (self.load_retry_attempts as i64 + delta)
                    .clamp(0, MAX_LOAD_RETRY_ATTEMPTS as i64) as u32;
                std::mem::replace(&mut self.load_retry_attempts, updated) != updated
            }
            ConfigField::RetryBackoff => {
                let updated =
                    (self.retry_backoff_ms as i64 + delta * RETRY_BACKOFF_STEP_MS).max(0) as u64;
                std::mem::replace(&mut self.retry_backoff_ms, updated) != updated
            }
            ConfigField::AnswerFeedback => {
                self.show_answer_feedback = !self.show_answer_feedback;
                true
            }
            ConfigField::AccessToken => false,
        };

        if changed {
            self.dirty = true;
            self.status = None;
        }
    }

    /// Copy the form values onto `config`.
    pub fn apply_to(&self, config: &mut AppConfig) {
        config.request_timeout_secs = self.request_timeout_secs;
        config.load_retry_attempts = self.load_retry_attempts;
        config.retry_backoff_ms = self.retry_backoff_ms;
        config.show_answer_feedback = self.show_answer_feedback;
        config.access_token = self.access_token.clone();
    }

    pub fn apply_saved(&mut self, config: AppConfig) {
        *self = Self {
            field: self.field,
            ..Self::from_config(config)
        };
    }

    pub fn set_status<S: Into<String>>(&mut self, status: S) {
        self.status = Some(status.into());
    }

    pub fn is_access_token_selected(&self) -> bool {
        matches!(self.field, ConfigField::AccessToken)
    }

    pub fn is_editing_access_token(&self) -> bool {
        self.editing_access_token
    }

    pub fn start_editing_access_token(&mut self) {
        self.editing_access_token = true;
        self.access_token_buffer = self.access_token.clone();
        self.status = Some("Editing access token (Enter to keep, Esc to cancel)".to_string());
    }

    pub fn cancel_access_token_edit(&mut self) {
        self.editing_access_token = false;
        self.access_token_buffer.clear();
        self.status = Some("Cancelled access token edit.".to_string());
    }

    pub fn apply_access_token_edit(&mut self) {
        let new_value = self.access_token_buffer.trim().to_string();
        if new_value != self.access_token {
            self.access_token = new_value;
            self.dirty = true;
            self.status = Some("Updated access token.".to_string());
        } else {
            self.status = Some("Access token unchanged.".to_string());
        }
        self.editing_access_token = false;
        self.access_token_buffer.clear();
    }

    pub fn backspace_access_token(&mut self) {
        self.access_token_buffer.pop();
    }

    pub fn push_access_token_char(&mut self, ch: char) {
        self.access_token_buffer.push(ch);
    }

    pub fn masked_access_token(&self) -> String {
        mask_secret(&self.access_token)
    }

    pub fn masked_access_token_buffer(&self) -> String {
        mask_secret(&self.access_token_buffer)
    }
}

fn mask_secret(value: &str) -> String {
    if value.is_empty() {
        return "<not set>".to_string();
    }
    let len = value.chars().count();
    if len <= 4 {
        "****".to_string()
    } else {
        let suffix: String = value.chars().skip(len - 4).collect();
        format!("{}{}", "*".repeat(len - 4), suffix)
    }
}

impl ConfigField {
    fn index(self) -> usize {
        match self {
            Self::RequestTimeout => 0,
            Self::LoadRetries => 1,
            Self::RetryBackoff => 2,
            Self::AnswerFeedback => 3,
            Self::AccessToken => 4,
        }
    }

    fn next(self) -> Self {
        match self {
            Self::RequestTimeout => Self::LoadRetries,
            Self::LoadRetries => Self::RetryBackoff,
            Self::RetryBackoff => Self::AnswerFeedback,
            Self::AnswerFeedback => Self::AccessToken,
            Self::AccessToken => Self::RequestTimeout,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::RequestTimeout => Self::AccessToken,
            Self::LoadRetries => Self::RequestTimeout,
            Self::RetryBackoff => Self::LoadRetries,
            Self::AnswerFeedback => Self::RetryBackoff,
            Self::AccessToken => Self::AnswerFeedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::SystemTime,
    };

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    fn temp_config_path() -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir()
            .join(format!(
                "exercise-runner-config-{}-{}",
                unique,
                NEXT_DIR.fetch_add(1, Ordering::SeqCst)
            ))
            .join("app_config.toml")
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config_from_path(&temp_config_path()).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.api_base_url, "http://localhost:5029/api");
        assert_eq!(config.request_policy().timeout, Duration::from_secs(30));
        assert_eq!(config.request_policy().load_retries, 1);
    }

    #[test]
    fn partial_file_is_filled_and_normalized() {
        let path = temp_config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "request_timeout_secs = 0\nload_retry_attempts = 40\nuser_id = \"learner-7\"\n",
        )
        .unwrap();

        let config = load_config_from_path(&path).unwrap();

        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.load_retry_attempts, 5);
        assert_eq!(config.user_id, "learner-7");
        assert!(config.show_answer_feedback);
    }

    #[test]
    fn saved_config_round_trips_through_disk() {
        let path = temp_config_path();
        let config = AppConfig {
            retry_backoff_ms: 250,
            show_answer_feedback: false,
            ..AppConfig::default()
        };

        save_config_to_path(&path, &config).unwrap();

        assert_eq!(load_config_from_path(&path).unwrap(), config);
    }

    #[test]
    fn invalid_toml_is_reported() {
        let path = temp_config_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "request_timeout_secs = \"soon\"").unwrap();

        let err = load_config_from_path(&path).unwrap_err();

        assert!(err.to_string().contains("failed to parse configuration"));
    }

    #[test]
    fn overrides_win_over_stored_values_but_blanks_are_ignored() {
        let stored = AppConfig {
            user_id: "stored-user".to_string(),
            ..AppConfig::default()
        };
        let overrides = Overrides {
            api_base_url: Some("https://lms.example.com/api".to_string()),
            user_id: Some("   ".to_string()),
            access_token: Some("token-123".to_string()),
        };

        let merged = stored.with_overrides(&overrides);

        assert_eq!(merged.api_base_url, "https://lms.example.com/api");
        assert_eq!(merged.user_id, "stored-user");
        assert_eq!(merged.access_token, "token-123");
        assert_eq!(stored.access_token, "");
    }

    #[test]
    fn form_adjustments_respect_bounds() {
        let mut form = ConfigForm::from_config(AppConfig {
            request_timeout_secs: 1,
            ..AppConfig::default()
        });

        form.adjust_current(-1);
        assert_eq!(form.request_timeout_secs, 1);
        assert!(!form.dirty);

        form.select_next();
        form.adjust_current(10);
        assert_eq!(form.load_retry_attempts, 5);

        form.select_next();
        form.adjust_current(-1);
        assert_eq!(form.retry_backoff_ms, 400);

        form.select_next();
        form.adjust_current(1);
        assert!(!form.show_answer_feedback);
        assert!(form.dirty);

        let mut config = AppConfig::default();
        form.apply_to(&mut config);
        assert_eq!(config.retry_backoff_ms, 400);
        assert!(!config.show_answer_feedback);
    }

    #[test]
    fn access_token_edit_is_masked_and_applied() {
        let mut form = ConfigForm::from_config(AppConfig::default());
        form.select_previous();
        assert!(form.is_access_token_selected());

        form.start_editing_access_token();
        for ch in "abcdef123".chars() {
            form.push_access_token_char(ch);
        }
        form.backspace_access_token();
        assert_eq!(form.masked_access_token_buffer(), "****ef12");

        form.apply_access_token_edit();
        assert_eq!(form.access_token, "abcdef12");
        assert!(form.dirty);
        assert_eq!(form.masked_access_token(), "****ef12");
    }
}
