use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{PinVerifier, SupabasePinVerifier};
use crate::menu::source::{supabase_client, HttpMenuSource, MenuSource, SupabaseMenuSource};
use crate::orders::{OrderSubmitter, SubmitPolicy};
use crate::retrieve::ky_http::{ApiClient, ClientOptions, FetchError, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS};
use crate::utils::misc::sys_info;
use crate::utils::misc::utils::mask_secret;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "pos_terminal.conf";
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:4000";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_LOG_DIR: &str = "./logs";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_COMPANY_NAME: &str = "Yurica";

pub const SUPABASE_URL_ENV: &str = "EXPO_PUBLIC_SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "EXPO_PUBLIC_SUPABASE_ANON_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing ENV: {0}")]
    MissingSetting(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Cannot build client: {0}")]
    Client(#[from] FetchError),
}

/// Where the menu comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MenuSourceKind {
    /// The custom menu server at `apiBase`.
    #[default]
    Http,
    /// The hosted `menus` table.
    Supabase,
}

/// Terminal settings. Every field is optional so file, environment and CLI
/// layers can be merged; accessors fill in the defaults.
#[derive(Args, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PosConfig {
    #[arg(long, env = "POS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, env = "POS_API_BASE", help = "Base URL of the menu/events server.")]
    pub api_base: Option<String>,

    #[arg(long, env = "POS_MENU_SOURCE", value_enum, help = "Menu backend: http or supabase.")]
    pub menu_source: Option<MenuSourceKind>,

    #[arg(long, env = SUPABASE_URL_ENV, help = "Hosted database URL.")]
    pub supabase_url: Option<String>,

    #[arg(long, env = SUPABASE_ANON_KEY_ENV, hide_env_values = true, help = "Hosted database anon key.")]
    pub supabase_anon_key: Option<String>,

    #[arg(long, env = "POS_FETCH_TIMEOUT_MS", help = "Deadline for each remote call in milliseconds.")]
    pub fetch_timeout_ms: Option<u64>,

    #[arg(long, env = "POS_REFRESH_INTERVAL_SECS", help = "Seconds between automatic menu refreshes.")]
    pub refresh_interval_secs: Option<u64>,

    #[arg(long, env = "POS_MAX_RETRIES", help = "Transient-failure retries inside the deadline.")]
    pub max_retries: Option<u32>,

    #[arg(long, env = "POS_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "POS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[arg(long, env = "POS_COMPANY_NAME", help = "Company name stamped on orders.")]
    pub company_name: Option<String>,

    #[arg(long, env = "POS_DEVICE_ID", help = "Device id stamped on orders. Defaults to the host name.")]
    pub device_id: Option<String>,

    #[arg(long, env = "POS_SUBMIT_POLICY", value_enum, help = "When to clear the cart: confirm or optimistic.")]
    pub submit_policy: Option<SubmitPolicy>,
}

impl PosConfig {
    /// Built-in defaults.
    pub fn defaults() -> Self {
        PosConfig {
            api_base: Some(DEFAULT_API_BASE.to_string()),
            menu_source: Some(MenuSourceKind::Http),
            fetch_timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            refresh_interval_secs: Some(DEFAULT_REFRESH_INTERVAL_SECS),
            max_retries: Some(DEFAULT_MAX_RETRIES),
            log_dir: Some(PathBuf::from(DEFAULT_LOG_DIR)),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            company_name: Some(DEFAULT_COMPANY_NAME.to_string()),
            submit_policy: Some(SubmitPolicy::ConfirmThenClear),
            ..Default::default()
        }
    }

    // Merge two configs, where 'other' overrides 'self' for Some values
    pub fn merge(self, other: PosConfig) -> PosConfig {
        PosConfig {
            config_path: other.config_path.or(self.config_path),
            api_base: other.api_base.or(self.api_base),
            menu_source: other.menu_source.or(self.menu_source),
            supabase_url: other.supabase_url.or(self.supabase_url),
            supabase_anon_key: other.supabase_anon_key.or(self.supabase_anon_key),
            fetch_timeout_ms: other.fetch_timeout_ms.or(self.fetch_timeout_ms),
            refresh_interval_secs: other.refresh_interval_secs.or(self.refresh_interval_secs),
            max_retries: other.max_retries.or(self.max_retries),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            company_name: other.company_name.or(self.company_name),
            device_id: other.device_id.or(self.device_id),
            submit_policy: other.submit_policy.or(self.submit_policy),
        }
    }

    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn menu_source(&self) -> MenuSourceKind {
        self.menu_source.unwrap_or_default()
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn company_name(&self) -> &str {
        self.company_name.as_deref().unwrap_or(DEFAULT_COMPANY_NAME)
    }

    pub fn device_id(&self) -> String {
        self.device_id.clone().unwrap_or_else(sys_info::device_id)
    }

    pub fn submit_policy(&self) -> SubmitPolicy {
        self.submit_policy.unwrap_or_default()
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.fetch_timeout(),
            max_retries: self.max_retries(),
            ..Default::default()
        }
    }

    /// Options for clients that only POST. Those requests are not idempotent
    /// (an order event or a PIN check) so they are never retried.
    pub fn post_options(&self) -> ClientOptions {
        ClientOptions {
            max_retries: 0,
            ..self.client_options()
        }
    }

    /// URL and anon key of the hosted database, both required.
    pub fn supabase_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let url = self
            .supabase_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSetting(SUPABASE_URL_ENV.to_string()))?;
        let key = self
            .supabase_anon_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingSetting(SUPABASE_ANON_KEY_ENV.to_string()))?;
        Ok((url, key))
    }

    /// Rejects values that would make the terminal misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "fetchTimeoutMs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.refresh_interval_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "refreshIntervalSecs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if let Some(level) = &self.log_level {
            if crate::loggers::logger::parse_level(level).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: "logLevel".into(),
                    reason: format!("unknown level '{}'", level),
                });
            }
        }
        Ok(())
    }

    /// Client for the menu/events server.
    pub fn build_api_client(&self) -> Result<Arc<ApiClient>, ConfigError> {
        Ok(Arc::new(ApiClient::new(self.api_base(), self.client_options())?))
    }

    /// Client for the hosted database.
    pub fn build_supabase_client(&self) -> Result<Arc<ApiClient>, ConfigError> {
        let (url, key) = self.supabase_credentials()?;
        Ok(Arc::new(supabase_client(url, key, self.client_options())?))
    }

    /// The configured menu backend.
    pub fn build_menu_source(&self) -> Result<Arc<dyn MenuSource>, ConfigError> {
        let source: Arc<dyn MenuSource> = match self.menu_source() {
            MenuSourceKind::Http => Arc::new(HttpMenuSource::new(self.build_api_client()?)),
            MenuSourceKind::Supabase => Arc::new(SupabaseMenuSource::new(self.build_supabase_client()?)),
        };
        Ok(source)
    }

    pub fn build_pin_verifier(&self) -> Result<Arc<dyn PinVerifier>, ConfigError> {
        let (url, key) = self.supabase_credentials()?;
        let client = supabase_client(url, key, self.post_options())?;
        Ok(Arc::new(SupabasePinVerifier::new(Arc::new(client))))
    }

    pub fn build_order_submitter(&self) -> Result<OrderSubmitter, ConfigError> {
        Ok(OrderSubmitter::new(
            Arc::new(ApiClient::new(self.api_base(), self.post_options())?),
            self.company_name(),
            self.device_id(),
            self.submit_policy(),
        ))
    }
}

impl fmt::Display for PosConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PosConfig
    Api base: {},
    Menu source: {:?},
    Supabase url: {},
    Supabase anon key: {},
    Fetch timeout: {}ms,
    Refresh interval: {}s,
    Max retries: {},
    Log dir: {},
    Log level: {},
    Company: {},
    Submit policy: {:?}
",
            self.api_base(),
            self.menu_source(),
            mask_secret(self.supabase_url.as_deref()),
            mask_secret(self.supabase_anon_key.as_deref()),
            self.fetch_timeout().as_millis(),
            self.refresh_interval().as_secs(),
            self.max_retries(),
            self.log_dir().display(),
            self.log_level(),
            self.company_name(),
            self.submit_policy(),
        )
    }
}

/// Reads a JSON config file. `Ok(None)` when the file does not exist.
pub fn load_config_file(path: &Path) -> Result<Option<PosConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = serde_json::from_str::<PosConfig>(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(parsed))
}

/// Something noticed while resolving the configuration. Resolution runs
/// before the logger exists, so these are handed back for the caller to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNote {
    Info(String),
    Warn(String),
}

impl ConfigNote {
    pub fn message(&self) -> &str {
        match self {
            ConfigNote::Info(m) | ConfigNote::Warn(m) => m,
        }
    }

    pub fn log(&self) {
        match self {
            ConfigNote::Info(m) => log::info!("{}", m),
            ConfigNote::Warn(m) => log::warn!("{}", m),
        }
    }
}

/// Resolves the effective configuration and logs any notes right away.
///
/// Use [`resolve_config_with_notes`] when no logger is installed yet.
pub fn resolve_config(cli: PosConfig) -> Result<PosConfig, ConfigError> {
    let (config, notes) = resolve_config_with_notes(cli)?;
    for note in &notes {
        note.log();
    }
    Ok(config)
}

/// Resolves the effective configuration.
///
/// Layers, lowest first: built-in defaults, the JSON config file, then
/// `cli` (which clap already filled from flags and environment). A config
/// path given explicitly must exist and parse; the default file is optional
/// and a broken one is skipped with a warning note.
pub fn resolve_config_with_notes(cli: PosConfig) -> Result<(PosConfig, Vec<ConfigNote>), ConfigError> {
    let mut notes = Vec::new();
    let mut current = PosConfig::defaults();

    match &cli.config_path {
        Some(path) => match load_config_file(path)? {
            Some(file) => current = current.merge(file),
            None => {
                return Err(ConfigError::Io {
                    path: path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
                })
            }
        },
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            match load_config_file(&path) {
                Ok(Some(file)) => current = current.merge(file),
                Ok(None) => notes.push(ConfigNote::Info(format!(
                    "Config file not found at {}. Using defaults and environment/CLI variables.",
                    path.display()
                ))),
                Err(e) => notes.push(ConfigNote::Warn(format!("{}. Falling back to other sources.", e))),
            }
        }
    }

    current = current.merge(cli);
    current.validate()?;
    Ok((current, notes))
}
