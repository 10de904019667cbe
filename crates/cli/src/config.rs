//! `stockwatch` configuration: an optional TOML file overlaid by environment.
//!
//! # Example
//!
//! ```toml
//! [pipeline]
//! threshold = 5
//! store_name = "Salon Store"
//! fallback_recipients = ["ops@salon.example"]
//!
//! [mail]
//! from = "alerts@salon.example"
//! relay_url = "https://relay.salon.example/send"
//! relay_key = "rk_live_..."
//!
//! [dispatch]
//! max_in_flight = 16
//! task_deadline_secs = 60
//!
//! [server]
//! setup_secret = "change-me"
//!
//! [[admins]]
//! token = "tok-ops"
//! uid = "uid-ops"
//! email = "ops@salon.example"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use stockwatch_pipeline::config::{DEFAULT_MAIL_FROM, DEFAULT_STORE_NAME};
use stockwatch_pipeline::notifier::relay::HttpRelayTransport;
use stockwatch_pipeline::recipients::parse_recipient_list;
use stockwatch_pipeline::{
    DispatchConfig, MailTransport, PipelineConfig, DEFAULT_LOW_STOCK_THRESHOLD,
};

pub(crate) const ENV_THRESHOLD: &str = "STOCKWATCH_LOW_STOCK_THRESHOLD";
pub(crate) const ENV_MAIL_FROM: &str = "STOCKWATCH_ALERT_EMAIL_FROM";
pub(crate) const ENV_MAIL_TO: &str = "STOCKWATCH_ALERT_EMAIL_TO";
pub(crate) const ENV_RELAY_URL: &str = "STOCKWATCH_MAIL_RELAY_URL";
pub(crate) const ENV_RELAY_KEY: &str = "STOCKWATCH_MAIL_RELAY_KEY";
pub(crate) const ENV_SETUP_SECRET: &str = "STOCKWATCH_SETUP_SECRET";
pub(crate) const ENV_STORE_NAME: &str = "STOCKWATCH_STORE_NAME";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StockwatchConfig {
    pub(crate) pipeline: PipelineSection,
    pub(crate) mail: MailSection,
    pub(crate) dispatch: DispatchSection,
    pub(crate) server: ServerSection,
    pub(crate) admins: Vec<AdminEntry>,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PipelineSection {
    pub(crate) threshold: i64,
    pub(crate) store_name: String,
    pub(crate) fallback_recipients: Vec<String>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            store_name: DEFAULT_STORE_NAME.to_string(),
            fallback_recipients: Vec::new(),
        }
    }
}

/// `[mail]` section. Without `relay_url` no transport is configured and
/// every notification is skipped.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct MailSection {
    pub(crate) from: String,
    pub(crate) relay_url: Option<String>,
    pub(crate) relay_key: Option<String>,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            from: DEFAULT_MAIL_FROM.to_string(),
            relay_url: None,
            relay_key: None,
        }
    }
}

/// `[dispatch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DispatchSection {
    pub(crate) max_in_flight: usize,
    pub(crate) task_deadline_secs: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        let defaults = DispatchConfig::default();
        Self {
            max_in_flight: defaults.max_in_flight,
            task_deadline_secs: defaults.task_deadline.as_secs(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ServerSection {
    /// Shared secret for `POST /admin/grant`. Unset disables the endpoint.
    pub(crate) setup_secret: Option<String>,
}

/// One `[[admins]]` entry: a bearer token and the identity it stands for.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct AdminEntry {
    pub(crate) token: String,
    pub(crate) uid: String,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default = "default_admin")]
    pub(crate) admin: bool,
}

fn default_admin() -> bool {
    true
}

impl StockwatchConfig {
    /// Load from `path` (if any), then apply environment overrides.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from `lookup` (normally the process environment) and
    /// validate the result. Blank values are ignored.
    pub(crate) fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_THRESHOLD) {
            self.pipeline.threshold = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_THRESHOLD.to_string(),
                value: raw.clone(),
            })?;
        }
        if let Some(from) = get(ENV_MAIL_FROM) {
            self.mail.from = from;
        }
        if let Some(csv) = get(ENV_MAIL_TO) {
            self.pipeline.fallback_recipients = parse_recipient_list(&csv);
        }
        if let Some(url) = get(ENV_RELAY_URL) {
            self.mail.relay_url = Some(url);
        }
        if let Some(key) = get(ENV_RELAY_KEY) {
            self.mail.relay_key = Some(key);
        }
        if let Some(secret) = get(ENV_SETUP_SECRET) {
            self.server.setup_secret = Some(secret);
        }
        if let Some(name) = get(ENV_STORE_NAME) {
            self.pipeline.store_name = name;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.threshold < 1 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.threshold must be at least 1, got {}",
                self.pipeline.threshold
            )));
        }
        if self.dispatch.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.dispatch.task_deadline_secs == 0 {
            return Err(ConfigError::Invalid(
                "dispatch.task_deadline_secs must be at least 1".to_string(),
            ));
        }
        if let Some(entry) = self.admins.iter().find(|a| a.token.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "admin '{}' has an empty token",
                entry.uid
            )));
        }
        Ok(())
    }

    pub(crate) fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            low_stock_threshold: self.pipeline.threshold,
            store_name: self.pipeline.store_name.clone(),
            mail_from: self.mail.from.clone(),
            fallback_recipients: self
                .pipeline
                .fallback_recipients
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        }
    }

    pub(crate) fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_in_flight: self.dispatch.max_in_flight,
            task_deadline: Duration::from_secs(self.dispatch.task_deadline_secs),
        }
    }

    /// The mail transport, if a relay URL is configured.
    pub(crate) fn transport(&self) -> Option<Arc<dyn MailTransport>> {
        let url = self.mail.relay_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        let transport: Arc<dyn MailTransport> =
            Arc::new(HttpRelayTransport::new(url, self.mail.relay_key.clone()));
        Some(transport)
    }
}
