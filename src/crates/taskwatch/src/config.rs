//! Polling parameters and client configuration.
//!
//! Sources, later overriding earlier:
//! 1. Defaults
//! 2. Config file (YAML or JSON)
//! 3. Named poll preset, when one is selected
//! 4. `TASKWATCH_*` environment variables
//!
//! The command-line adapter applies its flags on top.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use utils::client::ClientConfig;
use utils::config::{get_env_opt, get_env_parse_opt, load_config_file};

/// Interval used by the analysis call sites.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Interval used by the upload call sites.
pub const UPLOAD_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Attempt budget used by the upload call sites (5 minutes at 5 s).
pub const UPLOAD_MAX_ATTEMPTS: u32 = 60;

pub const ENV_BASE_URL: &str = "TASKWATCH_BASE_URL";
pub const ENV_CSRF_TOKEN: &str = "TASKWATCH_CSRF_TOKEN";
pub const ENV_COOKIE: &str = "TASKWATCH_COOKIE";
pub const ENV_INTERVAL_MS: &str = "TASKWATCH_INTERVAL_MS";
pub const ENV_MAX_ATTEMPTS: &str = "TASKWATCH_MAX_ATTEMPTS";

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

fn default_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

/// How often to poll and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay before each status check.
    #[serde(rename = "interval_ms", with = "duration_ms", default = "default_interval")]
    pub interval: Duration,

    /// Maximum number of status checks; `None` polls until a terminal answer.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Dataset audit and AI analysis: every 2 s, no budget.
    pub fn analysis() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }

    /// Dataset upload and generic task launches: every 5 s, 60 checks.
    pub fn upload() -> Self {
        Self::new(UPLOAD_POLL_INTERVAL).with_max_attempts(UPLOAD_MAX_ATTEMPTS)
    }

    /// Look up a built-in preset by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "analysis" | "audit" | "ia" => Some(Self::analysis()),
            "upload" | "task" => Some(Self::upload()),
            _ => None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Whether `attempts` checks use up the budget.
    pub fn budget_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.map(|max| attempts >= max).unwrap_or(false)
    }

    /// Longest a session can poll, when bounded.
    pub fn ceiling(&self) -> Option<Duration> {
        self.max_attempts.map(|max| self.interval * max)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::analysis()
    }
}

/// Client-side configuration for talking to the task endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskwatchConfig {
    /// Prefix for relative task URLs, e.g. `http://localhost:8000`.
    pub base_url: Option<String>,

    /// CSRF token sent as `X-CSRFToken` on launches.
    pub csrf_token: Option<String>,

    /// Raw `Cookie` header (session and `csrftoken` cookies).
    pub cookie: Option<String>,

    pub user_agent: Option<String>,

    pub request_timeout_secs: u64,

    /// Polling used when no preset is named.
    pub poll: PollConfig,

    /// Named polling presets; these shadow the built-in ones.
    pub presets: BTreeMap<String, PollConfig>,
}

impl Default for TaskwatchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            csrf_token: None,
            cookie: None,
            user_agent: Some(format!("taskwatch/{}", env!("CARGO_PKG_VERSION"))),
            request_timeout_secs: 30,
            poll: PollConfig::default(),
            presets: BTreeMap::new(),
        }
    }
}

impl TaskwatchConfig {
    /// Defaults, then the file when given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_preset(path, None)
    }

    /// Like [`load`](Self::load), with a named preset replacing `poll`
    /// before environment overrides are applied.
    pub fn load_with_preset(
        path: Option<&Path>,
        preset: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(name) = preset {
            config.poll = config.preset(name)?;
            debug!(preset = name, poll = ?config.poll, "Selected poll preset");
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_config_file(path)?;
        debug!(path = %path.display(), "Loaded taskwatch config");
        Ok(config)
    }

    /// Override fields from `TASKWATCH_*` variables that are set.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(base_url) = get_env_opt(ENV_BASE_URL) {
            self.base_url = Some(base_url);
        }
        if let Some(token) = get_env_opt(ENV_CSRF_TOKEN) {
            self.csrf_token = Some(token);
        }
        if let Some(cookie) = get_env_opt(ENV_COOKIE) {
            self.cookie = Some(cookie);
        }
        if let Some(ms) = get_env_parse_opt::<u64>(ENV_INTERVAL_MS)? {
            self.poll.interval = Duration::from_millis(ms);
        }
        if let Some(max) = get_env_parse_opt::<u32>(ENV_MAX_ATTEMPTS)? {
            self.poll.max_attempts = Some(max);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.poll.validate()?;
        for (name, preset) in &self.presets {
            preset
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("preset '{}': {}", name, e)))?;
        }
        Ok(())
    }

    /// Polling for a named preset: configured presets first, then built-ins.
    pub fn preset(&self, name: &str) -> Result<PollConfig, ConfigError> {
        self.presets
            .get(name)
            .copied()
            .or_else(|| PollConfig::builtin(name))
            .ok_or_else(|| ConfigError::Invalid(format!("unknown poll preset '{}'", name)))
    }

    /// HTTP client settings derived from this configuration.
    pub fn client_config(&self) -> ClientConfig {
        let mut client =
            ClientConfig::new().with_timeout(Duration::from_secs(self.request_timeout_secs));
        if let Some(user_agent) = &self.user_agent {
            client = client.with_user_agent(user_agent);
        }
        if let Some(cookie) = &self.cookie {
            client = client.with_cookie_header(cookie);
        }
        if let Some(token) = &self.csrf_token {
            client = client.with_csrf_token(token);
        }
        client
    }

    /// Turn a task URL into an absolute one.
    ///
    /// Absolute URLs pass through. Relative ones are appended to `base_url`.
    pub fn resolve_url(&self, url: &str) -> Result<String, ConfigError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }

        let base = self.base_url.as_deref().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "relative URL '{}' needs a base_url (set {} or --base-url)",
                url, ENV_BASE_URL
            ))
        })?;

        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ))
    }
}
