//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development. A `.env` file is honoured when
//! present.

use std::fmt;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use chatterbox_bot::lookups::{
    DEFAULT_ENCYCLOPEDIA_API_URL, DEFAULT_NEWS_API_URL, DEFAULT_WEATHER_API_URL,
};
use chatterbox_bot::{LlmConfig, LookupConfig};
use chatterbox_shared::constants::{DEFAULT_HTTP_PORT, SYMMETRIC_KEY_SIZE};
use rand::RngCore;
use tracing::warn;

const IDLE_MINUTES: RangeInclusive<u64> = 1..=30 * 24 * 60;
const REMEMBER_DAYS: RangeInclusive<i64> = 1..=3650;
const RATE_PER_SEC: RangeInclusive<f64> = 0.0..=10_000.0;
const RATE_BURST: RangeInclusive<f64> = 1.0..=10_000.0;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Env: `HTTP_ADDR`, default `0.0.0.0:5000`.
    pub http_addr: SocketAddr,

    /// Env: `DATABASE_PATH`, default `./chatterbox.db`.
    pub database_path: PathBuf,

    /// JSON `{ "topic": ["answer", ...] }` imported into an empty
    /// knowledge base at startup.
    /// Env: `KNOWLEDGE_SEED_PATH`.
    pub knowledge_seed_path: Option<PathBuf>,

    /// Key material for remembered logins.
    /// Env: `SESSION_SECRET`. Random per process when unset, which means
    /// remember cookies do not survive a restart.
    pub session_secret: Vec<u8>,
    pub session_secret_generated: bool,

    /// Env: `SESSION_IDLE_MINUTES`, default 120, at most 30 days.
    pub session_idle: Duration,

    /// Env: `REMEMBER_DAYS`, default 30, between 1 and 3650.
    pub remember_days: i64,

    /// Env: `REGISTRATION_OPEN` (true/false), default true.
    pub registration_open: bool,

    /// Token-bucket refill rate and capacity for the chat routes.
    /// Env: `RATE_LIMIT_PER_SEC` (5), `RATE_LIMIT_BURST` (20).
    pub rate_limit_per_sec: f64,
    pub rate_limit_burst: f64,

    pub lookups: LookupConfig,

    /// `None` unless `LLM_API_KEY` is set.
    pub llm: Option<LlmConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./chatterbox.db"),
            knowledge_seed_path: None,
            session_secret: random_secret(),
            session_secret_generated: true,
            session_idle: Duration::from_secs(120 * 60),
            remember_days: 30,
            registration_open: true,
            rate_limit_per_sec: 5.0,
            rate_limit_burst: 20.0,
            lookups: LookupConfig::default(),
            llm: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through `var`, falling back to defaults for
    /// anything missing, blank or unparsable.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            var(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(addr) = parsed(&var, "HTTP_ADDR") {
            config.http_addr = addr;
        }
        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        config.knowledge_seed_path = var("KNOWLEDGE_SEED_PATH").map(PathBuf::from);

        if let Some(secret) = var("SESSION_SECRET") {
            config.session_secret = secret.into_bytes();
            config.session_secret_generated = false;
        }
        if let Some(minutes) = bounded(&var, "SESSION_IDLE_MINUTES", IDLE_MINUTES) {
            config.session_idle = Duration::from_secs(minutes * 60);
        }
        if let Some(days) = bounded(&var, "REMEMBER_DAYS", REMEMBER_DAYS) {
            config.remember_days = days;
        }
        if let Some(val) = var("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }
        if let Some(rate) = bounded(&var, "RATE_LIMIT_PER_SEC", RATE_PER_SEC) {
            config.rate_limit_per_sec = rate;
        }
        if let Some(burst) = bounded(&var, "RATE_LIMIT_BURST", RATE_BURST) {
            config.rate_limit_burst = burst;
        }

        let timeout = parsed::<u64>(&var, "LOOKUP_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(config.lookups.timeout);
        config.lookups = LookupConfig {
            timeout,
            weather_api_key: var("WEATHER_API_KEY"),
            weather_api_url: var("WEATHER_API_URL")
                .unwrap_or_else(|| DEFAULT_WEATHER_API_URL.to_string()),
            encyclopedia_api_url: var("ENCYCLOPEDIA_API_URL")
                .unwrap_or_else(|| DEFAULT_ENCYCLOPEDIA_API_URL.to_string()),
            news_api_key: var("NEWS_API_KEY"),
            news_api_url: var("NEWS_API_URL").unwrap_or_else(|| DEFAULT_NEWS_API_URL.to_string()),
            translate_api_url: var("TRANSLATE_API_URL"),
            translate_api_key: var("TRANSLATE_API_KEY"),
            task_webhook_url: var("TASK_WEBHOOK_URL"),
        };

        config.llm = LlmConfig::from_key(var("LLM_API_KEY")).map(|mut llm| {
            if let Some(url) = var("LLM_API_URL") {
                llm.api_url = url;
            }
            if let Some(model) = var("LLM_MODEL") {
                llm.model = model;
            }
            llm
        });

        config
    }
}

// Secrets stay out of logs: keys are reported as present or absent only.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("knowledge_seed_path", &self.knowledge_seed_path)
            .field("session_secret_generated", &self.session_secret_generated)
            .field("session_idle", &self.session_idle)
            .field("remember_days", &self.remember_days)
            .field("registration_open", &self.registration_open)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("lookup_timeout", &self.lookups.timeout)
            .field("weather", &self.lookups.weather_api_key.is_some())
            .field("news", &self.lookups.news_api_key.is_some())
            .field("translate", &self.lookups.translate_api_url.is_some())
            .field("tasks", &self.lookups.task_webhook_url.is_some())
            .field("llm_model", &self.llm.as_ref().map(|l| l.model.as_str()))
            .finish()
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = var(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// Like [`parsed`], but pulls out-of-range values back into `range`.
/// Anything that does not compare (NaN) lands on the lower bound.
fn bounded<T>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    range: RangeInclusive<T>,
) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Copy + fmt::Display,
{
    let value: T = parsed(var, name)?;
    let (low, high) = (*range.start(), *range.end());
    let clamped = if value > high {
        high
    } else if value >= low {
        value
    } else {
        low
    };
    if !range.contains(&value) {
        warn!(name, %value, %clamped, "Value out of range, clamped");
    }
    Some(clamped)
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0u8; SYMMETRIC_KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_vars(|name| map.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = from_map(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert_eq!(config.database_path, PathBuf::from("./chatterbox.db"));
        assert!(config.session_secret_generated);
        assert_eq!(config.session_secret.len(), SYMMETRIC_KEY_SIZE);
        assert_eq!(config.lookups.timeout, Duration::from_secs(5));
        assert!(config.lookups.weather_api_key.is_none());
        assert!(config.llm.is_none());
        assert!(config.registration_open);
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("HTTP_ADDR", "127.0.0.1:8081"),
            ("SESSION_SECRET", "s3cret"),
            ("REGISTRATION_OPEN", "false"),
            ("WEATHER_API_KEY", "abc"),
            ("LOOKUP_TIMEOUT_SECS", "2"),
            ("LLM_API_KEY", "sk-1"),
            ("LLM_MODEL", "tiny"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 8081).into());
        assert_eq!(config.session_secret, b"s3cret");
        assert!(!config.session_secret_generated);
        assert!(!config.registration_open);
        assert_eq!(config.lookups.weather_api_key.as_deref(), Some("abc"));
        assert_eq!(config.lookups.timeout, Duration::from_secs(2));
        assert_eq!(config.llm.as_ref().map(|l| l.model.as_str()), Some("tiny"));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_map(&[("HTTP_ADDR", "nope"), ("RATE_LIMIT_BURST", "lots"), ("WEATHER_API_KEY", "  ")]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert_eq!(config.rate_limit_burst, 20.0);
        assert!(config.lookups.weather_api_key.is_none());
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let config = from_map(&[
            ("REMEMBER_DAYS", "999999999999"),
            ("SESSION_IDLE_MINUTES", "18446744073709551"),
            ("RATE_LIMIT_PER_SEC", "NaN"),
            ("RATE_LIMIT_BURST", "-3"),
        ]);
        assert_eq!(config.remember_days, 3650);
        assert_eq!(config.session_idle, Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(config.rate_limit_per_sec, 0.0);
        assert_eq!(config.rate_limit_burst, 1.0);

        assert_eq!(from_map(&[("REMEMBER_DAYS", "-5")]).remember_days, 1);
        assert_eq!(from_map(&[("REMEMBER_DAYS", "7")]).remember_days, 7);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = from_map(&[("SESSION_SECRET", "hunter2"), ("WEATHER_API_KEY", "wkey")]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("wkey"));
    }
}
