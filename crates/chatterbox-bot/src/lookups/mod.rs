//! External lookup adapters.
//!
//! Each adapter is a method on [`Lookups`] that returns the text to show the
//! user and never fails. Missing configuration short-circuits before any
//! network traffic; network errors, timeouts, non-success statuses and
//! unexpected payloads are logged at error level and replaced by the
//! adapter's apology. Nothing is retried.

mod clock;
mod encyclopedia;
mod news;
mod tasks;
mod translate;
mod weather;

use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use crate::error::LookupError;

pub use clock::current_time_reply;
pub use encyclopedia::{ENCYCLOPEDIA_NOT_FOUND, ENCYCLOPEDIA_UNAVAILABLE};
pub use news::{NEWS_NOT_CONFIGURED, NEWS_UNAVAILABLE};
pub use tasks::{TASK_NOT_CONFIGURED, TASK_UNAVAILABLE};
pub use translate::{language_code, TRANSLATE_NOT_CONFIGURED, TRANSLATE_UNAVAILABLE};
pub use weather::{WEATHER_NOT_CONFIGURED, WEATHER_NOT_FOUND, WEATHER_UNAVAILABLE};

pub const DEFAULT_WEATHER_API_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_ENCYCLOPEDIA_API_URL: &str = "https://en.wikipedia.org";
pub const DEFAULT_NEWS_API_URL: &str = "https://newsapi.org";

/// Endpoints and credentials for the adapters. Everything except the
/// timeout is optional in practice: an absent key disables its adapter.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    /// Per-call budget, connect plus response.
    pub timeout: Duration,
    pub weather_api_key: Option<String>,
    pub weather_api_url: String,
    pub encyclopedia_api_url: String,
    pub news_api_key: Option<String>,
    pub news_api_url: String,
    /// LibreTranslate-compatible endpoint.
    pub translate_api_url: Option<String>,
    pub translate_api_key: Option<String>,
    /// Receives a JSON POST per scheduled task.
    pub task_webhook_url: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            weather_api_key: None,
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
            encyclopedia_api_url: DEFAULT_ENCYCLOPEDIA_API_URL.to_string(),
            news_api_key: None,
            news_api_url: DEFAULT_NEWS_API_URL.to_string(),
            translate_api_url: None,
            translate_api_key: None,
            task_webhook_url: None,
        }
    }
}

/// Shared HTTP client plus configuration for every adapter.
#[derive(Clone)]
pub struct Lookups {
    client: reqwest::Client,
    config: Arc<LookupConfig>,
}

impl Lookups {
    pub fn new(config: LookupConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("chatterbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            config: Arc::new(config),
        }
    }
}

/// User-facing replies for the ways an adapter can fail.
pub(crate) struct Apologies {
    pub not_configured: &'static str,
    pub unavailable: &'static str,
    pub not_found: &'static str,
}

/// Turn an adapter result into the reply, logging every failure.
pub(crate) fn settle(
    service: &'static str,
    result: Result<String, LookupError>,
    apologies: &Apologies,
) -> String {
    match result {
        Ok(reply) => reply,
        Err(LookupError::NotConfigured) => {
            error!(service, "lookup not configured");
            apologies.not_configured.to_string()
        }
        Err(e) if is_not_found(&e) => {
            error!(service, error = %e, "lookup found nothing");
            apologies.not_found.to_string()
        }
        Err(e) => {
            error!(service, error = %e, "lookup failed");
            apologies.unavailable.to_string()
        }
    }
}

fn is_not_found(e: &LookupError) -> bool {
    match e {
        LookupError::Empty => true,
        LookupError::Status(status) => *status == reqwest::StatusCode::NOT_FOUND,
        _ => false,
    }
}

/// Trim a configured base URL so paths can be appended with `/`.
pub(crate) fn base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Fail with [`LookupError::Status`] unless the response is a success.
pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LookupError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(LookupError::Status(status))
    }
}
