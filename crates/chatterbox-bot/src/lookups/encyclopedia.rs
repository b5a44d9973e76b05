use serde::Deserialize;

use super::{base, check_status, settle, Apologies, Lookups};
use crate::error::LookupError;

pub const ENCYCLOPEDIA_UNAVAILABLE: &str =
    "Sorry, I couldn't reach the encyclopedia right now.";
pub const ENCYCLOPEDIA_NOT_FOUND: &str = "Sorry, I couldn't find anything about that.";

const APOLOGIES: Apologies = Apologies {
    // No key is needed, so a missing configuration only happens when the
    // URL is blank.
    not_configured: ENCYCLOPEDIA_UNAVAILABLE,
    unavailable: ENCYCLOPEDIA_UNAVAILABLE,
    not_found: ENCYCLOPEDIA_NOT_FOUND,
};

const MAX_SENTENCES: usize = 2;

#[derive(Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    extract: String,
}

impl Lookups {
    /// Short summary of `subject` from a Wikipedia-style REST API.
    pub async fn encyclopedia(&self, subject: &str) -> String {
        settle(
            "encyclopedia",
            self.fetch_summary(subject).await,
            &APOLOGIES,
        )
    }

    async fn fetch_summary(&self, subject: &str) -> Result<String, LookupError> {
        let api = base(&self.config.encyclopedia_api_url);
        if api.is_empty() {
            return Err(LookupError::NotConfigured);
        }
        let title = page_title(subject).ok_or(LookupError::Empty)?;

        let url = summary_url(api, &title)?;
        let resp = self.client.get(url).send().await?;
        let body: SummaryResponse = check_status(resp)?.json().await?;

        let snippet = first_sentences(&body.extract, MAX_SENTENCES);
        if snippet.is_empty() {
            return Err(LookupError::Empty);
        }
        Ok(snippet)
    }
}

/// Summary endpoint for `title`, which travels as one encoded path segment.
fn summary_url(api: &str, title: &str) -> Result<reqwest::Url, LookupError> {
    let mut url = reqwest::Url::parse(api).map_err(|e| LookupError::Endpoint(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| LookupError::Endpoint(format!("{api} cannot take a path")))?
        .pop_if_empty()
        .extend(["api", "rest_v1", "page", "summary"])
        .push(title);
    Ok(url)
}

/// `"alan turing"` -> `"Alan_turing"`; the API resolves the rest.
fn page_title(subject: &str) -> Option<String> {
    let words: Vec<&str> = subject.split_whitespace().collect();
    if !words.iter().any(|w| w.chars().any(char::is_alphanumeric)) {
        return None;
    }
    let joined = words.join("_");
    let mut chars = joined.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

fn first_sentences(text: &str, count: usize) -> String {
    let mut out = String::new();
    let mut seen = 0;
    for piece in text.split_inclusive(". ") {
        out.push_str(piece);
        seen += 1;
        if seen == count {
            break;
        }
    }
    out.trim().to_string()
}
