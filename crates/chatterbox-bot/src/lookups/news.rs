use serde::Deserialize;

use super::{base, check_status, settle, Apologies, Lookups};
use crate::error::LookupError;

pub const NEWS_NOT_CONFIGURED: &str =
    "Sorry, the news service is unavailable: API key not configured.";
pub const NEWS_UNAVAILABLE: &str = "Sorry, I couldn't fetch the news right now.";
pub const NEWS_NOT_FOUND: &str = "Sorry, I couldn't find any news about that.";

const APOLOGIES: Apologies = Apologies {
    not_configured: NEWS_NOT_CONFIGURED,
    unavailable: NEWS_UNAVAILABLE,
    not_found: NEWS_NOT_FOUND,
};

const PAGE_SIZE: &str = "3";

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    title: Option<String>,
}

impl Lookups {
    /// Latest headlines, about `topic` when one is given (NewsAPI).
    pub async fn news(&self, topic: Option<&str>) -> String {
        settle("news", self.fetch_news(topic).await, &APOLOGIES)
    }

    async fn fetch_news(&self, topic: Option<&str>) -> Result<String, LookupError> {
        let key = self
            .config
            .news_api_key
            .as_deref()
            .ok_or(LookupError::NotConfigured)?;
        let api = base(&self.config.news_api_url);

        let request = match topic.map(str::trim).filter(|t| !t.is_empty()) {
            Some(topic) => self.client.get(format!("{api}/v2/everything")).query(&[
                ("q", topic),
                ("pageSize", PAGE_SIZE),
                ("sortBy", "publishedAt"),
                ("apiKey", key),
            ]),
            None => self.client.get(format!("{api}/v2/top-headlines")).query(&[
                ("country", "us"),
                ("pageSize", PAGE_SIZE),
                ("apiKey", key),
            ]),
        };

        let body: NewsResponse = check_status(request.send().await?)?.json().await?;

        let titles: Vec<String> = body
            .articles
            .into_iter()
            .filter_map(|a| a.title)
            .filter(|t| !t.trim().is_empty())
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, t.trim()))
            .collect();
        if titles.is_empty() {
            return Err(LookupError::Empty);
        }

        Ok(format!("Here are the latest headlines: {}", titles.join(" ")))
    }
}
