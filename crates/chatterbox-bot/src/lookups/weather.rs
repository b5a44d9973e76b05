use serde::Deserialize;
use tracing::debug;

use super::{base, check_status, settle, Apologies, Lookups};
use crate::error::LookupError;

pub const WEATHER_NOT_CONFIGURED: &str =
    "Sorry, the weather service is unavailable: API key not configured.";
pub const WEATHER_UNAVAILABLE: &str =
    "Sorry, I couldn't fetch the weather right now. Please try again later.";
pub const WEATHER_NOT_FOUND: &str = "Sorry, I couldn't find the weather for that city.";

const APOLOGIES: Apologies = Apologies {
    not_configured: WEATHER_NOT_CONFIGURED,
    unavailable: WEATHER_UNAVAILABLE,
    not_found: WEATHER_NOT_FOUND,
};

#[derive(Deserialize)]
struct WeatherResponse {
    name: String,
    weather: Vec<Condition>,
    main: Readings,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

#[derive(Deserialize)]
struct Readings {
    temp: f64,
}

impl Lookups {
    /// Current conditions for `city` (OpenWeatherMap current-weather API).
    pub async fn weather(&self, city: &str) -> String {
        settle("weather", self.fetch_weather(city).await, &APOLOGIES)
    }

    async fn fetch_weather(&self, city: &str) -> Result<String, LookupError> {
        let key = self
            .config
            .weather_api_key
            .as_deref()
            .ok_or(LookupError::NotConfigured)?;
        let city = city.trim();
        if city.is_empty() {
            return Err(LookupError::Empty);
        }

        let url = format!("{}/data/2.5/weather", base(&self.config.weather_api_url));
        debug!(city, "fetching weather");

        let resp = self
            .client
            .get(&url)
            .query(&[("q", city), ("appid", key), ("units", "metric")])
            .send()
            .await?;
        let body: WeatherResponse = check_status(resp)?.json().await?;

        let description = body
            .weather
            .first()
            .map(|c| c.description.as_str())
            .ok_or_else(|| LookupError::Malformed("no weather conditions".into()))?;

        Ok(format!(
            "The weather in {} is {} with a temperature of {:.1}°C.",
            body.name, description, body.main.temp
        ))
    }
}
