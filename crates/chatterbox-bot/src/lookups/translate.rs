use serde::{Deserialize, Serialize};

use super::{base, check_status, settle, Apologies, Lookups};
use crate::error::LookupError;

pub const TRANSLATE_NOT_CONFIGURED: &str =
    "Sorry, the translation service is unavailable: API not configured.";
pub const TRANSLATE_UNAVAILABLE: &str = "Sorry, I couldn't translate that right now.";
pub const TRANSLATE_UNKNOWN_LANGUAGE: &str =
    "Sorry, I can't translate that. Try something like \"translate hello to Spanish\".";

const APOLOGIES: Apologies = Apologies {
    not_configured: TRANSLATE_NOT_CONFIGURED,
    unavailable: TRANSLATE_UNAVAILABLE,
    not_found: TRANSLATE_UNKNOWN_LANGUAGE,
};

const LANGUAGES: &[(&str, &str)] = &[
    ("arabic", "ar"),
    ("chinese", "zh"),
    ("dutch", "nl"),
    ("english", "en"),
    ("french", "fr"),
    ("german", "de"),
    ("hindi", "hi"),
    ("italian", "it"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("polish", "pl"),
    ("portuguese", "pt"),
    ("russian", "ru"),
    ("spanish", "es"),
    ("swedish", "sv"),
    ("turkish", "tr"),
];

/// ISO 639-1 code for a language name, or the input if it already is one.
pub fn language_code(language: &str) -> Option<&'static str> {
    let language = language.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|(name, code)| *name == language || *code == language)
        .map(|(_, code)| *code)
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'static str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

impl Lookups {
    /// Translate `text` into `language` (LibreTranslate-compatible API).
    pub async fn translate(&self, text: &str, language: &str) -> String {
        settle(
            "translate",
            self.fetch_translation(text, language).await,
            &APOLOGIES,
        )
    }

    async fn fetch_translation(&self, text: &str, language: &str) -> Result<String, LookupError> {
        let api = self
            .config
            .translate_api_url
            .as_deref()
            .map(base)
            .filter(|u| !u.is_empty())
            .ok_or(LookupError::NotConfigured)?;
        let target = language_code(language).ok_or(LookupError::Empty)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(LookupError::Empty);
        }

        let request = TranslateRequest {
            q: text,
            source: "auto",
            target,
            format: "text",
            api_key: self.config.translate_api_key.as_deref(),
        };
        let resp = self
            .client
            .post(format!("{api}/translate"))
            .json(&request)
            .send()
            .await?;
        let body: TranslateResponse = check_status(resp)?.json().await?;

        Ok(format!("Translation ({}): {}", target, body.translated_text))
    }
}
