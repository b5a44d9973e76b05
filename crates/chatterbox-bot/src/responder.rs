//! The reply pipeline.
//!
//! [`Responder::resolve`] is total: every stage either produces a reply or
//! declines, and the last stage always produces one. Stages run in a fixed
//! order and the first reply wins.

use tracing::{debug, error};

use crate::intents::{self, Trigger};
use crate::knowledge::KnowledgeBase;
use crate::llm::LlmClient;
use crate::lookups::Lookups;

/// Who is asking.
#[derive(Debug, Clone)]
pub struct ReplyContext {
    pub username: String,
}

impl ReplyContext {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

#[derive(Clone)]
pub struct Responder {
    knowledge: KnowledgeBase,
    lookups: Lookups,
    llm: Option<LlmClient>,
}

impl Responder {
    pub fn new(knowledge: KnowledgeBase, lookups: Lookups, llm: Option<LlmClient>) -> Self {
        Self {
            knowledge,
            lookups,
            llm,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Reply to `message`.
    pub async fn resolve(&self, message: &str, ctx: &ReplyContext) -> String {
        let message = message.trim();
        if message.is_empty() {
            return intents::EMPTY_MESSAGE_REPLY.to_string();
        }

        if let Some(trigger) = intents::detect_trigger(message) {
            debug!(user = %ctx.username, ?trigger, "dispatching to lookup");
            return self.dispatch(trigger, message, ctx).await;
        }

        match self.knowledge.lookup(message).await {
            Ok(Some(answer)) => return answer,
            Ok(None) => {}
            Err(e) => error!(error = %e, "knowledge lookup failed"),
        }

        if message.contains('?') {
            return intents::TEACH_ME_REPLY.to_string();
        }

        if let Some(reply) = intents::small_talk(message) {
            return reply.to_string();
        }

        if let Some(noun) = intents::find_noun(message) {
            return intents::noun_echo(&noun);
        }

        if let Some(llm) = &self.llm {
            if let Some(reply) = llm.complete(message).await {
                return reply;
            }
        }

        intents::filler().to_string()
    }

    async fn dispatch(&self, trigger: Trigger, message: &str, ctx: &ReplyContext) -> String {
        match trigger {
            Trigger::Weather { city } => self.lookups.weather(&city).await,
            Trigger::News { topic } => self.lookups.news(topic.as_deref()).await,
            Trigger::Time => self.lookups.current_time(),
            Trigger::Translate { text, language } => {
                self.lookups.translate(&text, &language).await
            }
            Trigger::Task => self.lookups.schedule_task(&ctx.username, message).await,
            Trigger::Trivia { subject } => self.lookups.encyclopedia(&subject).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intents::{FILLER_REPLIES, GREETING_REPLIES};
    use crate::llm::LlmConfig;
    use crate::lookups::test_support::config_for;
    use crate::lookups::{LookupConfig, WEATHER_NOT_CONFIGURED};
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn responder(config: LookupConfig) -> (Responder, TempDir) {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::new(dir.path().join("bot.db"));
        (Responder::new(kb, Lookups::new(config), None), dir)
    }

    fn alice() -> ReplyContext {
        ReplyContext::new("alice")
    }

    #[tokio::test]
    async fn test_empty_message() {
        let (r, _dir) = responder(LookupConfig::default());
        assert_eq!(r.resolve("   ", &alice()).await, intents::EMPTY_MESSAGE_REPLY);
    }

    #[tokio::test]
    async fn test_greeting() {
        let (r, _dir) = responder(LookupConfig::default());
        let reply = r.resolve("hello", &alice()).await;
        assert!(GREETING_REPLIES.contains(&reply.as_str()));
    }

    #[tokio::test]
    async fn test_unconfigured_weather_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (r, _dir) = responder(LookupConfig {
            weather_api_key: None,
            ..config_for(&server.uri())
        });
        assert_eq!(
            r.resolve("weather in London", &alice()).await,
            WEATHER_NOT_CONFIGURED
        );
    }

    #[tokio::test]
    async fn test_weather_beats_knowledge() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "London",
                "weather": [{"description": "light rain"}],
                "main": {"temp": 11.0}
            })))
            .mount(&server)
            .await;

        let (r, _dir) = responder(config_for(&server.uri()));
        r.knowledge()
            .learn("what is the weather in london?", "Always sunny")
            .await
            .unwrap();

        assert_eq!(
            r.resolve("What is the weather in London?", &alice()).await,
            "The weather in London is light rain with a temperature of 11.0°C."
        );
    }

    #[tokio::test]
    async fn test_learn_then_ask() {
        let (r, _dir) = responder(LookupConfig::default());
        r.knowledge().learn("What is X?", "Y").await.unwrap();
        assert_eq!(r.resolve("what is x", &alice()).await, "Y");
        assert_eq!(r.resolve("What is X?", &alice()).await, "Y");
    }

    #[tokio::test]
    async fn test_topic_inside_longer_word_matches() {
        let (r, _dir) = responder(LookupConfig::default());
        r.knowledge().learn("python?", "A language").await.unwrap();
        assert_eq!(
            r.resolve("do you know pythonic code?", &alice()).await,
            "A language"
        );
    }

    #[tokio::test]
    async fn test_unknown_question_asks_to_be_taught() {
        let (r, _dir) = responder(LookupConfig::default());
        assert_eq!(
            r.resolve("What is the capital of Mars?", &alice()).await,
            intents::TEACH_ME_REPLY
        );
    }

    #[tokio::test]
    async fn test_noun_echo_then_filler() {
        let (r, _dir) = responder(LookupConfig::default());
        assert_eq!(
            r.resolve("I love Paris", &alice()).await,
            "Tell me more about Paris."
        );
        let reply = r.resolve("maybe later", &alice()).await;
        assert!(FILLER_REPLIES.contains(&reply.as_str()));
    }

    #[tokio::test]
    async fn test_llm_before_filler() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "Sounds good."}}]
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let llm = LlmClient::new(LlmConfig {
            api_url: server.uri(),
            timeout: Duration::from_secs(2),
            ..LlmConfig::from_key(Some("k".into())).unwrap()
        });
        let r = Responder::new(
            KnowledgeBase::new(dir.path().join("bot.db")),
            Lookups::new(LookupConfig::default()),
            Some(llm),
        );
        assert_eq!(r.resolve("maybe later", &alice()).await, "Sounds good.");
    }

    #[tokio::test]
    async fn test_task_uses_message_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/tasks"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "user": "alice",
                "task": "schedule a call with Sam"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (r, _dir) = responder(config_for(&server.uri()));
        assert_eq!(
            r.resolve("schedule a call with Sam", &alice()).await,
            "Done! I've scheduled your task: schedule a call with Sam"
        );
    }
}
