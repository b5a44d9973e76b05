use chrono::Utc;
use serde::Serialize;

use super::{check_status, settle, Apologies, Lookups};
use crate::error::LookupError;

pub const TASK_NOT_CONFIGURED: &str =
    "Sorry, task scheduling is unavailable: webhook not configured.";
pub const TASK_UNAVAILABLE: &str = "Sorry, I couldn't schedule that task right now.";
pub const TASK_EMPTY: &str = "Tell me what the task is, e.g. \"schedule a call with Sam at 3pm\".";

const APOLOGIES: Apologies = Apologies {
    not_configured: TASK_NOT_CONFIGURED,
    unavailable: TASK_UNAVAILABLE,
    not_found: TASK_EMPTY,
};

#[derive(Serialize)]
struct TaskPayload<'a> {
    user: &'a str,
    task: &'a str,
    requested_at: String,
}

impl Lookups {
    /// Hand a task to the configured webhook (Zapier/IFTTT style).
    pub async fn schedule_task(&self, user: &str, task: &str) -> String {
        settle("task", self.post_task(user, task).await, &APOLOGIES)
    }

    async fn post_task(&self, user: &str, task: &str) -> Result<String, LookupError> {
        let url = self
            .config
            .task_webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(LookupError::NotConfigured)?;
        let task = task.trim();
        if task.is_empty() {
            return Err(LookupError::Empty);
        }

        let payload = TaskPayload {
            user,
            task,
            requested_at: Utc::now().to_rfc3339(),
        };
        let resp = self.client.post(url).json(&payload).send().await?;
        check_status(resp)?;

        Ok(format!("Done! I've scheduled your task: {task}"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::config_for;
    use super::super::LookupConfig;
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_task_posted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/tasks"))
            .and(body_partial_json(serde_json::json!({
                "user": "alice",
                "task": "schedule dentist on friday"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let lookups = Lookups::new(config_for(&server.uri()));
        assert_eq!(
            lookups.schedule_task("alice", "schedule dentist on friday").await,
            "Done! I've scheduled your task: schedule dentist on friday"
        );
    }

    #[tokio::test]
    async fn test_task_webhook_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let lookups = Lookups::new(config_for(&server.uri()));
        assert_eq!(lookups.schedule_task("alice", "task").await, TASK_UNAVAILABLE);

        let unconfigured = Lookups::new(LookupConfig::default());
        assert_eq!(
            unconfigured.schedule_task("alice", "task").await,
            TASK_NOT_CONFIGURED
        );
    }
}
