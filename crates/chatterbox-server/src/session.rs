//! Server-side sessions and the cookies that carry them.
//!
//! A session maps an opaque random token (the `session` cookie) to the
//! logged-in username and the conversation currently open in that browser.
//! Sessions live in memory only and expire after a period of inactivity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tokio::sync::RwLock;
use tracing::debug;

use chatterbox_shared::crypto::random_token;
use chatterbox_shared::ConversationId;

pub const SESSION_COOKIE: &str = "session";
pub const REMEMBER_COOKIE: &str = "remember";

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    /// Conversation that new messages go to when the client names none.
    pub chat_id: Option<ConversationId>,
    last_seen: Instant,
}

impl Session {
    fn is_idle(&self, now: Instant, idle: Duration) -> bool {
        now.duration_since(self.last_seen) >= idle
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    idle: Duration,
}

impl SessionStore {
    pub fn new(idle: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle,
        }
    }

    /// Start a session for `username` and return its token.
    pub async fn create(&self, username: &str) -> String {
        let token = random_token(TOKEN_BYTES);
        let session = Session {
            username: username.to_string(),
            chat_id: None,
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(token.clone(), session);
        debug!(username, "Session created");
        token
    }

    /// Look up a live session and mark it as active.
    pub async fn touch(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        if sessions.get(token)?.is_idle(now, self.idle) {
            sessions.remove(token);
            debug!("Session expired on access");
            return None;
        }
        let session = sessions.get_mut(token)?;
        session.last_seen = now;
        Some(session.clone())
    }

    pub async fn set_chat(&self, token: &str, chat_id: Option<ConversationId>) {
        if let Some(session) = self.sessions.write().await.get_mut(token) {
            session.chat_id = chat_id;
        }
    }

    pub async fn remove(&self, token: &str) -> Option<Session> {
        self.sessions.write().await.remove(token)
    }

    /// Drop every idle session. Returns how many were removed.
    pub async fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_idle(now, self.idle));
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, remaining = sessions.len(), "Purged idle sessions");
        }
        purged
    }

    /// Periodic housekeeping: purge idle sessions, then log how many remain.
    pub async fn sweep(&self) {
        self.purge_idle().await;
        let active = self.len().await;
        debug!(active, "Session sweep");
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Value of cookie `name`, without surrounding quotes.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value_trimmed().to_string())
        .filter(|v| !v.is_empty())
}

/// HTTP-only cookie scoped to the whole site. Without `max_age` it lasts for
/// the browser session.
pub fn site_cookie(
    name: &'static str,
    value: String,
    max_age: Option<time::Duration>,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    if let Some(age) = max_age {
        cookie = cookie.max_age(age);
    }
    cookie.build()
}

/// Removal template for `name`; the path must match the one it was set with.
pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}
