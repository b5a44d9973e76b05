use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use chatterbox_bot::{KnowledgeBase, LlmClient, Lookups, ReplyContext, Responder};
use chatterbox_shared::snapshot::{CredentialSnapshot, SnapshotSealer};
use chatterbox_shared::ConversationId;
use chatterbox_store::{ChatMessage, Conversation, Database, Profile};

use crate::auth::{self, AuthError};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::pages;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::session::{
    cookie_value, expired_cookie, site_cookie, Session, SessionStore, REMEMBER_COOKIE,
    SESSION_COOKIE,
};

pub const LOGIN_REQUIRED_REPLY: &str = "Please log in to chat.";
pub const CHAT_ERROR_REPLY: &str = "An error occurred. Please try again.";
pub const CHAT_ID_HEADER: &str = "x-chat-id";

#[derive(Clone)]
pub struct AppState {
    pub db_path: Arc<PathBuf>,
    pub responder: Responder,
    pub sessions: SessionStore,
    pub sealer: SnapshotSealer,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let knowledge = KnowledgeBase::new(config.database_path.clone());
        let lookups = Lookups::new(config.lookups.clone());
        let llm = config.llm.clone().map(LlmClient::new);
        let sealer = SnapshotSealer::new(
            &config.session_secret,
            chrono::Duration::days(config.remember_days),
        );

        Self {
            db_path: Arc::new(config.database_path.clone()),
            responder: Responder::new(knowledge, lookups, llm),
            sessions: SessionStore::new(config.session_idle),
            sealer,
            rate_limiter: RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst),
            config: Arc::new(config),
        }
    }

    /// Run `f` on a fresh connection on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T, ServerError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, ServerError> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let db = Database::open_at(&path)?;
            f(&db)
        })
        .await?
    }
}

pub fn build_router(state: AppState) -> Router {
    let chat = Router::new()
        .route("/get_response", post(get_response))
        .route("/save_message", post(save_message))
        .route("/learn", post(learn))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .route("/", get(index))
        .route("/login", get(login_form).post(login))
        .route("/register", get(register_form).post(register))
        .route("/logout", post(logout))
        .route("/get_history", get(get_history))
        .route("/get_chats", get(get_chats))
        .route("/new_chat", post(new_chat))
        .route("/delete_chat", post(delete_chat))
        .route("/settings", get(get_settings).post(update_settings))
        .route("/knowledge/export", get(knowledge_export))
        .route("/knowledge/topics", get(knowledge_topics))
        .route("/health", get(health_check))
        .merge(chat)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Sessions ───

struct Caller {
    token: String,
    session: Session,
}

impl Caller {
    fn username(&self) -> &str {
        &self.session.username
    }
}

async fn caller(state: &AppState, jar: &CookieJar) -> Option<Caller> {
    let token = cookie_value(jar, SESSION_COOKIE)?;
    let session = state.sessions.touch(&token).await?;
    Some(Caller { token, session })
}

async fn require_caller(state: &AppState, jar: &CookieJar) -> Result<Caller, ServerError> {
    caller(state, jar).await.ok_or(ServerError::Unauthorized)
}

/// Open a session and add the cookies announcing it to `jar`.
async fn start_session(
    state: &AppState,
    jar: CookieJar,
    username: &str,
    remember: bool,
) -> Result<CookieJar, ServerError> {
    let token = state.sessions.create(username).await;
    let mut jar = jar.add(site_cookie(SESSION_COOKIE, token, None));

    if remember {
        let sealed = state
            .sealer
            .seal(&CredentialSnapshot::new(username))
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let max_age = time::Duration::days(state.config.remember_days);
        jar = jar.add(site_cookie(REMEMBER_COOKIE, sealed, Some(max_age)));
    }
    Ok(jar)
}

/// Username from a readable, unexpired remember cookie whose account still
/// exists.
async fn remembered_user(
    state: &AppState,
    jar: &CookieJar,
) -> Result<Option<String>, ServerError> {
    let Some(sealed) = cookie_value(jar, REMEMBER_COOKIE) else {
        return Ok(None);
    };
    let snapshot = match state.sealer.open(&sealed) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            debug!(error = %e, "Ignoring unusable remember cookie");
            return Ok(None);
        }
    };

    let username = snapshot.username;
    let lookup = username.clone();
    let exists = state
        .with_db(move |db| Ok(db.find_user(&lookup)?.is_some()))
        .await?;
    Ok(exists.then_some(username))
}

/// Conversation for this request: the one the client names, else the
/// session's current one, else a new one. The session follows along.
async fn current_chat(
    state: &AppState,
    caller: &Caller,
    requested: Option<&str>,
) -> Result<ConversationId, ServerError> {
    let chat_id = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => ConversationId::parse(raw)
            .ok_or_else(|| ServerError::BadRequest("Invalid chat id".into()))?,
        None => caller
            .session
            .chat_id
            .clone()
            .unwrap_or_else(ConversationId::generate),
    };
    if caller.session.chat_id.as_ref() != Some(&chat_id) {
        state
            .sessions
            .set_chat(&caller.token, Some(chat_id.clone()))
            .await;
    }
    Ok(chat_id)
}

fn parse_chat_id(raw: &str) -> Result<ConversationId, ServerError> {
    ConversationId::parse(raw).ok_or_else(|| ServerError::BadRequest("Invalid chat id".into()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "on" | "true" | "1" | "yes")
}

// ─── Pages and auth ───

async fn index(State(state): State<AppState>, jar: CookieJar) -> Result<Response, ServerError> {
    if let Some(caller) = caller(&state, &jar).await {
        return Ok(Html(pages::chat_page(caller.username())).into_response());
    }
    if let Some(username) = remembered_user(&state, &jar).await? {
        let jar = start_session(&state, jar, &username, false).await?;
        info!(username = %username, "Restored remembered login");
        return Ok((jar, Html(pages::chat_page(&username))).into_response());
    }
    Ok(Redirect::to("/login").into_response())
}

async fn login_form(State(state): State<AppState>, jar: CookieJar) -> Response {
    if caller(&state, &jar).await.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(pages::login_page(None)).into_response()
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    remember: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, ServerError> {
    let remember = form.remember.as_deref().is_some_and(is_truthy);
    let outcome = state
        .with_db(move |db| Ok(auth::login(db, &form.username, &form.password)))
        .await?;

    match outcome {
        Ok(user) => {
            let jar = start_session(&state, jar, &user.username, remember).await?;
            info!(username = %user.username, remember, "User logged in");
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(AuthError::InvalidCredentials) => Ok((
            StatusCode::UNAUTHORIZED,
            Html(pages::login_page(Some("Invalid username or password."))),
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn register_form(State(state): State<AppState>) -> Html<String> {
    Html(pages::register_page(None, state.config.registration_open))
}

#[derive(Deserialize)]
struct RegisterForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    display_name: Option<String>,
    email: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("Registration is closed".into()));
    }
    let profile = Profile {
        display_name: non_blank(form.display_name),
        email: non_blank(form.email),
        ..Profile::default()
    };
    let (username, password) = (form.username, form.password);
    state
        .with_db(move |db| Ok(auth::register(db, &username, &password, profile)?))
        .await?;
    Ok(Redirect::to("/login"))
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(token) = cookie_value(&jar, SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(&token).await {
            info!(username = %session.username, "User logged out");
        }
    }

    let jar = jar
        .remove(expired_cookie(SESSION_COOKIE))
        .remove(expired_cookie(REMEMBER_COOKIE));
    (jar, Json(serde_json::json!({ "status": "Logged out" })))
}

// ─── Chat ───

#[derive(Deserialize)]
struct ChatForm {
    #[serde(default)]
    message: String,
    #[serde(rename = "chatId")]
    chat_id: Option<String>,
}

/// Plain-text reply. Storage failures while recording the exchange are
/// logged and answered with a generic apology, still with status 200.
async fn get_response(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ChatForm>,
) -> Response {
    let Some(caller) = caller(&state, &jar).await else {
        return (StatusCode::UNAUTHORIZED, LOGIN_REQUIRED_REPLY).into_response();
    };
    let chat_id = match current_chat(&state, &caller, form.chat_id.as_deref()).await {
        Ok(chat_id) => chat_id,
        Err(e) => return e.into_response(),
    };

    let message = form.message.trim().to_string();
    let ctx = ReplyContext::new(caller.username());
    let reply = state.responder.resolve(&message, &ctx).await;

    if !message.is_empty() {
        let username = ctx.username.clone();
        let (id, reply_text) = (chat_id.clone(), reply.clone());
        let recorded = state
            .with_db(move |db| Ok(db.append_exchange(&username, &id, &message, &reply_text)?))
            .await;
        if let Err(e) = recorded {
            error!(
                username = %ctx.username,
                chat_id = %chat_id,
                error = %e,
                "Failed to record chat exchange"
            );
            return ([(CHAT_ID_HEADER, chat_id.to_string())], CHAT_ERROR_REPLY).into_response();
        }
    }

    ([(CHAT_ID_HEADER, chat_id.to_string())], reply).into_response()
}

#[derive(Deserialize)]
struct SaveMessageForm {
    #[serde(rename = "chatId")]
    chat_id: String,
    #[serde(default)]
    message: String,
    #[serde(rename = "isUser")]
    is_user: Option<String>,
}

async fn save_message(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SaveMessageForm>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    let chat_id = parse_chat_id(&form.chat_id)?;
    let text = form.message.trim().to_string();
    if text.is_empty() {
        return Err(ServerError::BadRequest("Message must not be empty".into()));
    }
    let is_user = form.is_user.as_deref().is_some_and(is_truthy);

    let username = caller.username().to_string();
    state
        .with_db(move |db| Ok(db.append_message(&username, &chat_id, &text, is_user)?))
        .await?;
    Ok(Json(serde_json::json!({ "status": "Saved" })))
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(rename = "chatId")]
    chat_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    chat_id: Option<String>,
    messages: Vec<ChatMessage>,
}

async fn get_history(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    let chat_id = match non_blank(query.chat_id) {
        Some(raw) => Some(parse_chat_id(&raw)?),
        None => caller.session.chat_id.clone(),
    };
    let Some(chat_id) = chat_id else {
        return Ok(Json(HistoryResponse {
            chat_id: None,
            messages: Vec::new(),
        }));
    };

    let username = caller.username().to_string();
    let id = chat_id.clone();
    let messages = state
        .with_db(move |db| Ok(db.history(&username, &id)?))
        .await?;
    Ok(Json(HistoryResponse {
        chat_id: Some(chat_id.to_string()),
        messages,
    }))
}

#[derive(Serialize)]
struct ChatsResponse {
    chats: Vec<Conversation>,
}

async fn get_chats(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<ChatsResponse>, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    let username = caller.username().to_string();
    let chats = state
        .with_db(move |db| Ok(db.list_conversations(&username)?))
        .await?;
    Ok(Json(ChatsResponse { chats }))
}

async fn new_chat(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    let chat_id = ConversationId::generate();
    state
        .sessions
        .set_chat(&caller.token, Some(chat_id.clone()))
        .await;
    debug!(username = %caller.username(), chat_id = %chat_id, "Started new chat");
    Ok(Json(serde_json::json!({ "chatId": chat_id })))
}

#[derive(Deserialize)]
struct DeleteChatForm {
    #[serde(rename = "chatId")]
    chat_id: String,
}

async fn delete_chat(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<DeleteChatForm>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    let chat_id = parse_chat_id(&form.chat_id)?;

    let username = caller.username().to_string();
    let id = chat_id.clone();
    let deleted = state
        .with_db(move |db| Ok(db.delete_conversation(&username, &id)?))
        .await?;

    if !deleted {
        return Ok(Json(serde_json::json!({ "status": "Not found" })));
    }
    if caller.session.chat_id.as_ref() == Some(&chat_id) {
        state.sessions.set_chat(&caller.token, None).await;
    }
    info!(username = %caller.username(), chat_id = %chat_id, "Deleted chat");
    Ok(Json(serde_json::json!({ "status": "Deleted" })))
}

// ─── Settings ───

#[derive(Serialize)]
struct SettingsResponse {
    username: String,
    #[serde(flatten)]
    profile: Profile,
}

async fn get_settings(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<SettingsResponse>, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    let username = caller.username().to_string();
    let lookup = username.clone();
    let profile = state
        .with_db(move |db| Ok(Profile::from(&db.get_user(&lookup)?)))
        .await?;
    Ok(Json(SettingsResponse { username, profile }))
}

/// Fields left out keep their current value; a field sent blank clears it.
#[derive(Deserialize)]
struct SettingsForm {
    display_name: Option<String>,
    email: Option<String>,
    notifications: Option<String>,
    profile_picture: Option<String>,
    new_password: Option<String>,
}

async fn update_settings(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SettingsForm>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    if let Some(email) = form.email.as_deref().map(str::trim) {
        if !email.is_empty() && !email.contains('@') {
            return Err(ServerError::BadRequest("Invalid email address".into()));
        }
    }

    let username = caller.username().to_string();
    let profile = state
        .with_db(move |db| {
            let current = Profile::from(&db.get_user(&username)?);
            let merge = |field: Option<String>, old: Option<String>| match field {
                Some(value) => non_blank(Some(value)),
                None => old,
            };
            let profile = Profile {
                display_name: merge(form.display_name, current.display_name),
                email: merge(form.email, current.email),
                notifications_enabled: form
                    .notifications
                    .as_deref()
                    .map(is_truthy)
                    .unwrap_or(current.notifications_enabled),
                profile_picture: merge(form.profile_picture, current.profile_picture),
            };
            Ok(auth::update_settings(
                db,
                &username,
                &profile,
                form.new_password.as_deref(),
            )?)
        })
        .await?;

    info!(username = %caller.username(), "Settings updated");
    Ok(Json(serde_json::json!({ "status": "Updated", "profile": profile })))
}

// ─── Knowledge ───

#[derive(Deserialize)]
struct LearnForm {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
}

async fn learn(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LearnForm>,
) -> Result<String, ServerError> {
    let caller = require_caller(&state, &jar).await?;
    let topic = state
        .responder
        .knowledge()
        .learn(&form.question, &form.answer)
        .await?;
    debug!(username = %caller.username(), topic = %topic, "Taught via /learn");
    Ok(format!("Thanks! I'll remember that for \"{topic}\"."))
}

async fn knowledge_export(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<BTreeMap<String, Vec<String>>>, ServerError> {
    require_caller(&state, &jar).await?;
    Ok(Json(state.responder.knowledge().export().await?))
}

#[derive(Serialize)]
struct TopicsResponse {
    topics: Vec<String>,
}

async fn knowledge_topics(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<TopicsResponse>, ServerError> {
    require_caller(&state, &jar).await?;
    let topics = state.responder.knowledge().topics().await?;
    Ok(Json(TopicsResponse { topics }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
