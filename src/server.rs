use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use mentor_core::{
    ChatError, ChatSession, Conversation, LanguageModel, MemoryLength, ModelCatalog, Result,
    SessionSettings, Turn,
};

use crate::session::SessionRegistry;

#[derive(Debug, Error)]
enum ApiError {
    #[error("session `{0}` not found")]
    SessionNotFound(Uuid),

    #[error("{0}")]
    InvalidSettings(String),

    #[error("malformed request body: {0}")]
    InvalidBody(String),

    #[error("{0}")]
    Upstream(String),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Config(msg) => ApiError::InvalidSettings(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidSettings(_) | ApiError::InvalidBody(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Web front-end: a single chat page plus a small JSON API.
pub struct ChatServer<M: LanguageModel + 'static> {
    conversation: Arc<Conversation<M>>,
    catalog: ModelCatalog,
    defaults: SessionSettings,
    sessions: SessionRegistry,
    idle_timeout: Duration,
}

impl<M: LanguageModel + 'static> Clone for ChatServer<M> {
    fn clone(&self) -> Self {
        Self {
            conversation: Arc::clone(&self.conversation),
            catalog: self.catalog.clone(),
            defaults: self.defaults.clone(),
            sessions: self.sessions.clone(),
            idle_timeout: self.idle_timeout,
        }
    }
}

#[derive(Serialize)]
struct MemoryBounds {
    min: usize,
    max: usize,
    default: usize,
}

#[derive(Serialize)]
struct SettingsResponse {
    models: Vec<String>,
    default_model: String,
    memory: MemoryBounds,
}

#[derive(Deserialize, Default)]
struct SettingsPatch {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    memory_length: Option<usize>,
}

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
    settings: SessionSettings,
}

#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    input: String,
    #[serde(flatten)]
    settings: SettingsPatch,
}

#[derive(Serialize)]
struct SubmitResponse {
    output: Option<String>,
    turns: usize,
}

#[derive(Serialize)]
struct HistoryResponse {
    settings: SessionSettings,
    turns: Vec<Turn>,
}

impl<M: LanguageModel + 'static> ChatServer<M> {
    pub fn new(conversation: Conversation<M>, catalog: ModelCatalog, defaults: SessionSettings) -> Self {
        Self {
            conversation: Arc::new(conversation),
            catalog,
            defaults,
            sessions: SessionRegistry::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// How long a session may sit unused before the idle sweep ends it.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn router(self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/health", get(|| async { "ok" }))
            .route("/api/settings", get(settings::<M>))
            .route("/api/sessions", post(create_session::<M>))
            .route(
                "/api/sessions/:id",
                get(session_history::<M>).delete(end_session::<M>),
            )
            .route("/api/sessions/:id/history", get(session_history::<M>))
            .route("/api/sessions/:id/messages", post(submit::<M>))
            .with_state(self)
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let sweeper = self.sessions.spawn_idle_sweep(self.idle_timeout);
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "web shell listening");
        let served = axum::serve(listener, app.into_make_service()).await;
        sweeper.abort();
        served.map_err(|err| ChatError::Protocol(format!("server error: {err}")))?;
        Ok(())
    }
}

/// Decode a JSON body. An empty body yields `None`; anything else must parse.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> std::result::Result<Option<T>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|err| ApiError::InvalidBody(err.to_string()))
}

fn apply_patch(
    session: &mut ChatSession,
    catalog: &ModelCatalog,
    patch: &SettingsPatch,
) -> Result<()> {
    // Validate both before touching the session.
    let model = patch
        .model
        .as_deref()
        .map(|m| catalog.select(m))
        .transpose()?;
    let memory_length = patch.memory_length.map(MemoryLength::new).transpose()?;
    if let Some(model) = model {
        session.settings.model = model;
    }
    if let Some(k) = memory_length {
        session.settings.memory_length = k;
    }
    Ok(())
}

async fn settings<M: LanguageModel + 'static>(
    State(state): State<ChatServer<M>>,
) -> impl IntoResponse {
    Json(SettingsResponse {
        models: state.catalog.models().to_vec(),
        default_model: state.defaults.model.clone(),
        memory: MemoryBounds {
            min: MemoryLength::MIN,
            max: MemoryLength::MAX,
            default: state.defaults.memory_length.get(),
        },
    })
}

async fn create_session<M: LanguageModel + 'static>(
    State(state): State<ChatServer<M>>,
    body: Bytes,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let patch: SettingsPatch = parse_body(&body)?.unwrap_or_default();
    let mut draft = ChatSession::new(state.defaults.clone());
    apply_patch(&mut draft, &state.catalog, &patch)?;

    let settings = draft.settings;
    let session_id = state.sessions.create(settings.clone()).await;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id,
            settings,
        }),
    ))
}

async fn session_history<M: LanguageModel + 'static>(
    State(state): State<ChatServer<M>>,
    Path(id): Path<Uuid>,
) -> std::result::Result<Json<HistoryResponse>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or(ApiError::SessionNotFound(id))?;
    let session = session.lock().await;
    Ok(Json(HistoryResponse {
        settings: session.settings.clone(),
        turns: session.history().all().to_vec(),
    }))
}

async fn end_session<M: LanguageModel + 'static>(
    State(state): State<ChatServer<M>>,
    Path(id): Path<Uuid>,
) -> std::result::Result<StatusCode, ApiError> {
    if state.sessions.end(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

async fn submit<M: LanguageModel + 'static>(
    State(state): State<ChatServer<M>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> std::result::Result<Json<SubmitResponse>, ApiError> {
    let req: SubmitRequest = parse_body(&body)?
        .ok_or_else(|| ApiError::InvalidBody("expected a JSON object".into()))?;
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or(ApiError::SessionNotFound(id))?;
    let mut session = session.lock().await;
    apply_patch(&mut session, &state.catalog, &req.settings)?;

    let output = state
        .conversation
        .predict(&mut session, &req.input)
        .await
        .map_err(|err| {
            warn!(session = %id, error = %err, "submission failed");
            ApiError::from(err)
        })?;

    Ok(Json(SubmitResponse {
        output,
        turns: session.history().len(),
    }))
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html>
<head>
    <meta charset="utf-8" />
    <title>Coding Mentor</title>
    <style>
        body { font-family: sans-serif; margin: 0; display: flex; min-height: 100vh; }
        aside { width: 16rem; padding: 1.5rem; background: #f3f4f6; }
        main { flex: 1; padding: 2rem; }
        textarea { width: 100%; height: 6rem; }
        #output { white-space: pre-wrap; margin-top: 1rem; }
        .error { color: #b91c1c; }
    </style>
</head>
<body>
    <aside>
        <h3>Select an LLM</h3>
        <label>Choose a model <select id="model"></select></label>
        <p>
            <label>Conversational memory length: <span id="k-label"></span>
            <input id="k" type="range" /></label>
        </p>
    </aside>
    <main>
        <h1>Coding Mentor</h1>
        <label for="question">Ask a question:</label>
        <textarea id="question"></textarea>
        <button id="ask">Ask</button>
        <div id="output"></div>
    </main>
    <script>
        let sessionId = null;
        const $ = (id) => document.getElementById(id);
        async function call(url, options) {
            const res = await fetch(url, options);
            const text = await res.text();
            let body;
            try { body = text ? JSON.parse(text) : {}; } catch (_) { body = { error: text }; }
            if (!res.ok) throw new Error(body.error || res.statusText);
            return body;
        }
        function show(text, failed) {
            $('output').className = failed ? 'error' : '';
            $('output').innerText = text;
        }
        async function init() {
            const s = await call('/api/settings');
            $('model').innerHTML = s.models.map(m => `<option>${m}</option>`).join('');
            $('model').value = s.default_model;
            Object.assign($('k'), { min: s.memory.min, max: s.memory.max, value: s.memory.default });
            $('k-label').innerText = s.memory.default;
            $('k').oninput = () => { $('k-label').innerText = $('k').value; };
            const created = await call('/api/sessions', { method: 'POST' });
            sessionId = created.session_id;
        }
        async function ask() {
            const input = $('question').value;
            if (!input.trim()) return;
            try {
                const body = await call(`/api/sessions/${sessionId}/messages`, {
                    method: 'POST',
                    headers: { 'content-type': 'application/json' },
                    body: JSON.stringify({ input, model: $('model').value, memory_length: Number($('k').value) }),
                });
                show(`Chatbot: ${body.output ?? ''}`, false);
            } catch (err) {
                show(err.message, true);
            }
        }
        window.addEventListener('pagehide', () => {
            if (sessionId) fetch(`/api/sessions/${sessionId}`, { method: 'DELETE', keepalive: true });
        });
        $('ask').onclick = ask;
        init().catch((err) => show(err.message, true));
    </script>
</body>
</html>
"#,
    )
}
