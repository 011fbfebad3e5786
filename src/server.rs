//! HTTP shell around [`Session`]: one session per browser, keyed by cookie.
//!
//! Every form posts to an action route that runs the action and redirects back
//! to `/`, so reloading the page never repeats an ingestion or a question.

use crate::config::{Credentials, Settings};
use crate::page;
use crate::session::{Action, Connector, Level, Notice, Session};
use crate::upload::UploadedFile;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use log::{debug, error};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

const SESSION_COOKIE: &str = "knowledge_agent_session";
const MAX_UPLOAD_SIZE: usize = 32 * 1024 * 1024;

/// Bounds on the session registry
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Most sessions kept at once; the least recently used is dropped first
    pub max_sessions: u64,
    /// A session untouched for this long is dropped
    pub idle_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        SessionLimits {
            max_sessions: 1000,
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// A session and the notice waiting for the next page load
struct Visitor {
    session: Session,
    notice: Option<Notice>,
}

type SharedVisitor = Arc<Mutex<Visitor>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    sessions: Cache<Uuid, SharedVisitor>,
    connector: Arc<dyn Connector>,
    settings: Arc<Settings>,
    /// Credentials from the environment, submitted for every new session
    preset: Option<Credentials>,
}

impl AppState {
    pub fn new(
        connector: Arc<dyn Connector>,
        settings: Settings,
        preset: Option<Credentials>,
    ) -> Self {
        Self::with_limits(connector, settings, preset, SessionLimits::default())
    }

    pub fn with_limits(
        connector: Arc<dyn Connector>,
        settings: Settings,
        preset: Option<Credentials>,
        limits: SessionLimits,
    ) -> Self {
        let sessions = Cache::builder()
            .max_capacity(limits.max_sessions)
            .time_to_idle(limits.idle_timeout)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        AppState {
            inner: Arc::new(AppStateInner {
                sessions,
                connector,
                settings: Arc::new(settings),
                preset,
            }),
        }
    }

    /// Number of live sessions, after pending evictions have run
    pub fn session_count(&self) -> u64 {
        self.inner.sessions.run_pending_tasks();
        self.inner.sessions.entry_count()
    }

    /// Find the caller's session or start a new one
    fn resolve(&self, headers: &HeaderMap) -> Resolved {
        if let Some(id) = session_id(headers) {
            if let Some(visitor) = self.inner.sessions.get(&id) {
                return Resolved {
                    id,
                    visitor,
                    is_new: false,
                };
            }
        }

        let id = Uuid::new_v4();
        let mut session = Session::new(self.inner.connector.clone(), self.inner.settings.clone());
        let notice = session.start(self.inner.preset.as_ref());
        let visitor = Arc::new(Mutex::new(Visitor { session, notice }));
        self.inner.sessions.insert(id, visitor.clone());
        debug!("Started session {}", id);

        Resolved {
            id,
            visitor,
            is_new: true,
        }
    }
}

struct Resolved {
    id: Uuid,
    visitor: SharedVisitor,
    is_new: bool,
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find_map(|value| Uuid::parse_str(value).ok())
}

/// Build the router with all routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/credentials", post(submit_credentials))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
        .route("/ingest", post(ingest))
        .route("/ask", post(ask))
        .route("/clear", post(clear))
        .with_state(state)
}

/// Run `action` against the caller's session and send the browser back to `/`
async fn act(state: &AppState, headers: &HeaderMap, action: Action) -> Response {
    let resolved = state.resolve(headers);
    let mut visitor = resolved.visitor.lock().await;

    if let Some(notice) = visitor.session.dispatch(action).await {
        visitor.notice = Some(notice);
    }

    with_cookie(&resolved, Redirect::to("/").into_response())
}

/// Show `notice` on the next page load without touching the session state
async fn flash(state: &AppState, headers: &HeaderMap, notice: Notice) -> Response {
    let resolved = state.resolve(headers);
    resolved.visitor.lock().await.notice = Some(notice);

    with_cookie(&resolved, Redirect::to("/").into_response())
}

fn with_cookie(resolved: &Resolved, mut response: Response) -> Response {
    if resolved.is_new {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, resolved.id
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().insert(SET_COOKIE, value);
            }
            Err(e) => error!("Invalid session cookie: {}", e),
        }
    }

    response
}

async fn health_check() -> &'static str {
    "OK"
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let resolved = state.resolve(&headers);
    let mut visitor = resolved.visitor.lock().await;
    let notice = visitor.notice.take();

    let page = Html(page::render(&visitor.session, notice.as_ref())).into_response();
    with_cookie(&resolved, page)
}

#[derive(Deserialize)]
struct CredentialsForm {
    #[serde(default)]
    gemini_api_key: String,
    #[serde(default)]
    vector_store_api_key: String,
}

async fn submit_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let action = Action::SubmitCredentials {
        gemini_api_key: form.gemini_api_key,
        vector_store_api_key: form.vector_store_api_key,
    };
    act(&state, &headers, action).await
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut file = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                let notice = Notice {
                    level: Level::Error,
                    message: format!("Failed to read upload: {}", e),
                };
                return flash(&state, &headers, notice).await;
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        if name.is_empty() {
            continue;
        }
        if !page::is_accepted(&name) {
            let notice = Notice {
                level: Level::Warning,
                message: format!("{} is not a .txt, .pdf or .docx file", name),
            };
            return flash(&state, &headers, notice).await;
        }

        match field.bytes().await {
            Ok(bytes) => {
                file = Some(UploadedFile {
                    name,
                    bytes: bytes.to_vec(),
                })
            }
            Err(e) => {
                let notice = Notice {
                    level: Level::Error,
                    message: format!("Failed to read {}: {}", name, e),
                };
                return flash(&state, &headers, notice).await;
            }
        }
    }

    act(&state, &headers, Action::Upload(file)).await
}

async fn ingest(State(state): State<AppState>, headers: HeaderMap) -> Response {
    act(&state, &headers, Action::Ingest).await
}

#[derive(Deserialize)]
struct AskForm {
    #[serde(default)]
    query: String,
}

async fn ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AskForm>,
) -> Response {
    act(&state, &headers, Action::Ask(form.query)).await
}

async fn clear(State(state): State<AppState>, headers: HeaderMap) -> Response {
    act(&state, &headers, Action::Reset).await
}
