pub mod admin;
pub mod auth;
pub mod config;
pub mod contact;
pub mod db;
pub mod feed;
pub mod likes;
pub mod models;
pub mod plants;
pub mod posts;
pub mod profiles;
pub mod res;
pub mod session;
pub mod storage;
pub mod timeline;

use std::{ops::Deref, sync::Arc};

use axum::{
    debug_handler, extract::{DefaultBodyLimit, FromRef}, http::StatusCode, response::{Html, IntoResponse, Redirect, Response}, routing::get, Router
};
use oauth2::reqwest;
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::{config::Config, storage::Storage, timeline::FeedEvent};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub clients: auth::Clients,
    pub storage: Storage,
    pub tx: broadcast::Sender<FeedEvent>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, clients: auth::Clients, config: Config) -> Self {
        Self {
            db_pool,
            clients,
            storage: Storage::new(&config.upload_dir),
            tx: broadcast::channel(64).0,
            config: Arc::new(config),
        }
    }
}

/// Builds the whole site: pages, uploads and the session layer.
pub fn router(state: AppState) -> Router {
    router_with_sessions(state, MemoryStore::default())
}

/// Same as [`router`], keeping sessions in the given store.
pub fn router_with_sessions(state: AppState, sessions: MemoryStore) -> Router {
    let session_layer = SessionManagerLayer::new(sessions)
        .with_secure(state.config.public_url.starts_with("https://"))
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(state.config.session_minutes)));

    let uploads = ServeDir::new(state.storage.root());

    Router::new()
        .route("/", get(index))
        .merge(auth::router())
        .merge(contact::router())
        .nest("/u", profiles::router().merge(plants::router()))
        .nest("/posts", posts::router())
        .nest("/timeline", timeline::router())
        .nest("/admin", admin::router())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(storage::MAX_UPLOAD_SIZE + 64 * 1024))
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

#[debug_handler]
async fn index() -> Redirect {
    Redirect::to("/timeline")
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_opt_str_field(&self, field: &str) -> Option<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get(field)
            .ok_or(format!("expected {field} in {self}"))?
            .as_str()
            .ok_or(format!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_opt_str_field(&self, field: &str) -> Option<String> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
        .ok_or(format!("expected {field} in {self}").into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Something the visitor did: shown to them as-is.
    Status(StatusCode, String),
    Internal(anyhow::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(StatusCode::BAD_REQUEST, msg.into())
    }

    pub fn unauthorized() -> Self {
        Self::Status(StatusCode::UNAUTHORIZED, "sign in first".to_owned())
    }

    pub fn forbidden() -> Self {
        Self::Status(StatusCode::FORBIDDEN, "that isn't yours".to_owned())
    }

    pub fn not_found(what: &str) -> Self {
        Self::Status(StatusCode::NOT_FOUND, format!("no such {what}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Status(status, msg) => {
                tracing::debug!(%status, "{msg}");
                (status, Html(res::error_page(status, &msg))).into_response()
            }
            AppError::Internal(err) => {
                tracing::error!("{err}\n\n{}", err.backtrace());
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, Html(res::error_page(status, &err.to_string()))).into_response()
            }
        }
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::Internal(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Internal(anyhow::Error::msg(err.to_owned()))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(std::io::Error);

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::Status(err.status(), err.body_text())
    }
}

impl<E: core::error::Error + Send + Sync + 'static, R: oauth2::ErrorResponse + Send + Sync + 'static> From<oauth2::RequestTokenError<E, R>> for AppError {
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}

/// Post and comment bodies are markdown. Raw HTML in them is shown as text.
pub struct Markdown<T>(pub T);

impl<T> Markdown<T>
where
    T: Deref<Target = str>
{
    pub fn to_html(&self) -> String {
        use pulldown_cmark::{Event, Parser, Options};

        let parser = Parser::new_ext(&*self.0, Options::ENABLE_STRIKETHROUGH)
            .map(|event| match event {
            Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
            _ => event,
        });

        let mut html_output = String::new();
        pulldown_cmark::html::push_html(&mut html_output, parser);
        html_output
    }
}
