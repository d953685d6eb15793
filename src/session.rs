use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{models::User, AppError, AppResult};

pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";
pub const USER_ID: &str = "user_id";

/// The signed-in user's UID, if any.
pub async fn current_user(session: &Session) -> AppResult<Option<String>> {
    Ok(session.get::<String>(USER_ID).await?)
}

pub async fn require_user(session: &Session) -> AppResult<String> {
    current_user(session).await?.ok_or_else(AppError::unauthorized)
}

pub async fn require_owner(session: &Session, owner: &str) -> AppResult<String> {
    let user_id = require_user(session).await?;
    if user_id != owner {
        return Err(AppError::forbidden());
    }
    Ok(user_id)
}

pub async fn require_admin(session: &Session, db_pool: &SqlitePool) -> AppResult<String> {
    let user_id = require_user(session).await?;
    if !User::is_admin(db_pool, &user_id).await? {
        return Err(AppError::Status(axum::http::StatusCode::FORBIDDEN, "admins only".to_owned()));
    }
    Ok(user_id)
}

/// A path on this site. Browsers read `/\host` as `//host` and skip tabs and
/// newlines, so backslashes and control characters are refused outright.
pub fn is_local_path(url: &str) -> bool {
    url.starts_with('/')
        && !url.starts_with("//")
        && !url.chars().any(|c| c == '\\' || c.is_control())
}

/// Only same-site paths are followed after sign-in and sign-out.
pub fn safe_return_url(return_url: Option<String>) -> String {
    return_url
        .filter(|url| is_local_path(url))
        .unwrap_or_else(|| "/".to_owned())
}
