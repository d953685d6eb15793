use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, http::HeaderMap, response::Redirect};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    config::Config,
    likes,
    models::{Post, PostKey, PostKind, User},
    session, timeline::FeedEvent, AppError, AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn like(
    Path((kind, id)): Path<(PostKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<FeedEvent>>,
    State(config): State<Arc<Config>>,
    session: Session,
    headers: HeaderMap,
) -> AppResult<Redirect> {
    let user_id = session::require_user(&session).await?;

    let key = PostKey { kind, id };
    let Some(post) = Post::find(&db_pool, key).await? else {
        return Err(AppError::not_found("post"));
    };
    if !post.viewable_by(Some(&user_id), User::is_admin(&db_pool, &user_id).await?) {
        return Err(AppError::not_found("post"));
    }

    let Some(toggled) = likes::toggle_like(&db_pool, key, &user_id).await? else {
        return Err(AppError::not_found("post"));
    };

    if post.is_listed() {
        let _ = tx.send(FeedEvent::LikesChanged { id, likes: toggled.likes });
    }

    Ok(super::back(&headers, &config.public_url, &key.path()))
}
