use axum::{debug_handler, extract::{Path, State}, response::Redirect, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    db::now_millis,
    models::{Comment, Post, PostKey, PostKind, User},
    session, timeline::FeedEvent, AppError, AppResult, AppState,
};

const MAX_COMMENT_LEN: usize = 2000;

#[derive(Deserialize)]
pub(crate) struct CommentForm {
    content: String,
}

/// Trimmed comment text, or why it can't be posted.
pub fn validate_comment(content: &str) -> AppResult<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::bad_request("a comment needs some words"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request(format!("comments are limited to {MAX_COMMENT_LEN} characters")));
    }
    Ok(content)
}

pub async fn add_comment(db_pool: &SqlitePool, key: PostKey, user_id: &str, content: &str) -> Result<Comment, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    let created_at = now_millis();

    sqlx::query("INSERT INTO comments (id,post_kind,post_id,user_id,content,created_at) VALUES (?,?,?,?,?,?)")
        .bind(&id)
        .bind(key.kind)
        .bind(key.id.to_string())
        .bind(user_id)
        .bind(content)
        .bind(created_at)
        .execute(db_pool)
        .await?;

    Ok(Comment {
        id,
        post_kind: key.kind,
        post_id: key.id.to_string(),
        user_id: user_id.to_owned(),
        content: content.to_owned(),
        created_at,
        username: None,
    })
}

pub async fn comment_count(db_pool: &SqlitePool, key: PostKey) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments WHERE post_kind=? AND post_id=?")
        .bind(key.kind)
        .bind(key.id.to_string())
        .fetch_one(db_pool)
        .await?;
    Ok(count)
}

#[debug_handler(state = AppState)]
pub(crate) async fn comment(
    Path((kind, id)): Path<(PostKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<FeedEvent>>,
    session: Session,
    Form(CommentForm { content }): Form<CommentForm>,
) -> AppResult<Redirect> {
    let user_id = session::require_user(&session).await?;
    let content = validate_comment(&content)?;

    let key = PostKey { kind, id };
    let Some(post) = Post::find(&db_pool, key).await? else {
        return Err(AppError::not_found("post"));
    };
    if !post.viewable_by(Some(&user_id), User::is_admin(&db_pool, &user_id).await?) {
        return Err(AppError::not_found("post"));
    }

    add_comment(&db_pool, key, &user_id, content).await?;

    if post.is_listed() {
        let comments = comment_count(&db_pool, key).await?;
        let _ = tx.send(FeedEvent::CommentAdded { id, comments });
    }

    Ok(Redirect::to(&key.path()))
}
