use axum::{debug_handler, extract::{Path, State}, response::{Html, Redirect}};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    include_res,
    models::{Post, PostKey, PostKind},
    posts, res, session,
    storage::Storage,
    timeline::FeedEvent,
    AppError, AppResult, AppState,
};

#[debug_handler]
pub(crate) async fn queue(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Html<String>> {
    let admin = session::require_admin(&session, &db_pool).await?;

    let pending = posts::pending(&db_pool).await?;
    let mut items = String::new();
    for post in &pending {
        let Some(key) = post.key() else {
            continue;
        };
        items += &res::fill(include_res!(str, "/pages/pending_item.html"), &[
            ("card", &posts::render_card(&db_pool, post, Some(&admin)).await?),
            ("kind", &key.kind.to_string()),
            ("id", &key.id.to_string()),
        ]);
    }
    if pending.is_empty() {
        items = r#"<p class="empty">All caught up.</p>"#.to_owned();
    }

    let body = res::fill(include_res!(str, "/pages/admin.html"), &[("pending", &items)]);
    Ok(Html(res::page("Moderation", Some(&admin), &body)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn approve(
    Path((kind, id)): Path<(PostKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(tx): State<broadcast::Sender<FeedEvent>>,
    session: Session,
) -> AppResult<Redirect> {
    let admin = session::require_admin(&session, &db_pool).await?;
    let key = PostKey { kind, id };

    if posts::approve(&db_pool, key).await? {
        tracing::info!(post = %id, %kind, by = %admin, "post approved");

        let Some(post) = Post::find(&db_pool, key).await? else {
            return Err(AppError::not_found("post"));
        };
        if post.is_listed() {
            let html = posts::render_card(&db_pool, &post, None).await?;
            let _ = tx.send(FeedEvent::PostApproved { id, html });
        }
    }

    Ok(Redirect::to("/admin"))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reject(
    Path((kind, id)): Path<(PostKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(storage): State<Storage>,
    session: Session,
) -> AppResult<Redirect> {
    let admin = session::require_admin(&session, &db_pool).await?;
    let key = PostKey { kind, id };

    let Some(post) = Post::find(&db_pool, key).await? else {
        return Err(AppError::not_found("post"));
    };
    if posts::delete(&db_pool, key).await? {
        storage.remove(&post.image_url).await;
        tracing::info!(post = %id, %kind, by = %admin, "post rejected");
    }

    Ok(Redirect::to("/admin"))
}
