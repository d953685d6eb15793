use axum::{debug_handler, extract::{Path, State}, response::Redirect};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    models::{Post, PostKey, PostKind, User},
    session, storage::Storage, AppError, AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn delete_post(
    Path((kind, id)): Path<(PostKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(storage): State<Storage>,
    session: Session,
) -> AppResult<Redirect> {
    let user_id = session::require_user(&session).await?;

    let key = PostKey { kind, id };
    let Some(post) = Post::find(&db_pool, key).await? else {
        return Err(AppError::not_found("post"));
    };
    if post.author_id != user_id && !User::is_admin(&db_pool, &user_id).await? {
        return Err(AppError::forbidden());
    }

    if super::delete(&db_pool, key).await? {
        storage.remove(&post.image_url).await;
        tracing::info!(post = %id, by = %user_id, "post deleted");
    }

    Ok(Redirect::to(&format!("/u/{}", post.author_id)))
}
