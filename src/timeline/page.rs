use axum::{debug_handler, extract::{Query, State}, response::Html};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    feed::{self, Cursor, Scope, PAGE_SIZE},
    include_res,
    models::Plant,
    posts, res, session, AppError, AppResult,
};

#[derive(Deserialize)]
pub(crate) struct TimelineQuery {
    cursor: Option<String>,
}

#[debug_handler]
pub(crate) async fn timeline(
    Query(TimelineQuery { cursor }): Query<TimelineQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Html<String>> {
    let viewer = session::current_user(&session).await?;
    let cursor: Option<Cursor> = match cursor.as_deref() {
        None | Some("") => None,
        Some(cursor) => Some(cursor.parse().map_err(AppError::bad_request)?),
    };

    let page = feed::page(&db_pool, Scope::Timeline, cursor, PAGE_SIZE).await?;

    let new_post = match (&viewer, cursor) {
        (Some(uid), None) => posts::new_post_form(&Plant::list_for(&db_pool, uid).await?),
        _ => String::new(),
    };

    let body = res::fill(include_res!(str, "/pages/timeline.html"), &[
        ("new_post", &new_post),
        ("posts", &posts::render_cards(&db_pool, &page.posts, viewer.as_deref()).await?),
        ("more", &posts::more_link("/timeline", page.next)),
    ]);

    Ok(Html(res::page("Timeline", viewer.as_deref(), &body)))
}
