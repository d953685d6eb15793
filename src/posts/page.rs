use axum::{debug_handler, extract::{Path, State}, response::Html};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    include_res,
    models::{Comment, Post, PostKey, PostKind, User},
    res, session, AppError, AppResult, Markdown,
};

#[debug_handler]
pub(crate) async fn post_page(
    Path((kind, id)): Path<(PostKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Html<String>> {
    let viewer = session::current_user(&session).await?;
    let viewer_is_admin = match &viewer {
        Some(uid) => User::is_admin(&db_pool, uid).await?,
        None => false,
    };

    let key = PostKey { kind, id };
    let Some(post) = Post::find(&db_pool, key).await? else {
        return Err(AppError::not_found("post"));
    };
    if !post.viewable_by(viewer.as_deref(), viewer_is_admin) {
        return Err(AppError::not_found("post"));
    }

    let mut comments = String::new();
    for comment in Comment::list_for(&db_pool, key).await? {
        comments += &res::fill(include_res!(str, "/pages/comment.html"), &[
            ("user_id", &res::escape(&comment.user_id)),
            ("username", &res::escape(comment.username.as_deref().unwrap_or("someone"))),
            ("created_at", &res::timestamp(comment.created_at)),
            ("content", &Markdown(comment.content.as_str()).to_html()),
        ]);
    }

    let comment_form = match viewer {
        Some(_) => res::fill(include_res!(str, "/pages/comment_form.html"), &[("path", &key.path())]),
        None => format!(r#"<p><a href="/login?return_url={}">Log in</a> to comment.</p>"#, key.path()),
    };

    let owner_actions = if viewer.as_deref() == Some(post.author_id.as_str()) || viewer_is_admin {
        format!(r#"<form method="post" action="{}/delete"><button>Delete post</button></form>"#, key.path())
    } else {
        String::new()
    };

    let body = res::fill(include_res!(str, "/pages/post.html"), &[
        ("card", &super::render_card(&db_pool, &post, viewer.as_deref()).await?),
        ("comments", &comments),
        ("comment_form", &comment_form),
        ("owner_actions", &owner_actions),
    ]);

    Ok(Html(res::page("Post", viewer.as_deref(), &body)))
}
