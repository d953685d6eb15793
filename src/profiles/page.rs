use axum::{debug_handler, extract::{Path, Query, State}, response::Html};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    feed::{self, Cursor, Scope, PAGE_SIZE},
    include_res,
    models::{Plant, User},
    posts, res, session, AppError, AppResult,
};

#[derive(Deserialize)]
pub(crate) struct WallQuery {
    pub(crate) cursor: Option<String>,
}

impl WallQuery {
    pub(crate) fn cursor(&self) -> AppResult<Option<Cursor>> {
        match self.cursor.as_deref() {
            None | Some("") => Ok(None),
            Some(cursor) => Ok(Some(cursor.parse().map_err(AppError::bad_request)?)),
        }
    }
}

#[debug_handler]
pub(crate) async fn profile(
    Path(uid): Path<String>,
    Query(query): Query<WallQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Html<String>> {
    let viewer = session::current_user(&session).await?;
    let cursor = query.cursor()?;

    let Some(user) = User::find(&db_pool, &uid).await? else {
        return Err(AppError::not_found("gardener"));
    };
    let is_owner = viewer.as_deref() == Some(user.uid.as_str());

    let plants = Plant::list_for(&db_pool, &user.uid).await?;
    let plant_items: String = plants
        .iter()
        .map(|plant| res::fill(include_res!(str, "/pages/plant_item.html"), &[
            ("picture", &res::picture(&plant.image_url, &plant.name, "avatar")),
            ("user_id", &res::escape(&plant.user_id)),
            ("id", &res::escape(&plant.id)),
            ("name", &res::escape(&plant.name)),
        ]))
        .collect();

    let page = feed::page(
        &db_pool,
        Scope::User { uid: &user.uid, include_unlisted: is_owner },
        cursor,
        PAGE_SIZE,
    )
    .await?;

    let uid = res::escape(&user.uid);
    let (edit, new_plant, new_post) = if is_owner {
        (
            res::fill(include_res!(str, "/pages/profile_edit.html"), &[
                ("uid", &uid),
                ("username", &res::escape(&user.username)),
                ("about_me", &res::escape(&user.about_me)),
            ]),
            res::fill(include_res!(str, "/pages/new_plant.html"), &[("uid", &uid)]),
            if cursor.is_none() { posts::new_post_form(&plants) } else { String::new() },
        )
    } else {
        (String::new(), String::new(), String::new())
    };

    let body = res::fill(include_res!(str, "/pages/profile.html"), &[
        ("picture", &res::picture(&user.profile_picture, &user.username, "profile-picture")),
        ("username", &res::escape(&user.username)),
        ("about_me", &res::escape(&user.about_me)),
        ("edit", &edit),
        ("plants", &plant_items),
        ("new_plant", &new_plant),
        ("new_post", &new_post),
        ("posts", &posts::render_cards(&db_pool, &page.posts, viewer.as_deref()).await?),
        ("more", &posts::more_link(&format!("/u/{}", user.uid), page.next)),
    ]);

    Ok(Html(res::page(&user.username, viewer.as_deref(), &body)))
}
