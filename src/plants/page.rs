use axum::{debug_handler, extract::{Path, Query, State}, response::{Html, Redirect}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    feed::{self, Scope, PAGE_SIZE},
    include_res,
    models::{Plant, User},
    posts,
    profiles::WallQuery,
    res, session,
    storage::Storage,
    AppError, AppResult, AppState,
};

#[debug_handler]
pub(crate) async fn plant(
    Path((uid, plant_id)): Path<(String, Uuid)>,
    Query(query): Query<WallQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Html<String>> {
    let viewer = session::current_user(&session).await?;
    let cursor = query.cursor()?;

    let Some(plant) = Plant::find(&db_pool, &uid, plant_id).await? else {
        return Err(AppError::not_found("plant"));
    };
    let owner = User::find(&db_pool, &plant.user_id).await?;
    let is_owner = viewer.as_deref() == Some(plant.user_id.as_str());

    let page = feed::page(
        &db_pool,
        Scope::Plant { plant_id, include_unlisted: is_owner },
        cursor,
        PAGE_SIZE,
    )
    .await?;

    let delete = if is_owner {
        format!(
            r#"<form method="post" action="/u/{}/plants/{plant_id}/delete"><button>Remove plant</button></form>"#,
            res::escape(&plant.user_id)
        )
    } else {
        String::new()
    };

    let body = res::fill(include_res!(str, "/pages/plant.html"), &[
        ("picture", &res::picture(&plant.image_url, &plant.name, "profile-picture")),
        ("name", &res::escape(&plant.name)),
        ("user_id", &res::escape(&plant.user_id)),
        ("owner", &res::escape(owner.as_ref().map(|owner| owner.username.as_str()).unwrap_or("someone"))),
        ("delete", &delete),
        ("posts", &posts::render_cards(&db_pool, &page.posts, viewer.as_deref()).await?),
        ("more", &posts::more_link(&format!("/u/{}/plants/{plant_id}", plant.user_id), page.next)),
    ]);

    Ok(Html(res::page(&plant.name, viewer.as_deref(), &body)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_plant(
    Path((uid, plant_id)): Path<(String, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(storage): State<Storage>,
    session: Session,
) -> AppResult<Redirect> {
    let uid = session::require_owner(&session, &uid).await?;

    let Some(plant) = Plant::find(&db_pool, &uid, plant_id).await? else {
        return Err(AppError::not_found("plant"));
    };

    let images: Vec<(String,)> = sqlx::query_as("SELECT image_url FROM plant_posts WHERE plant_id=? AND image_url != ''")
        .bind(&plant.id)
        .fetch_all(&db_pool)
        .await?;

    if Plant::delete(&db_pool, &uid, plant_id).await? {
        storage.remove(&plant.image_url).await;
        for (image_url,) in images {
            storage.remove(&image_url).await;
        }
        tracing::info!(plant = %plant_id, owner = %uid, "plant removed");
    }

    Ok(Redirect::to(&format!("/u/{uid}")))
}
