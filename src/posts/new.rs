use axum::{debug_handler, extract::{Multipart, State}, response::Redirect};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    models::{Plant, Visibility},
    session,
    storage::{Folder, FormData, Storage},
    AppError, AppResult, AppState,
};

use super::NewPost;

#[debug_handler(state = AppState)]
pub(crate) async fn new_post(
    State(db_pool): State<SqlitePool>,
    State(storage): State<Storage>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let user_id = session::require_user(&session).await?;
    let form = FormData::read(multipart).await?;

    let content = form.field("content").trim();
    if content.is_empty() {
        return Err(AppError::bad_request("a post needs some words"));
    }

    let visibility: Visibility = match form.field("visibility") {
        "" => Visibility::Public,
        visibility => visibility.parse().map_err(AppError::bad_request)?,
    };

    let plant = match form.field("plant_id") {
        "" => None,
        plant_id => {
            let plant_id = Uuid::parse_str(plant_id).map_err(|_| AppError::bad_request("bad plant id"))?;
            let Some(plant) = Plant::find(&db_pool, &user_id, plant_id).await? else {
                return Err(AppError::not_found("plant"));
            };
            Some(plant)
        }
    };

    let image_url = match &form.file {
        Some(upload) => storage.put(Folder::Image, upload).await?,
        None => String::new(),
    };

    let created = super::create(&db_pool, NewPost {
        author_id: &user_id,
        content,
        image_url: &image_url,
        visibility,
        plant: plant.as_ref(),
    }).await;

    let post = match created {
        Ok(post) => post,
        Err(e) => {
            storage.remove(&image_url).await;
            return Err(e.into());
        }
    };

    let key = post.key().ok_or("fresh post without a key")?;
    Ok(Redirect::to(&key.path()))
}
