use axum::{debug_handler, extract::{Multipart, Path, State}, response::Redirect};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    models::Plant,
    session,
    storage::{Folder, FormData, Storage},
    AppError, AppResult, AppState,
};

const MAX_PLANT_NAME_LEN: usize = 60;

#[debug_handler(state = AppState)]
pub(crate) async fn new_plant(
    Path(uid): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(storage): State<Storage>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let uid = session::require_owner(&session, &uid).await?;
    let form = FormData::read(multipart).await?;

    let name = form.field("name").trim();
    if name.is_empty() || name.chars().count() > MAX_PLANT_NAME_LEN {
        return Err(AppError::bad_request(format!("plant names are 1 to {MAX_PLANT_NAME_LEN} characters")));
    }

    let plant_id = Uuid::now_v7();
    let image_url = match &form.file {
        Some(upload) => storage.put(Folder::PlantPicture { plant_id }, upload).await?,
        None => String::new(),
    };

    let plant = match Plant::create(&db_pool, plant_id, &uid, name, &image_url).await {
        Ok(plant) => plant,
        Err(e) => {
            storage.remove(&image_url).await;
            return Err(e.into());
        }
    };

    tracing::info!(plant = %plant.id, owner = %uid, "new plant");
    Ok(Redirect::to(&format!("/u/{uid}/plants/{}", plant.id)))
}
