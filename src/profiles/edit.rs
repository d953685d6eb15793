use axum::{debug_handler, extract::{Multipart, Path, State}, response::Redirect, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    models::User,
    session,
    storage::{Folder, FormData, Storage},
    AppError, AppResult, AppState,
};

const MAX_USERNAME_LEN: usize = 40;
const MAX_ABOUT_LEN: usize = 1000;

#[derive(Deserialize)]
pub(crate) struct AboutForm {
    username: String,
    #[serde(default)]
    about_me: String,
}

#[debug_handler]
pub(crate) async fn about(
    Path(uid): Path<String>,
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(AboutForm { username, about_me }): Form<AboutForm>,
) -> AppResult<Redirect> {
    let uid = session::require_owner(&session, &uid).await?;

    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::bad_request("pick a username"));
    }
    if username.chars().count() > MAX_USERNAME_LEN || about_me.chars().count() > MAX_ABOUT_LEN {
        return Err(AppError::bad_request("that's a bit long"));
    }

    if !User::update_about(&db_pool, &uid, username, about_me.trim()).await? {
        return Err(AppError::not_found("gardener"));
    }

    Ok(Redirect::to(&format!("/u/{uid}")))
}

#[debug_handler(state = AppState)]
pub(crate) async fn picture(
    Path(uid): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(storage): State<Storage>,
    session: Session,
    multipart: Multipart,
) -> AppResult<Redirect> {
    let uid = session::require_owner(&session, &uid).await?;
    let form = FormData::read(multipart).await?;
    let Some(upload) = form.file else {
        return Err(AppError::bad_request("pick a picture"));
    };

    let url = storage.put(Folder::ProfilePicture { uid: &uid }, &upload).await?;
    let previous = User::find(&db_pool, &uid).await?.map(|user| user.profile_picture);

    match User::set_picture(&db_pool, &uid, &url).await {
        Ok(true) => {
            if let Some(previous) = previous {
                storage.remove(&previous).await;
            }
        }
        Ok(false) => {
            storage.remove(&url).await;
            return Err(AppError::not_found("gardener"));
        }
        Err(e) => {
            storage.remove(&url).await;
            return Err(e.into());
        }
    }

    Ok(Redirect::to(&format!("/u/{uid}")))
}
