mod edit;
mod page;

pub(crate) use page::WallQuery;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{uid}", get(page::profile))
        .route("/{uid}/about", post(edit::about))
        .route("/{uid}/picture", post(edit::picture))
}
